use nmlink::{LinkMonitor, NmBackend, WifiLink};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

#[tokio::main]
async fn main() -> nmlink::Result<()> {
    let backend = NmBackend::system().await?;
    println!("Watching {}", backend.interface().await?);

    let link = Arc::new(WifiLink::new(backend));
    let shutdown = CancellationToken::new();

    let monitor = LinkMonitor::new(link.clone());
    let task = tokio::spawn({
        let shutdown = shutdown.clone();
        async move { monitor.run(&shutdown).await }
    });

    let mut status = link.subscribe_status();
    let mut networks = link.subscribe_access_points();

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            changed = status.changed() => {
                if changed.is_err() {
                    break;
                }
                let active = link
                    .active_access_point()
                    .map(|g| g.ssid().to_string())
                    .unwrap_or_else(|| "-".into());
                println!("status: {} (active: {active})", *status.borrow_and_update());
            }
            changed = networks.changed() => {
                if changed.is_err() {
                    break;
                }
                println!("{} networks:", networks.borrow().len());
                for net in networks.borrow_and_update().iter() {
                    let lock = if net.secured() { "secured" } else { "open" };
                    println!("  {:30} {:>5.0}%  {lock:8} ({} APs)", net.ssid(), net.strength(), net.num_members());
                }
            }
        }
    }

    shutdown.cancel();
    match task.await {
        Ok(result) => result,
        Err(e) => {
            eprintln!("monitor task failed: {e}");
            Ok(())
        }
    }
}
