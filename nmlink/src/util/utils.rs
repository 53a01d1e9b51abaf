//! Utility functions for SSID decoding and D-Bus helpers.

use log::debug;
use std::str;
use zbus::Connection;
use zvariant::OwnedObjectPath;

use crate::types::constants::NULL_PATH;
use crate::Result;

/// Character used in place of bytes that cannot be displayed.
const REPLACEMENT: char = '\u{FFFD}';

/// Decodes raw SSID bytes into display text.
///
/// Valid UTF-8 is used as-is. Otherwise printable ASCII bytes are kept and
/// every other byte is replaced by U+FFFD. Never fails.
pub(crate) fn decode_ssid(bytes: &[u8]) -> String {
    match str::from_utf8(bytes) {
        Ok(s) => s.to_owned(),
        Err(e) => {
            debug!("SSID is not valid UTF-8 ({e}), decoding byte by byte");
            bytes
                .iter()
                .map(|&b| {
                    if b.is_ascii_graphic() || b == b' ' {
                        b as char
                    } else {
                        REPLACEMENT
                    }
                })
                .collect()
        }
    }
}

/// Returns `true` if `path` is NetworkManager's "no object" path.
pub(crate) fn is_null_path(path: &OwnedObjectPath) -> bool {
    path.as_str() == NULL_PATH
}

/// Helper to create a NetworkManager D-Bus proxy for a given path and interface.
///
/// Returns a zbus Proxy instance for the specified path and interface.
pub(crate) async fn nm_proxy<'a, P>(
    conn: &'a Connection,
    path: P,
    interface: &'a str,
) -> Result<zbus::Proxy<'a>>
where
    P: TryInto<OwnedObjectPath>,
    P::Error: Into<zbus::Error>,
{
    let owned_path = path.try_into().map_err(Into::into)?;
    Ok(zbus::proxy::Builder::new(conn)
        .destination("org.freedesktop.NetworkManager")?
        .path(owned_path)?
        .interface(interface)?
        .build()
        .await?)
}

/// Helper to create a Settings.Connection proxy for a specific connection.
///
/// Used to read the settings of a saved profile.
pub(crate) async fn connection_settings_proxy<'a, P>(
    conn: &'a Connection,
    connection_path: P,
) -> Result<zbus::Proxy<'a>>
where
    P: TryInto<OwnedObjectPath>,
    P::Error: Into<zbus::Error>,
{
    nm_proxy(
        conn,
        connection_path,
        "org.freedesktop.NetworkManager.Settings.Connection",
    )
    .await
}

/// Macro to convert Result to Option with error logging.
/// Usage: `try_log!(result, "context message")`
#[macro_export]
macro_rules! try_log {
    ($result:expr, $context:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => {
                log::warn!("{}: {:?}", $context, e);
                return None;
            }
        }
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_ssid_utf8() {
        assert_eq!(decode_ssid(b"MyNetwork"), "MyNetwork");
        assert_eq!(decode_ssid(b""), "");
        assert_eq!(decode_ssid("café".as_bytes()), "café");
    }

    #[test]
    fn test_decode_ssid_invalid_bytes() {
        assert_eq!(decode_ssid(b"Cafe\xff"), "Cafe\u{FFFD}");
        assert_eq!(decode_ssid(b"a b\x00\xc3"), "a b\u{FFFD}\u{FFFD}");
    }

    #[test]
    fn test_null_path() {
        assert!(is_null_path(&OwnedObjectPath::try_from("/").unwrap()));
        let ap = OwnedObjectPath::try_from("/org/freedesktop/NetworkManager/AccessPoint/1").unwrap();
        assert!(!is_null_path(&ap));
    }
}
