//! Block/unblock decisions for the WLAN kill switch.

use log::debug;

use crate::Result;
use crate::api::models::{ConnectionError, KillSwitchState, LinkStatus};

/// What to do with a block or unblock request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockAction {
    /// Send the request to URfkill.
    Request,
    /// The switch is already where it should be.
    Skip,
}

/// Decides whether a block (`true`) or unblock (`false`) request has to be
/// sent, given the current kill switch state.
///
/// A hard block cannot be lifted from software.
pub(crate) fn block_action(current: KillSwitchState, block: bool) -> Result<BlockAction> {
    if block {
        if current != KillSwitchState::Unblocked {
            debug!("Kill switch already {current}, not blocking");
            return Ok(BlockAction::Skip);
        }
        return Ok(BlockAction::Request);
    }

    match current {
        KillSwitchState::HardBlocked => Err(ConnectionError::HardBlocked),
        KillSwitchState::SoftBlocked => Ok(BlockAction::Request),
        _ => {
            debug!("Kill switch {current}, not unblocking");
            Ok(BlockAction::Skip)
        }
    }
}

/// Status of a link whose device has no connection.
pub(crate) fn idle_status(kill_switch: KillSwitchState) -> LinkStatus {
    if kill_switch.is_blocked() {
        LinkStatus::Disabled
    } else {
        LinkStatus::Offline
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn block_only_when_unblocked() {
        assert_eq!(
            block_action(KillSwitchState::Unblocked, true).unwrap(),
            BlockAction::Request
        );
        for state in [
            KillSwitchState::SoftBlocked,
            KillSwitchState::HardBlocked,
            KillSwitchState::NotAvailable,
        ] {
            assert_eq!(block_action(state, true).unwrap(), BlockAction::Skip);
        }
    }

    #[test]
    fn unblock_only_when_soft_blocked() {
        assert_eq!(
            block_action(KillSwitchState::SoftBlocked, false).unwrap(),
            BlockAction::Request
        );
        assert_eq!(
            block_action(KillSwitchState::Unblocked, false).unwrap(),
            BlockAction::Skip
        );
        assert_eq!(
            block_action(KillSwitchState::NotAvailable, false).unwrap(),
            BlockAction::Skip
        );
    }

    #[test]
    fn hard_block_cannot_be_lifted() {
        assert!(matches!(
            block_action(KillSwitchState::HardBlocked, false),
            Err(ConnectionError::HardBlocked)
        ));
    }

    #[test]
    fn idle_status_follows_kill_switch() {
        assert_eq!(idle_status(KillSwitchState::Unblocked), LinkStatus::Offline);
        assert_eq!(idle_status(KillSwitchState::NotAvailable), LinkStatus::Offline);
        assert_eq!(idle_status(KillSwitchState::SoftBlocked), LinkStatus::Disabled);
        assert_eq!(idle_status(KillSwitchState::HardBlocked), LinkStatus::Disabled);
    }
}
