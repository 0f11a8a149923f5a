//! Campaign lifecycle state machine

use payamak_common::{Error, Result};
use payamak_storage::models::CampaignStatus;

/// Whether a campaign may move from `from` to `to`
pub fn can_transition(from: CampaignStatus, to: CampaignStatus) -> bool {
    use CampaignStatus::*;

    // Scheduling is decided at creation time, so pending never moves to
    // scheduled afterwards
    match from {
        Pending => matches!(to, InProgress | Cancelled),
        Scheduled => matches!(to, InProgress | Cancelled),
        InProgress => matches!(to, Paused | Completed | Failed | Cancelled),
        Paused => matches!(to, InProgress | Cancelled),
        Completed | Failed | Cancelled => false,
    }
}

/// Validate a transition, returning an InvalidTransition error when the
/// move is not allowed
pub fn ensure_transition(from: CampaignStatus, to: CampaignStatus) -> Result<()> {
    if can_transition(from, to) {
        Ok(())
    } else {
        Err(Error::InvalidTransition(format!(
            "Cannot move campaign from {} to {}",
            from, to
        )))
    }
}
