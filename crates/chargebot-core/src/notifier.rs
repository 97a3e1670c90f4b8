//! Outbound notification seam

use chargebot_api::{Notice, StatusSnapshot};
use chargebot_util::UserId;
use std::sync::{Mutex, PoisonError};
use thiserror::Error;

/// Errors from delivering a notice
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("no delivery route to {0}")]
    Unreachable(UserId),
}

/// Delivers notices to requesters.
///
/// Called by the session manager after its lock is released, from command
/// callers and from timer tasks alike. Implementations must not call back into
/// the manager synchronously and should return quickly. A failed delivery is
/// logged by the manager and never undoes the transition that produced it.
pub trait Notifier: Send + Sync {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError>;

    /// The holder or queue changed; `snapshot` is the state right after
    fn state_changed(&self, _snapshot: &StatusSnapshot) {}
}

/// Notifier that records everything it is given, for tests
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
    snapshots: Mutex<Vec<StatusSnapshot>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every notice so far, in delivery order
    pub fn notices(&self) -> Vec<Notice> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn notices_for(&self, user_id: &UserId) -> Vec<Notice> {
        self.notices()
            .into_iter()
            .filter(|n| &n.user_id == user_id)
            .collect()
    }

    pub fn snapshots(&self) -> Vec<StatusSnapshot> {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn clear(&self) {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        self.notices
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(notice.clone());
        Ok(())
    }

    fn state_changed(&self, snapshot: &StatusSnapshot) {
        self.snapshots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(snapshot.clone());
    }
}
