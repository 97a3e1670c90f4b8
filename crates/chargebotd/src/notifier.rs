//! Notifier that publishes to IPC subscribers

use chargebot_api::{Event, EventPayload, Notice, StatusSnapshot};
use chargebot_core::{Notifier, NotifyError};
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Broadcasts every notice and state change as an [`Event`].
///
/// Delivery to a given requester is up to whichever subscribed front end owns
/// their identity. Nobody listening is not a failure.
pub struct IpcNotifier {
    events: broadcast::Sender<Event>,
}

impl IpcNotifier {
    pub fn new(events: broadcast::Sender<Event>) -> Self {
        Self { events }
    }

    fn publish(&self, payload: EventPayload) {
        if self.events.send(Event::new(payload)).is_err() {
            debug!("No subscribers for event");
        }
    }
}

impl Notifier for IpcNotifier {
    fn notify(&self, notice: &Notice) -> Result<(), NotifyError> {
        info!(
            user_id = %notice.user_id,
            kind = ?notice.kind,
            "{}",
            notice.kind.message()
        );
        self.publish(EventPayload::Notice(notice.clone()));
        Ok(())
    }

    fn state_changed(&self, snapshot: &StatusSnapshot) {
        self.publish(EventPayload::StateChanged(snapshot.clone()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chargebot_api::NoticeKind;
    use chargebot_util::UserId;

    #[test]
    fn test_notice_is_broadcast() {
        let (tx, mut rx) = broadcast::channel(8);
        let notifier = IpcNotifier::new(tx);

        let notice = Notice::new(
            UserId::parse("U1").unwrap(),
            NoticeKind::Warning { minutes_left: 10 },
        );
        notifier.notify(&notice).unwrap();

        match rx.try_recv().unwrap().payload {
            EventPayload::Notice(n) => assert_eq!(n, notice),
            other => panic!("unexpected payload: {:?}", other),
        }
    }

    #[test]
    fn test_no_subscribers_is_ok() {
        let (tx, rx) = broadcast::channel(8);
        drop(rx);
        let notifier = IpcNotifier::new(tx);

        let notice = Notice::new(
            UserId::parse("U1").unwrap(),
            NoticeKind::ChargeStarted {
                charge_duration: std::time::Duration::from_secs(60),
            },
        );
        assert!(notifier.notify(&notice).is_ok());
    }
}
