use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::config::DispatchSettings;
use crate::models::otp::OtpCreated;
use crate::services::mailer::OtpMailer;

pub type OtpCreatedSender = mpsc::UnboundedSender<OtpCreated>;
pub type OtpCreatedReceiver = mpsc::UnboundedReceiver<OtpCreated>;

/// On-create subscription for the `otp_codes` collection.
pub fn otp_created_channel() -> (OtpCreatedSender, OtpCreatedReceiver) {
    mpsc::unbounded_channel()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    Dispatched { attempts: u32 },
    Dropped { attempts: u32 },
}

/// Delivers each newly created OTP through the configured mailer.
///
/// Delivery is at-least-once with respect to the channel: every event is
/// attempted up to `max_attempts` times with doubling backoff, then dropped
/// with an error log. Duplicate events are delivered again.
pub struct OtpDispatcher {
    mailer: Arc<dyn OtpMailer>,
    settings: DispatchSettings,
}

impl OtpDispatcher {
    pub fn new(mailer: Arc<dyn OtpMailer>, settings: DispatchSettings) -> Self {
        Self { mailer, settings }
    }

    pub fn spawn(self, events: OtpCreatedReceiver) -> JoinHandle<()> {
        tokio::spawn(self.run(events))
    }

    /// Drains the channel until every sender has been dropped.
    pub async fn run(self, mut events: OtpCreatedReceiver) {
        while let Some(event) = events.recv().await {
            match self.dispatch(&event).await {
                DispatchOutcome::Dispatched { attempts } => tracing::info!(
                    event_id = %event.event_id,
                    attempts,
                    "OTP dispatched to {}",
                    event.email
                ),
                DispatchOutcome::Dropped { attempts } => tracing::error!(
                    event_id = %event.event_id,
                    "Dropping OTP for {} after {} attempts",
                    event.email,
                    attempts
                ),
            }
        }
        tracing::info!("OTP channel closed, dispatcher stopping");
    }

    pub async fn dispatch(&self, event: &OtpCreated) -> DispatchOutcome {
        let max_attempts = self.settings.max_attempts.max(1);
        let mut backoff = self.settings.backoff;

        for attempt in 1..=max_attempts {
            match self.mailer.send_otp(&event.email, &event.code).await {
                Ok(()) => return DispatchOutcome::Dispatched { attempts: attempt },
                Err(e) => {
                    tracing::warn!(
                        event_id = %event.event_id,
                        attempt,
                        "OTP dispatch to {} failed: {}",
                        event.email,
                        e
                    );
                    if attempt < max_attempts {
                        tokio::time::sleep(backoff).await;
                        backoff = backoff.saturating_mul(2);
                    }
                }
            }
        }

        DispatchOutcome::Dropped {
            attempts: max_attempts,
        }
    }
}


#[cfg(test)]
mod tests {
    use std::sync::atomic::Ordering;
    use std::time::Duration;

    use super::testing::RecordingMailer;
    use super::*;
    use crate::models::otp::OtpRecord;

    fn settings(max_attempts: u32) -> DispatchSettings {
        DispatchSettings {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn retries_until_the_mailer_succeeds() {
        let mailer = Arc::new(RecordingMailer::failing(2));
        let dispatcher = OtpDispatcher::new(mailer.clone(), settings(3));
        let event = OtpCreated::from(&OtpRecord::new("a@x.com", "123456", 5));

        let outcome = dispatcher.dispatch(&event).await;

        assert_eq!(outcome, DispatchOutcome::Dispatched { attempts: 3 });
        assert_eq!(
            *mailer.sent.lock().await,
            vec![("a@x.com".to_string(), "123456".to_string())]
        );
    }

    #[tokio::test]
    async fn drops_after_max_attempts() {
        let mailer = Arc::new(RecordingMailer::failing(10));
        let dispatcher = OtpDispatcher::new(mailer.clone(), settings(2));
        let event = OtpCreated::from(&OtpRecord::new("a@x.com", "123456", 5));

        let outcome = dispatcher.dispatch(&event).await;

        assert_eq!(outcome, DispatchOutcome::Dropped { attempts: 2 });
        assert_eq!(mailer.calls.load(Ordering::SeqCst), 2);
        assert!(mailer.sent.lock().await.is_empty());
    }

    #[tokio::test]
    async fn worker_stops_when_senders_are_dropped() {
        let mailer = Arc::new(RecordingMailer::default());
        let (tx, rx) = otp_created_channel();
        let handle = OtpDispatcher::new(mailer.clone(), settings(1)).spawn(rx);

        tx.send(OtpCreated::from(&OtpRecord::new("a@x.com", "111111", 5)))
            .unwrap();
        tx.send(OtpCreated::from(&OtpRecord::new("b@x.com", "222222", 5)))
            .unwrap();
        drop(tx);
        handle.await.unwrap();

        let sent = mailer.sent.lock().await;
        assert_eq!(sent.len(), 2);
        assert_eq!(sent[1], ("b@x.com".to_string(), "222222".to_string()));
    }
}
