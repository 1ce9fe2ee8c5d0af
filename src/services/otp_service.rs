use std::sync::Arc;

use rand::Rng;

use crate::config::OtpSettings;
use crate::errors::Result;
use crate::models::otp::{OtpCreated, OtpRecord};
use crate::services::otp_dispatcher::OtpCreatedSender;
use crate::services::otp_store::OtpStore;

#[derive(Clone)]
pub struct OTPService {
    store: Arc<dyn OtpStore>,
    created: OtpCreatedSender,
    settings: OtpSettings,
}

impl OTPService {
    pub fn new(store: Arc<dyn OtpStore>, created: OtpCreatedSender, settings: OtpSettings) -> Self {
        Self {
            store,
            created,
            settings,
        }
    }

    // Generate 6-digit OTP
    pub fn generate_otp() -> String {
        let mut rng = rand::thread_rng();
        format!("{:06}", rng.gen_range(0..1_000_000))
    }

    /// Issues a fresh code for `email`, replacing any live one.
    pub async fn issue(&self, email: &str) -> Result<OtpRecord> {
        let record = OtpRecord::new(email, Self::generate_otp(), self.settings.ttl_minutes);
        self.create(&record).await?;
        Ok(record)
    }

    /// Writes `otp_codes/{email}` and publishes exactly one on-create event.
    pub async fn create(&self, record: &OtpRecord) -> Result<()> {
        self.store.put(record).await?;

        if self.created.send(OtpCreated::from(record)).is_err() {
            tracing::warn!("OTP dispatcher is not running; code for {} not sent", record.email);
        }

        Ok(())
    }

    /// Checks `code` against the live record without consuming it.
    /// A mismatch counts against the record's attempt budget.
    pub async fn verify(&self, email: &str, code: &str) -> Result<bool> {
        self.store
            .check(email, &normalize_code(code), self.settings.max_attempts)
            .await
    }

    /// Like [`verify`](Self::verify), but removes the record on success and
    /// hands it back so a failed follow-up can [`restore`](Self::restore) it.
    pub async fn consume(&self, email: &str, code: &str) -> Result<Option<OtpRecord>> {
        self.store
            .take(email, &normalize_code(code), self.settings.max_attempts)
            .await
    }

    /// Reinstates a consumed record unless a newer code has been issued.
    pub async fn restore(&self, record: &OtpRecord) -> Result<()> {
        self.store.restore(record).await
    }

    pub async fn ping(&self) -> Result<()> {
        self.store.ping().await
    }
}

/// Codes are compared with all whitespace removed.
pub fn normalize_code(code: &str) -> String {
    code.chars().filter(|c| !c.is_whitespace()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::otp_dispatcher::{otp_created_channel, OtpCreatedReceiver};
    use crate::services::otp_store::InMemoryOtpStore;

    fn service() -> (OTPService, Arc<InMemoryOtpStore>, OtpCreatedReceiver) {
        let store = Arc::new(InMemoryOtpStore::new());
        let (tx, rx) = otp_created_channel();
        let service = OTPService::new(store.clone(), tx, OtpSettings::default());
        (service, store, rx)
    }

    #[test]
    fn generated_codes_are_six_digits() {
        for _ in 0..100 {
            let code = OTPService::generate_otp();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[tokio::test]
    async fn creating_a_record_publishes_one_event_with_its_code() {
        let (service, store, mut rx) = service();
        let record = OtpRecord::new("a@x.com", "123456", 5);

        service.create(&record).await.unwrap();

        let event = rx.try_recv().unwrap();
        assert_eq!(event.email, "a@x.com");
        assert_eq!(event.code, "123456");
        assert!(rx.try_recv().is_err());
        assert_eq!(store.get("a@x.com").await.unwrap(), Some(record));
    }

    #[tokio::test]
    async fn reissue_replaces_previous_code() {
        let (service, store, mut rx) = service();

        let first = service.issue("a@x.com").await.unwrap();
        let second = service.issue("a@x.com").await.unwrap();

        assert_eq!(store.get("a@x.com").await.unwrap().unwrap().code, second.code);
        assert_eq!(rx.try_recv().unwrap().code, first.code);
        assert_eq!(rx.try_recv().unwrap().code, second.code);
    }

    #[tokio::test]
    async fn verify_accepts_matching_code_without_consuming() {
        let (service, store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        assert!(service.verify("a@x.com", "123456").await.unwrap());
        assert!(store.get("a@x.com").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn wrong_codes_exhaust_the_attempt_budget() {
        let (service, _store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        for _ in 0..3 {
            assert!(!service.verify("a@x.com", "000000").await.unwrap());
        }
        assert!(!service.verify("a@x.com", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn expired_codes_are_rejected() {
        let (service, _store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 0)).await.unwrap();

        assert!(!service.verify("a@x.com", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn consume_deletes_on_success_only() {
        let (service, store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        assert!(service.consume("a@x.com", "999999").await.unwrap().is_none());
        assert!(store.get("a@x.com").await.unwrap().is_some());

        let consumed = service.consume("a@x.com", "123456").await.unwrap();
        assert_eq!(consumed.map(|r| r.code).as_deref(), Some("123456"));
        assert!(store.get("a@x.com").await.unwrap().is_none());
        assert!(service.consume("a@x.com", "123456").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn codes_are_compared_without_whitespace() {
        let (service, _store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        assert!(service.verify("a@x.com", " 123 456\n").await.unwrap());
        assert!(service.consume("a@x.com", "12 34 56").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn restore_makes_a_consumed_code_usable_again() {
        let (service, _store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        let record = service.consume("a@x.com", "123456").await.unwrap().unwrap();
        service.restore(&record).await.unwrap();

        assert!(service.verify("a@x.com", "123456").await.unwrap());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_consumes_succeed_exactly_once() {
        let (service, _store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        let handles: Vec<_> = (0..5)
            .map(|_| {
                let service = service.clone();
                tokio::spawn(async move { service.consume("a@x.com", "123456").await.unwrap() })
            })
            .collect();

        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_some() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_wrong_guesses_cannot_exceed_the_attempt_budget() {
        let (service, store, _rx) = service();
        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();

        let handles: Vec<_> = (0..100)
            .map(|i| {
                let service = service.clone();
                let guess = format!("{:06}", 200_000 + i);
                tokio::spawn(async move { service.verify("a@x.com", &guess).await.unwrap() })
            })
            .collect();
        for handle in handles {
            assert!(!handle.await.unwrap());
        }

        let record = store.get("a@x.com").await.unwrap().unwrap();
        assert_eq!(record.attempts, OtpSettings::default().max_attempts);
        assert!(!service.verify("a@x.com", "123456").await.unwrap());
    }

    #[tokio::test]
    async fn create_succeeds_without_a_running_dispatcher() {
        let (service, store, rx) = service();
        drop(rx);

        service.create(&OtpRecord::new("a@x.com", "123456", 5)).await.unwrap();
        assert!(store.get("a@x.com").await.unwrap().is_some());
    }
}
