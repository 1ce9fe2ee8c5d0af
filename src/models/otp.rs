use chrono::{Duration, Utc};
use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Live one-time code for an email, stored at `otp_codes/{email}`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct OtpRecord {
    pub email: String,
    pub code: String,       // 6-digit OTP
    pub attempts: i32,      // Failed attempts
    pub created_at: DateTime,
    pub expires_at: DateTime,
}

impl OtpRecord {
    pub fn new(email: impl Into<String>, code: impl Into<String>, ttl_minutes: i64) -> Self {
        let now = Utc::now();
        let expires_at = now + Duration::minutes(ttl_minutes);

        Self {
            email: email.into(),
            code: code.into(),
            attempts: 0,
            created_at: DateTime::from_millis(now.timestamp_millis()),
            expires_at: DateTime::from_millis(expires_at.timestamp_millis()),
        }
    }

    pub fn is_expired(&self) -> bool {
        self.expires_at.timestamp_millis() <= Utc::now().timestamp_millis()
    }

    /// Unexpired and still within its attempt budget.
    pub fn is_live(&self, max_attempts: i32) -> bool {
        !self.is_expired() && self.attempts < max_attempts
    }
}

/// Emitted once per newly created OTP record on the `otp_codes` channel.
#[derive(Debug, Clone, PartialEq)]
pub struct OtpCreated {
    pub event_id: Uuid,
    pub email: String,
    pub code: String,
}

impl From<&OtpRecord> for OtpCreated {
    fn from(record: &OtpRecord) -> Self {
        Self {
            event_id: Uuid::new_v4(),
            email: record.email.clone(),
            code: record.code.clone(),
        }
    }
}
