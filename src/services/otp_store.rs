use std::collections::HashMap;

use async_trait::async_trait;
use mongodb::{
    bson::{doc, DateTime, Document},
    Collection, Database,
};
use tokio::sync::RwLock;

use crate::errors::Result;
use crate::models::otp::OtpRecord;

pub const OTP_COLLECTION: &str = "otp_codes";

/// Document collection holding at most one live OTP per email.
///
/// `check` and `take` evaluate a guess and apply its effect (a counted
/// failure, or removal on a match) as one atomic step per record, so
/// concurrent guesses never see the same attempt budget twice.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Creates or overwrites `otp_codes/{email}`. Last write wins.
    async fn put(&self, record: &OtpRecord) -> Result<()>;

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>>;

    /// True if `code` matches the live record. A mismatch against a live
    /// record counts one failed attempt.
    async fn check(&self, email: &str, code: &str, max_attempts: i32) -> Result<bool>;

    /// Like `check`, but removes and returns the record on a match.
    async fn take(&self, email: &str, code: &str, max_attempts: i32) -> Result<Option<OtpRecord>>;

    /// Puts a taken record back unless a newer one was issued meanwhile.
    async fn restore(&self, record: &OtpRecord) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

#[derive(Clone)]
pub struct MongoOtpStore {
    db: Database,
}

impl MongoOtpStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    fn codes(&self) -> Collection<OtpRecord> {
        self.db.collection(OTP_COLLECTION)
    }

    fn live(email: &str, max_attempts: i32) -> Document {
        doc! {
            "_id": email,
            "attempts": { "$lt": max_attempts },
            "expires_at": { "$gt": DateTime::now() },
        }
    }

    /// Counts a wrong guess against a live record. Returns false when the
    /// guess matched or the record is gone, spent or expired.
    async fn count_mismatch(&self, email: &str, code: &str, max_attempts: i32) -> Result<bool> {
        let mut filter = Self::live(email, max_attempts);
        filter.insert("code", doc! { "$ne": code });

        let result = self
            .codes()
            .update_one(filter, doc! { "$inc": { "attempts": 1 } })
            .await?;
        Ok(result.modified_count > 0)
    }
}

#[async_trait]
impl OtpStore for MongoOtpStore {
    async fn put(&self, record: &OtpRecord) -> Result<()> {
        // The upsert takes its _id from the filter, so the email is the document key.
        self.codes()
            .replace_one(doc! { "_id": &record.email }, record)
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>> {
        Ok(self.codes().find_one(doc! { "_id": email }).await?)
    }

    async fn check(&self, email: &str, code: &str, max_attempts: i32) -> Result<bool> {
        if self.count_mismatch(email, code, max_attempts).await? {
            return Ok(false);
        }

        let mut filter = Self::live(email, max_attempts);
        filter.insert("code", code);
        Ok(self.codes().find_one(filter).await?.is_some())
    }

    async fn take(&self, email: &str, code: &str, max_attempts: i32) -> Result<Option<OtpRecord>> {
        if self.count_mismatch(email, code, max_attempts).await? {
            return Ok(None);
        }

        let mut filter = Self::live(email, max_attempts);
        filter.insert("code", code);
        Ok(self.codes().find_one_and_delete(filter).await?)
    }

    async fn restore(&self, record: &OtpRecord) -> Result<()> {
        self.codes()
            .update_one(
                doc! { "_id": &record.email },
                doc! {
                    "$setOnInsert": {
                        "email": &record.email,
                        "code": &record.code,
                        "attempts": record.attempts,
                        "created_at": record.created_at,
                        "expires_at": record.expires_at,
                    }
                },
            )
            .upsert(true)
            .await?;
        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryOtpStore {
    codes: RwLock<HashMap<String, OtpRecord>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Applies one guess to a record. Callers hold the write lock.
fn guess(record: &mut OtpRecord, code: &str, max_attempts: i32) -> bool {
    if !record.is_live(max_attempts) {
        return false;
    }
    if record.code != code {
        record.attempts += 1;
        return false;
    }
    true
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, record: &OtpRecord) -> Result<()> {
        self.codes
            .write()
            .await
            .insert(record.email.clone(), record.clone());
        Ok(())
    }

    async fn get(&self, email: &str) -> Result<Option<OtpRecord>> {
        Ok(self.codes.read().await.get(email).cloned())
    }

    async fn check(&self, email: &str, code: &str, max_attempts: i32) -> Result<bool> {
        let mut codes = self.codes.write().await;
        Ok(codes
            .get_mut(email)
            .is_some_and(|record| guess(record, code, max_attempts)))
    }

    async fn take(&self, email: &str, code: &str, max_attempts: i32) -> Result<Option<OtpRecord>> {
        let mut codes = self.codes.write().await;
        let matched = codes
            .get_mut(email)
            .is_some_and(|record| guess(record, code, max_attempts));
        Ok(if matched { codes.remove(email) } else { None })
    }

    async fn restore(&self, record: &OtpRecord) -> Result<()> {
        self.codes
            .write()
            .await
            .entry(record.email.clone())
            .or_insert_with(|| record.clone());
        Ok(())
    }
}
