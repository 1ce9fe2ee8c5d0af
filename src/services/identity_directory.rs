use std::collections::HashMap;

use async_trait::async_trait;
use bcrypt::hash;
use chrono::Utc;
use mongodb::{
    bson::{doc, DateTime},
    options::IndexOptions,
    Collection, Database, IndexModel,
};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::errors::{AppError, Result};
use crate::models::user::UserRecord;

pub const USERS_COLLECTION: &str = "users";

/// Authentication service of record: one account per email.
#[async_trait]
pub trait IdentityDirectory: Send + Sync {
    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord>;

    /// Replaces the stored credential for `uid` with a hash of `new_password`.
    async fn update_password(&self, uid: &str, new_password: &str) -> Result<()>;

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

fn now_bson() -> DateTime {
    DateTime::from_millis(Utc::now().timestamp_millis())
}

#[derive(Clone)]
pub struct MongoIdentityDirectory {
    db: Database,
    bcrypt_cost: u32,
}

impl MongoIdentityDirectory {
    pub fn new(db: Database, bcrypt_cost: u32) -> Self {
        Self { db, bcrypt_cost }
    }

    fn users(&self) -> Collection<UserRecord> {
        self.db.collection(USERS_COLLECTION)
    }

    pub async fn ensure_indexes(&self) -> Result<()> {
        let unique = || IndexOptions::builder().unique(true).build();

        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "email": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;
        self.users()
            .create_index(
                IndexModel::builder()
                    .keys(doc! { "uid": 1 })
                    .options(unique())
                    .build(),
            )
            .await?;

        Ok(())
    }
}

#[async_trait]
impl IdentityDirectory for MongoIdentityDirectory {
    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord> {
        self.users()
            .find_one(doc! { "email": email })
            .await?
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))
    }

    async fn update_password(&self, uid: &str, new_password: &str) -> Result<()> {
        let password_hash = hash(new_password, self.bcrypt_cost)?;

        let filter = doc! { "uid": uid };
        let update = doc! {
            "$set": {
                "password_hash": password_hash,
                "updated_at": now_bson(),
            }
        };

        let result = self.users().update_one(filter, update).await?;
        if result.matched_count == 0 {
            return Err(AppError::UserNotFound(uid.to_string()));
        }

        Ok(())
    }

    async fn ping(&self) -> Result<()> {
        self.db.run_command(doc! { "ping": 1 }).await?;
        Ok(())
    }
}

/// Directory held in process memory, keyed by email.
pub struct InMemoryIdentityDirectory {
    users: RwLock<HashMap<String, UserRecord>>,
    bcrypt_cost: u32,
}

impl InMemoryIdentityDirectory {
    pub fn new(bcrypt_cost: u32) -> Self {
        Self {
            users: RwLock::new(HashMap::new()),
            bcrypt_cost,
        }
    }

    pub async fn create_user(&self, email: &str, password: &str) -> Result<UserRecord> {
        let mut users = self.users.write().await;
        if users.contains_key(email) {
            return Err(AppError::internal(format!(
                "The email address is already in use by another account: {}",
                email
            )));
        }

        let now = now_bson();
        let record = UserRecord {
            uid: Uuid::new_v4().simple().to_string(),
            email: email.to_string(),
            password_hash: hash(password, self.bcrypt_cost)?,
            created_at: now,
            updated_at: now,
        };
        users.insert(email.to_string(), record.clone());

        Ok(record)
    }
}

#[async_trait]
impl IdentityDirectory for InMemoryIdentityDirectory {
    async fn get_user_by_email(&self, email: &str) -> Result<UserRecord> {
        self.users
            .read()
            .await
            .get(email)
            .cloned()
            .ok_or_else(|| AppError::UserNotFound(email.to_string()))
    }

    async fn update_password(&self, uid: &str, new_password: &str) -> Result<()> {
        let password_hash = hash(new_password, self.bcrypt_cost)?;

        let mut users = self.users.write().await;
        let user = users
            .values_mut()
            .find(|user| user.uid == uid)
            .ok_or_else(|| AppError::UserNotFound(uid.to_string()))?;

        user.password_hash = password_hash;
        user.updated_at = now_bson();

        Ok(())
    }
}
