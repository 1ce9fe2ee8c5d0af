use mongodb::bson::DateTime;
use serde::{Deserialize, Serialize};

/// Credential record owned by the identity directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRecord {
    pub uid: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime,
    pub updated_at: DateTime,
}
