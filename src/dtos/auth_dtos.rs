use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationErrors};

/// Envelope of a callable request: `{ "data": ... }`.
#[derive(Debug, Deserialize)]
pub struct CallableRequest<T> {
    #[serde(default)]
    pub data: T,
}

/// Envelope of a callable response: `{ "result": ... }`.
#[derive(Debug, Serialize)]
pub struct CallableResponse<T> {
    pub result: T,
}

impl<T> CallableResponse<T> {
    pub fn new(result: T) -> Self {
        Self { result }
    }
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct RequestOTPRequest {
    #[serde(default)]
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct VerifyOTPRequest {
    #[serde(default)]
    #[validate(email(message = "A valid email address is required"))]
    pub email: String,

    #[serde(default)]
    #[validate(length(min = 6, max = 6, message = "OTP must be 6 digits"))]
    pub code: String,
}

/// Fields are optional so absence is reported as `invalid-argument`
/// rather than a body rejection.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetPasswordRequest {
    pub email: Option<String>,
    pub new_password: Option<String>,
    pub code: Option<String>,
}

#[derive(Debug, Validate)]
pub struct NewCredential {
    #[validate(length(min = 6, message = "Password must be at least 6 characters"))]
    pub new_password: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct RequestOTPResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct VerifyOTPResponse {
    pub success: bool,
    pub message: String,
}

#[derive(Debug, Serialize, PartialEq)]
pub struct ResetPasswordResponse {
    pub success: bool,
    pub message: String,
}

/// First human-readable message of a failed validation.
pub fn validation_message(errors: &ValidationErrors) -> String {
    errors
        .field_errors()
        .values()
        .flat_map(|errs| errs.iter())
        .find_map(|e| e.message.as_ref().map(|m| m.to_string()))
        .unwrap_or_else(|| format!("Validation error: {}", errors))
}
