use std::sync::Arc;

use validator::Validate;

use crate::dtos::auth_dtos::{
    validation_message, NewCredential, ResetPasswordRequest, ResetPasswordResponse,
};
use crate::errors::{AppError, Result};
use crate::services::identity_directory::IdentityDirectory;
use crate::services::otp_service::{normalize_code, OTPService};

/// Backs the `resetPasswordAfterOTP` callable.
#[derive(Clone)]
pub struct PasswordResetService {
    directory: Arc<dyn IdentityDirectory>,
    otp_service: Arc<OTPService>,
    require_otp: bool,
}

impl PasswordResetService {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        otp_service: Arc<OTPService>,
        require_otp: bool,
    ) -> Self {
        Self {
            directory,
            otp_service,
            require_otp,
        }
    }

    pub async fn reset(&self, req: ResetPasswordRequest) -> Result<ResetPasswordResponse> {
        let (email, new_password) = match (non_empty(req.email), non_empty(req.new_password)) {
            (Some(email), Some(new_password)) => (normalize_email(&email), new_password),
            _ => {
                return Err(AppError::invalid_argument(
                    "Email and new password are required",
                ))
            }
        };

        let credential = NewCredential { new_password };
        credential
            .validate()
            .map_err(|errors| AppError::invalid_argument(validation_message(&errors)))?;

        let code = non_empty(req.code.as_deref().map(normalize_code));
        let consumed = match code {
            Some(code) => {
                let record = self
                    .otp_service
                    .consume(&email, &code)
                    .await
                    .map_err(reset_failed)?
                    .ok_or_else(|| {
                        AppError::invalid_argument("Invalid or expired verification code")
                    })?;
                Some(record)
            }
            None if self.require_otp => {
                return Err(AppError::invalid_argument("Verification code is required"));
            }
            None => None,
        };

        let uid = match self.update_credential(&email, &credential.new_password).await {
            Ok(uid) => uid,
            Err(e) => {
                // The caller may retry with the same code.
                if let Some(record) = &consumed {
                    if let Err(restore_err) = self.otp_service.restore(record).await {
                        tracing::error!("Failed to restore OTP for {}: {}", email, restore_err);
                    }
                }
                return Err(reset_failed(e));
            }
        };

        tracing::info!("Password reset for uid {}", uid);

        Ok(ResetPasswordResponse {
            success: true,
            message: "Password has been reset successfully".to_string(),
        })
    }

    async fn update_credential(&self, email: &str, new_password: &str) -> Result<String> {
        let user = self.directory.get_user_by_email(email).await?;
        self.directory.update_password(&user.uid, new_password).await?;
        Ok(user.uid)
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Emails key both the directory and the OTP store.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

fn reset_failed(e: AppError) -> AppError {
    tracing::error!("Error resetting password: {}", e);
    AppError::internal(format!("Error resetting password: {}", e))
}
