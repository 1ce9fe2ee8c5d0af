use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use validator::Validate;

use crate::dtos::auth_dtos::{
    validation_message, CallableRequest, CallableResponse, RequestOTPRequest, RequestOTPResponse,
    ResetPasswordRequest, ResetPasswordResponse, VerifyOTPRequest, VerifyOTPResponse,
};
use crate::errors::{AppError, Result};
use crate::services::otp_service::normalize_code;
use crate::services::password_reset::normalize_email;
use crate::state::AppState;

type Payload<T> = std::result::Result<Json<CallableRequest<T>>, JsonRejection>;

/// Unwraps the `data` field of a callable body. Malformed bodies are caller errors.
fn callable_data<T>(payload: Payload<T>) -> Result<T> {
    payload
        .map(|Json(req)| req.data)
        .map_err(|rejection| AppError::invalid_argument(rejection.body_text()))
}

// 1. Request OTP
pub async fn request_otp(
    State(state): State<AppState>,
    payload: Payload<RequestOTPRequest>,
) -> Result<Json<CallableResponse<RequestOTPResponse>>> {
    let mut req = callable_data(payload)?;
    req.email = normalize_email(&req.email);
    req.validate()
        .map_err(|errors| AppError::invalid_argument(validation_message(&errors)))?;

    state.otp_service.issue(&req.email).await.map_err(|e| {
        tracing::error!("Failed to issue OTP: {}", e);
        AppError::internal(format!("Error issuing OTP: {}", e))
    })?;

    Ok(Json(CallableResponse::new(RequestOTPResponse {
        success: true,
        message: "OTP sent to your email".to_string(),
    })))
}

// 2. Verify OTP
pub async fn verify_otp(
    State(state): State<AppState>,
    payload: Payload<VerifyOTPRequest>,
) -> Result<Json<CallableResponse<VerifyOTPResponse>>> {
    let mut req = callable_data(payload)?;
    req.email = normalize_email(&req.email);
    req.code = normalize_code(&req.code);
    req.validate()
        .map_err(|errors| AppError::invalid_argument(validation_message(&errors)))?;

    let valid = state.otp_service.verify(&req.email, &req.code).await.map_err(|e| {
        tracing::error!("OTP verification error: {}", e);
        AppError::internal(format!("Error verifying OTP: {}", e))
    })?;

    if !valid {
        return Err(AppError::invalid_argument("Invalid or expired OTP"));
    }

    Ok(Json(CallableResponse::new(VerifyOTPResponse {
        success: true,
        message: "OTP verified successfully".to_string(),
    })))
}

// 3. Reset Password
pub async fn reset_password_after_otp(
    State(state): State<AppState>,
    payload: Payload<ResetPasswordRequest>,
) -> Result<Json<CallableResponse<ResetPasswordResponse>>> {
    let req = callable_data(payload)?;
    let response = state.password_reset.reset(req).await?;
    Ok(Json(CallableResponse::new(response)))
}
