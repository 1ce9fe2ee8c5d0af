use axum::{routing::post, Router};

use crate::{handlers::auth_otp, state::AppState};

pub fn auth_otp_routes() -> Router<AppState> {
    Router::new()
        // Issue a code and hand it to the dispatcher
        .route("/requestOTP", post(auth_otp::request_otp))
        .route("/verifyOTP", post(auth_otp::verify_otp))
        .route("/resetPasswordAfterOTP", post(auth_otp::reset_password_after_otp))
}
