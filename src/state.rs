use std::sync::Arc;

use crate::services::identity_directory::IdentityDirectory;
use crate::services::otp_service::OTPService;
use crate::services::password_reset::PasswordResetService;

#[derive(Clone)]
pub struct AppState {
    pub directory: Arc<dyn IdentityDirectory>,
    pub otp_service: Arc<OTPService>,
    pub password_reset: PasswordResetService,
}

impl AppState {
    pub fn new(
        directory: Arc<dyn IdentityDirectory>,
        otp_service: Arc<OTPService>,
        require_otp_on_reset: bool,
    ) -> Self {
        let password_reset =
            PasswordResetService::new(directory.clone(), otp_service.clone(), require_otp_on_reset);

        AppState {
            directory,
            otp_service,
            password_reset,
        }
    }
}
