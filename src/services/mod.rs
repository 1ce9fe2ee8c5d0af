pub mod identity_directory;
pub mod mailer;
pub mod otp_dispatcher;
pub mod otp_service;
pub mod otp_store;
pub mod password_reset;
