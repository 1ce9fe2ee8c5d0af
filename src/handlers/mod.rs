pub(crate) mod auth_otp;
pub(crate) mod health;
