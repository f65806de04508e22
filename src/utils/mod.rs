pub mod config;
pub mod otp;
