//! Time-based one-time passwords for logging test accounts in.
//!
//! 6 digits, 30 second steps, SHA-1, base32 secret from `OTP_SECRET`.

use crate::error::{Result, RunnerError};
use std::time::{SystemTime, UNIX_EPOCH};
use totp_rs::{Algorithm, Secret, TOTP};

/// Environment variable holding the base32 secret
pub const SECRET_ENV: &str = "OTP_SECRET";

const ISSUER: &str = "lumi-acceptance";

fn totp_for_secret_b32(secret_b32: &str) -> Result<TOTP> {
    let bytes = Secret::Encoded(secret_b32.trim().to_string())
        .to_bytes()
        .map_err(|e| RunnerError::Otp(format!("invalid secret: {:?}", e)))?;
    TOTP::new(
        Algorithm::SHA1,
        6,
        1,
        30,
        bytes,
        Some(ISSUER.to_string()),
        "test-account".to_string(),
    )
    .map_err(|e| RunnerError::Otp(format!("invalid secret: {:?}", e)))
}

fn secret_from(value: Option<String>) -> Result<String> {
    value
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| RunnerError::Otp(format!("{} is not set", SECRET_ENV)))
}

fn secret_from_env() -> Result<String> {
    secret_from(std::env::var(SECRET_ENV).ok())
}

fn now_epoch_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Token for `secret_b32` at `unix_secs`
pub fn generate_token_at(secret_b32: &str, unix_secs: u64) -> Result<String> {
    Ok(totp_for_secret_b32(secret_b32)?.generate(unix_secs))
}

/// Current token for the secret in `OTP_SECRET`
pub fn generate_token() -> Result<String> {
    generate_token_at(&secret_from_env()?, now_epoch_secs())
}

/// True only if `token` belongs to the time step containing `unix_secs`.
/// Neighbouring steps are rejected.
pub fn verify_token_at(secret_b32: &str, token: &str, unix_secs: u64) -> Result<bool> {
    let totp = totp_for_secret_b32(secret_b32)?;
    Ok(totp.generate(unix_secs) == token.trim())
}

/// Verify `token` against the current step of `OTP_SECRET`
pub fn verify_token(token: &str) -> Result<bool> {
    verify_token_at(&secret_from_env()?, token, now_epoch_secs())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "JBSWY3DPEHPK3PXPJBSWY3DPEHPK3PXP";

    #[test]
    fn test_token_shape() {
        let token = generate_token_at(SECRET, 1_700_000_000).unwrap();
        assert_eq!(token.len(), 6);
        assert!(token.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_verification_accepts_current_step_only() {
        let t = 1_700_000_010;
        let token = generate_token_at(SECRET, t).unwrap();
        let step_start = t - t % 30;

        assert!(verify_token_at(SECRET, &token, step_start).unwrap());
        assert!(verify_token_at(SECRET, &token, step_start + 29).unwrap());
        let previous = generate_token_at(SECRET, step_start - 30).unwrap();
        assert_eq!(
            verify_token_at(SECRET, &previous, t).unwrap(),
            previous == token
        );
    }

    #[test]
    fn test_missing_secret() {
        assert!(matches!(secret_from(None), Err(RunnerError::Otp(_))));
        assert!(matches!(secret_from(Some("  ".into())), Err(RunnerError::Otp(_))));
    }

    #[test]
    fn test_invalid_secret() {
        assert!(generate_token_at("not base32!", 0).is_err());
    }
}
