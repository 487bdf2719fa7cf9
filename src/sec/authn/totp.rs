use acct_lib::sec::authn::totp::{code_valid, ALGO, DIGITS, SECRET_LEN, SKEW, STEP};
use chrono::{DateTime, Utc};
use data_encoding::BASE32_NOPAD;
use rand::RngCore;
use totp_rs::{Algorithm, TOTP};
use url::Url;

use crate::error::{self, AuthKind};

#[derive(Debug, thiserror::Error)]
pub enum TotpError {
    #[error("totp secret is not valid base32")]
    InvalidSecret,

    #[error(transparent)]
    Rand(#[from] rand::Error),

    #[error(transparent)]
    Url(#[from] url::ParseError),
}

impl From<TotpError> for error::Error {
    fn from(err: TotpError) -> Self {
        match err {
            TotpError::InvalidSecret => error::Error::api(AuthKind::InvalidMfaCode)
                .context("stored totp secret failed to decode")
                .source(err),
            _ => error::Error::api(AuthKind::MfaProvisionFailed)
                .source(err),
        }
    }
}

/// random secret encoded the way authenticator apps expect it
pub fn create_secret() -> Result<String, TotpError> {
    let mut bytes = [0u8; SECRET_LEN];

    rand::thread_rng().try_fill_bytes(&mut bytes)?;

    Ok(BASE32_NOPAD.encode(&bytes))
}

pub fn decode_secret(secret: &str) -> Result<Vec<u8>, TotpError> {
    BASE32_NOPAD.decode(secret.trim().to_ascii_uppercase().as_bytes())
        .map_err(|_| TotpError::InvalidSecret)
}

fn generator(secret: &str) -> Result<TOTP, TotpError> {
    let key = decode_secret(secret)?;

    TOTP::new(Algorithm::SHA1, DIGITS as usize, SKEW as u8, STEP, key)
        .map_err(|_| TotpError::InvalidSecret)
}

fn seconds(at: DateTime<Utc>) -> Option<u64> {
    u64::try_from(at.timestamp()).ok()
}

pub fn code_at(secret: &str, at: DateTime<Utc>) -> Result<String, TotpError> {
    let totp = generator(secret)?;

    Ok(totp.generate(seconds(at).unwrap_or(0)))
}

/// accepts the code for the step containing `at` and one step either side
pub fn verify(secret: &str, code: &str, at: DateTime<Utc>) -> Result<bool, TotpError> {
    let code = code.trim();

    if !code_valid(code) {
        return Ok(false);
    }

    let totp = generator(secret)?;

    // the window has no steps before the epoch
    let Some(secs) = seconds(at).filter(|secs| *secs >= STEP * SKEW) else {
        return Ok(false);
    };

    Ok(totp.check(code, secs))
}

/// `otpauth://totp/issuer:account?...` for enrolling with an authenticator
pub fn uri(secret: &str, issuer: &str, account: &str) -> Result<String, TotpError> {
    let mut url = Url::parse("otpauth://totp/")?;

    url.set_path(&format!("/{issuer}:{account}"));
    url.query_pairs_mut()
        .append_pair("secret", secret)
        .append_pair("issuer", issuer)
        .append_pair("algorithm", ALGO)
        .append_pair("digits", &DIGITS.to_string())
        .append_pair("period", &STEP.to_string());

    Ok(url.into())
}

#[cfg(test)]
mod test {
    use chrono::Duration;

    use super::*;

    fn rfc_secret() -> String {
        BASE32_NOPAD.encode(b"12345678901234567890")
    }

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[test]
    fn rfc6238_vectors() {
        let secret = rfc_secret();

        assert_eq!(code_at(&secret, at(59)).unwrap(), "287082");
        assert_eq!(code_at(&secret, at(1_111_111_109)).unwrap(), "081804");
        assert_eq!(code_at(&secret, at(1_234_567_890)).unwrap(), "005924");
    }

    #[test]
    fn skew_window() {
        let secret = create_secret().unwrap();
        let now = at(1_700_000_010);

        for offset in [-30, 0, 30] {
            let code = code_at(&secret, now + Duration::seconds(offset)).unwrap();

            assert!(verify(&secret, &code, now).unwrap(), "code at {offset}s rejected");
        }

        for offset in [-90, 90] {
            let code = code_at(&secret, now + Duration::seconds(offset)).unwrap();

            assert!(!verify(&secret, &code, now).unwrap(), "code at {offset}s accepted");
        }
    }

    #[test]
    fn malformed_codes_rejected() {
        let secret = create_secret().unwrap();
        let now = at(1_700_000_010);

        assert!(!verify(&secret, "", now).unwrap());
        assert!(!verify(&secret, "12345", now).unwrap());
        assert!(!verify(&secret, "abcdef", now).unwrap());
        assert!(matches!(verify("not base32!", "123456", now), Err(TotpError::InvalidSecret)));
    }

    #[test]
    fn secret_shape() {
        let secret = create_secret().unwrap();

        assert_eq!(decode_secret(&secret).unwrap().len(), SECRET_LEN);
        assert_eq!(decode_secret(&secret.to_lowercase()).unwrap().len(), SECRET_LEN);
    }

    #[test]
    fn enrollment_uri() {
        let uri = uri("JBSWY3DPEHPK3PXP", "XControl Account", "a@x.com").unwrap();

        assert!(uri.starts_with("otpauth://totp/XControl%20Account:a@x.com?"), "{uri}");
        assert!(uri.contains("secret=JBSWY3DPEHPK3PXP"), "{uri}");
        assert!(uri.contains("algorithm=SHA1"), "{uri}");
        assert!(uri.contains("digits=6"), "{uri}");
        assert!(uri.contains("period=30"), "{uri}");
    }
}
