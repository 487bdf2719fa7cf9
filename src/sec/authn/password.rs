use argon2::Variant;
use data_encoding::HEXLOWER;
use rand::RngCore;

use crate::error::{self, AuthKind};

pub const SALT_LEN: usize = 32;

pub type Salt = [u8; SALT_LEN];

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error(transparent)]
    Rand(#[from] rand::Error),

    #[error(transparent)]
    Argon2(#[from] argon2::Error),

    #[error(transparent)]
    Join(#[from] tokio::task::JoinError),
}

impl From<PasswordError> for error::Error {
    fn from(err: PasswordError) -> Self {
        error::Error::api(AuthKind::HashFailure)
            .source(err)
    }
}

pub fn gen_salt() -> Result<Salt, rand::Error> {
    let mut salt = [0u8; SALT_LEN];

    rand::thread_rng().try_fill_bytes(&mut salt)?;

    Ok(salt)
}

pub fn gen_hash(password: &str, salt: &[u8]) -> Result<String, argon2::Error> {
    let mut config = argon2::Config::default();
    config.mem_cost = 19456;
    config.variant = Variant::Argon2id;

    argon2::hash_encoded(
        password.as_bytes(),
        salt,
        &config
    )
}

pub fn verify_encoded(encoded: &str, password: &str) -> Result<bool, argon2::Error> {
    argon2::verify_encoded(encoded, password.as_bytes())
}

/// hashes on the blocking pool so the runtime workers stay free
pub async fn hash(password: String) -> Result<String, PasswordError> {
    tokio::task::spawn_blocking(move || {
        let salt = gen_salt()?;

        Ok::<_, PasswordError>(gen_hash(&password, &salt)?)
    }).await?
}

pub async fn verify(encoded: String, password: String) -> Result<bool, PasswordError> {
    if encoded.is_empty() {
        return Ok(false);
    }

    tokio::task::spawn_blocking(move || {
        Ok::<_, PasswordError>(verify_encoded(&encoded, &password)?)
    }).await?
}

/// hash of a random value nobody knows. for accounts that never log in
/// with a password
pub async fn unusable() -> Result<String, PasswordError> {
    let mut bytes = [0u8; SALT_LEN];

    rand::thread_rng().try_fill_bytes(&mut bytes)?;

    hash(HEXLOWER.encode(&bytes)).await
}
