//! Portal login secrets.
//!
//! Exactly two values, read from the process environment (a `.env` file is
//! honored by the binary before this runs). Held as `SecretString` so they
//! never show up in debug output or logs.

use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};

pub const USERNAME_VAR: &str = "ICICI_USERNAME";
pub const PASSWORD_VAR: &str = "ICICI_PASSWORD";

#[derive(Clone)]
pub struct Credentials {
    username: SecretString,
    password: SecretString,
}

impl Credentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: SecretString::from(username.into()),
            password: SecretString::from(password.into()),
        }
    }

    /// Missing variables are a fatal startup condition; failing here beats
    /// failing at the login form with an opaque portal error.
    pub fn from_env() -> Result<Self> {
        let username = std::env::var(USERNAME_VAR)
            .with_context(|| format!("{USERNAME_VAR} is not set; export it or add it to .env"))?;
        let password = std::env::var(PASSWORD_VAR)
            .with_context(|| format!("{PASSWORD_VAR} is not set; export it or add it to .env"))?;
        Ok(Self::new(username, password))
    }

    pub fn username(&self) -> &str {
        self.username.expose_secret()
    }

    pub fn password(&self) -> &str {
        self.password.expose_secret()
    }
}
