//! Credential handling
//!
//! Database passwords are held in [`SecretString`], which zeroes its memory on
//! drop and redacts itself in `Debug` output. Passwords may come from the TOML
//! file, an environment override, or a mounted secret file.

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::path::Path;
use zeroize::Zeroize;

/// String payload stored inside a [`Secret`]
#[derive(Clone, Debug, Zeroize)]
#[zeroize(drop)]
pub struct SecretValue(String);

impl CloneableSecret for SecretValue {}
impl DebugSecret for SecretValue {}
impl SerializableSecret for SecretValue {}

impl From<String> for SecretValue {
    fn from(s: String) -> Self {
        SecretValue(s)
    }
}

impl PartialEq<str> for SecretValue {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl AsRef<str> for SecretValue {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl SecretValue {
    /// Check if the secret value is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl Serialize for SecretValue {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for SecretValue {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        String::deserialize(deserializer).map(SecretValue)
    }
}

/// A string that never shows up in logs or debug output
pub type SecretString = Secret<SecretValue>;

/// Wraps a plain string in a [`SecretString`]
///
/// ```rust
/// use gpxload::config::secret_string;
/// use secrecy::ExposeSecret;
///
/// let password = secret_string("hunter2".to_string());
/// assert_eq!(password.expose_secret().as_ref(), "hunter2");
/// ```
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}

/// Reads a secret from a file such as a Docker or Kubernetes secret mount
///
/// Trailing line breaks are stripped; an empty file is an error.
pub fn read_secret_file(path: impl AsRef<Path>) -> std::io::Result<SecretString> {
    let path = path.as_ref();
    let mut contents = std::fs::read_to_string(path)?;
    let trimmed_len = contents.trim_end_matches(['\r', '\n']).len();
    contents.truncate(trimmed_len);

    if contents.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("secret file {} is empty", path.display()),
        ));
    }

    Ok(secret_string(contents))
}
