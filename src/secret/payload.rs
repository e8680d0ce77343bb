//! # Credential Payload
//!
//! JSON credential record stored in each secret version:
//!
//! ```json
//! {
//!   "host": "db.internal",
//!   "port": 3306,
//!   "dbname": "app",
//!   "username": "app",
//!   "password": "...",
//!   "superuser": "admin",
//!   "superuser_password": "..."
//! }
//! ```
//!
//! `port` defaults to 3306 and may be written as a numeric string.
//! Fields not listed here are carried forward untouched when a new version
//! is derived from the current one.

use crate::constants::DEFAULT_DB_PORT;
use crate::error::{Result, RotationError};
use crate::target::ConnectParams;
use serde::{de, Deserialize, Deserializer};
use std::fmt;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Parsed credential record
#[derive(Clone, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct CredentialPayload {
    pub host: String,
    #[serde(default = "default_port", deserialize_with = "deserialize_port")]
    pub port: u16,
    #[serde(default)]
    pub dbname: Option<String>,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub superuser: Option<String>,
    #[serde(default)]
    pub superuser_password: Option<String>,
}

impl fmt::Debug for CredentialPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialPayload")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("dbname", &self.dbname)
            .field("username", &self.username)
            .field("superuser", &self.superuser)
            .finish_non_exhaustive()
    }
}

/// Credentials used to change another account's password
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AdminCredentials<'a> {
    pub username: &'a str,
    pub password: &'a str,
    /// No separate superuser was stored; the account rotates itself
    pub self_rotation: bool,
}

fn default_port() -> u16 {
    DEFAULT_DB_PORT
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u16),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(port) => Ok(port),
        PortRepr::Text(text) => text
            .trim()
            .parse()
            .map_err(|e| de::Error::custom(format!("invalid port '{text}': {e}"))),
    }
}

impl CredentialPayload {
    /// Parse and validate a payload document
    ///
    /// # Errors
    ///
    /// Returns `InvalidPayload` when the document is not JSON, misses a
    /// required field, or names an empty host or username.
    pub fn from_json(bytes: &[u8]) -> Result<Self> {
        let payload: Self = serde_json::from_slice(bytes)?;
        payload.validate()?;
        Ok(payload)
    }

    fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(RotationError::invalid_payload("host must not be empty"));
        }
        if self.username.trim().is_empty() {
            return Err(RotationError::invalid_payload("username must not be empty"));
        }
        Ok(())
    }

    /// Credentials allowed to change this account's password
    ///
    /// `superuser` / `superuser_password` win when present and non-empty;
    /// each falls back to the account's own value independently.
    #[must_use]
    pub fn admin_credentials(&self) -> AdminCredentials<'_> {
        let superuser = self.superuser.as_deref().filter(|s| !s.is_empty());
        let superuser_password = self
            .superuser_password
            .as_deref()
            .filter(|s| !s.is_empty());

        AdminCredentials {
            username: superuser.unwrap_or(&self.username),
            password: superuser_password.unwrap_or(&self.password),
            self_rotation: superuser.is_none(),
        }
    }

    /// Connection parameters for this payload's own account
    #[must_use]
    pub fn connect_params(&self) -> ConnectParams {
        self.connect_params_as(&self.username, &self.password)
    }

    /// Connection parameters for this payload's host/port/dbname, as another account
    #[must_use]
    pub fn connect_params_as(&self, username: &str, password: &str) -> ConnectParams {
        ConnectParams {
            host: self.host.clone(),
            port: self.port,
            dbname: self.dbname.clone(),
            username: username.to_string(),
            password: Zeroizing::new(password.to_string()),
        }
    }
}

/// Derive the next version's document from the current one
///
/// The current document is validated as a credential record, then copied
/// field for field with only `password` replaced, so unknown fields and the
/// existing value representations survive.
///
/// # Errors
///
/// Returns `InvalidPayload` when the current document is not a valid
/// credential record.
pub fn with_new_password(current_json: &[u8], new_password: &str) -> Result<Zeroizing<String>> {
    CredentialPayload::from_json(current_json)?;

    let mut document: serde_json::Map<String, serde_json::Value> =
        serde_json::from_slice(current_json)?;
    document.insert(
        "password".to_string(),
        serde_json::Value::String(new_password.to_string()),
    );

    Ok(Zeroizing::new(serde_json::to_string(&document)?))
}

#[cfg(test)]
mod tests {
    use super::*;

    const CURRENT: &str = r#"{
        "host": "db.internal",
        "port": 3306,
        "dbname": "orders",
        "username": "app",
        "password": "old",
        "engine": "mysql"
    }"#;

    #[test]
    fn test_parse_full_payload() {
        let payload = CredentialPayload::from_json(CURRENT.as_bytes()).unwrap();
        assert_eq!(payload.host, "db.internal");
        assert_eq!(payload.port, 3306);
        assert_eq!(payload.dbname.as_deref(), Some("orders"));
        assert_eq!(payload.username, "app");
        assert_eq!(payload.password, "old");
        assert!(payload.superuser.is_none());
    }

    #[test]
    fn test_port_defaults_and_accepts_strings() {
        let payload = CredentialPayload::from_json(
            br#"{"host":"h","username":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(payload.port, 3306);
        assert!(payload.dbname.is_none());

        let payload = CredentialPayload::from_json(
            br#"{"host":"h","port":"3307","username":"u","password":"p"}"#,
        )
        .unwrap();
        assert_eq!(payload.port, 3307);
    }

    #[test]
    fn test_invalid_payloads_are_rejected() {
        let missing_password = CredentialPayload::from_json(br#"{"host":"h","username":"u"}"#);
        assert!(matches!(
            missing_password,
            Err(RotationError::InvalidPayload { .. })
        ));

        let bad_port = CredentialPayload::from_json(
            br#"{"host":"h","port":"abc","username":"u","password":"p"}"#,
        );
        assert!(matches!(bad_port, Err(RotationError::InvalidPayload { .. })));

        let empty_host =
            CredentialPayload::from_json(br#"{"host":" ","username":"u","password":"p"}"#);
        assert!(matches!(empty_host, Err(RotationError::InvalidPayload { .. })));
    }

    #[test]
    fn test_admin_credentials_prefer_superuser() {
        let payload = CredentialPayload::from_json(
            br#"{"host":"h","username":"app","password":"p","superuser":"root","superuser_password":"rootpw"}"#,
        )
        .unwrap();
        let admin = payload.admin_credentials();
        assert_eq!(admin.username, "root");
        assert_eq!(admin.password, "rootpw");
        assert!(!admin.self_rotation);
    }

    #[test]
    fn test_admin_credentials_fall_back_to_own_account() {
        let payload = CredentialPayload::from_json(
            br#"{"host":"h","username":"app","password":"p","superuser":""}"#,
        )
        .unwrap();
        let admin = payload.admin_credentials();
        assert_eq!(admin.username, "app");
        assert_eq!(admin.password, "p");
        assert!(admin.self_rotation);
    }

    #[test]
    fn test_with_new_password_keeps_other_fields() {
        let next = with_new_password(CURRENT.as_bytes(), "n3w-Secret").unwrap();
        let document: serde_json::Value = serde_json::from_str(&next).unwrap();

        assert_eq!(document["password"], "n3w-Secret");
        assert_eq!(document["username"], "app");
        assert_eq!(document["host"], "db.internal");
        assert_eq!(document["dbname"], "orders");
        assert_eq!(document["port"], 3306);
        assert_eq!(document["engine"], "mysql");
    }

    #[test]
    fn test_debug_redacts_passwords() {
        let payload = CredentialPayload::from_json(
            br#"{"host":"h","username":"app","password":"hunter2","superuser_password":"rootpw"}"#,
        )
        .unwrap();
        let rendered = format!("{payload:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("rootpw"));
        assert!(rendered.contains("app"));
    }
}
