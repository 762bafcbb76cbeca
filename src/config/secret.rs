//! Credential handling using the secrecy crate
//!
//! The database connection string carries a password, so it is held in a
//! [`SecretString`]: memory is zeroed on drop, `Debug` output is redacted and
//! reading the value requires an explicit `expose_secret()`.
//!
//! ```rust
//! use tradex::config::secret_string;
//! use secrecy::ExposeSecret;
//!
//! let dsn = secret_string("postgresql://user:pw@db/trade".to_string());
//! assert!(dsn.expose_secret().starts_with("postgresql://"));
//! assert!(!format!("{dsn:?}").contains("pw@"));
//! ```

use secrecy::{CloneableSecret, DebugSecret, Secret, SerializableSecret};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio_postgres::config::Host;
use zeroize::Zeroize;

/// String newtype that satisfies the `Secret` trait bounds
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
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn starts_with(&self, prefix: &str) -> bool {
        self.0.starts_with(prefix)
    }

    /// Parse the secret value into another type
    pub fn parse<F: std::str::FromStr>(&self) -> Result<F, F::Err> {
        self.0.parse()
    }

    /// Connection target with every credential dropped
    ///
    /// The string is parsed as a libpq connection string (URL or key/value
    /// form) and rebuilt from user, hosts, ports and database name only, so a
    /// password is never echoed whether it sits in the userinfo or in a query
    /// parameter.
    pub fn redacted_dsn(&self) -> String {
        let Ok(config) = self.0.parse::<tokio_postgres::Config>() else {
            return "<invalid connection string>".to_string();
        };

        let ports = config.get_ports();
        let hosts: Vec<String> = config
            .get_hosts()
            .iter()
            .enumerate()
            .map(|(i, host)| {
                let name = match host {
                    Host::Tcp(name) => name.clone(),
                    #[cfg(unix)]
                    Host::Unix(path) => path.display().to_string(),
                };
                let port = ports.get(i).or(if ports.len() == 1 {
                    ports.first()
                } else {
                    None
                });
                match port {
                    Some(port) => format!("{name}:{port}"),
                    None => name,
                }
            })
            .collect();

        let user = config
            .get_user()
            .map(|u| format!("{u}@"))
            .unwrap_or_default();
        let dbname = config
            .get_dbname()
            .map(|d| format!("/{d}"))
            .unwrap_or_default();
        format!("postgresql://{user}{}{dbname}", hosts.join(","))
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

/// Secret string: zeroed on drop, redacted in `Debug`
pub type SecretString = Secret<SecretValue>;

/// Wraps a `String` in a [`SecretString`]
#[inline]
pub fn secret_string(value: String) -> SecretString {
    Secret::new(SecretValue::from(value))
}
