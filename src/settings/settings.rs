use anyhow::{Result, anyhow, bail};
use crate::domain_model::UserId;
use config::{Config, Environment, File};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

#[derive(Debug, Deserialize)]
pub struct Settings {
    pub http: Http,
    pub log: Log,
    pub store: Store,
    pub users: Users,
    pub events: Events,
    pub auth: Auth,
}

#[derive(Debug, Deserialize)]
pub struct Http {
    pub address: String,
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    // both or neither; plain HTTP when absent
    #[serde(default)]
    pub cert_path: Option<String>,
    #[serde(default)]
    pub key_path: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Log {
    pub filter: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Mysql,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Store {
    pub backend: StoreBackend,
    #[serde(default)]
    pub mysql_dsn: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UsersBackend {
    Http,
    Memory,
}

#[derive(Debug, Deserialize)]
pub struct Users {
    pub backend: UsersBackend,
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_lookup_timeout_secs")]
    pub timeout_secs: u64,
    /// Directory served by the memory backend, id to display name.
    #[serde(default)]
    pub profiles: HashMap<String, String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventsBackend {
    Kafka,
    None,
}

#[derive(Debug, Deserialize)]
pub struct Events {
    pub backend: EventsBackend,
    #[serde(default)]
    pub bootstrap_server: String,
    #[serde(default)]
    pub topic: String,
    #[serde(default)]
    pub group_id: String,
    #[serde(default = "default_event_timeout_secs")]
    pub timeout_secs: u64,
}

#[derive(Deserialize)]
pub struct Auth {
    pub issuer: String,
    pub audience: String,
    pub signing_key: String,
}

// keep the signing key out of the startup log
impl std::fmt::Debug for Auth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auth")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("signing_key", &"<redacted>")
            .finish()
    }
}

fn default_request_timeout_secs() -> u64 {
    10
}

fn default_max_connections() -> u32 {
    10
}

fn default_lookup_timeout_secs() -> u64 {
    5
}

fn default_event_timeout_secs() -> u64 {
    10
}

impl Http {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn tls(&self) -> Option<(&str, &str)> {
        match (&self.cert_path, &self.key_path) {
            (Some(cert), Some(key)) => Some((cert.as_str(), key.as_str())),
            _ => None,
        }
    }
}

impl Users {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Events {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Settings {
    /// Rejects combinations that would only fail later, after some
    /// components have already started.
    pub fn validate(&self) -> Result<()> {
        self.http
            .address
            .parse::<std::net::SocketAddr>()
            .map_err(|e| anyhow!("http.address {:?}: {e}", self.http.address))?;
        if self.http.request_timeout_secs == 0 {
            bail!("http.request_timeout_secs must be positive");
        }
        if self.http.cert_path.is_some() != self.http.key_path.is_some() {
            bail!("http.cert_path and http.key_path must be set together");
        }

        if self.store.backend == StoreBackend::Mysql && self.store.mysql_dsn.is_empty() {
            bail!("store.mysql_dsn is required for the mysql backend");
        }

        if self.users.backend == UsersBackend::Http && self.users.base_url.is_empty() {
            bail!("users.base_url is required for the http backend");
        }
        let invalid_id = self
            .users
            .profiles
            .keys()
            .find(|id| UserId::new(id.as_str()).is_err());
        if let Some(bad) = invalid_id {
            bail!("users.profiles has an invalid user id {bad:?}");
        }
        if self.users.timeout_secs == 0 {
            bail!("users.timeout_secs must be positive");
        }

        if self.events.backend == EventsBackend::Kafka {
            for (name, value) in [
                ("events.bootstrap_server", &self.events.bootstrap_server),
                ("events.topic", &self.events.topic),
                ("events.group_id", &self.events.group_id),
            ] {
                if value.is_empty() {
                    bail!("{name} is required for the kafka backend");
                }
            }
        }
        if self.events.timeout_secs == 0 {
            bail!("events.timeout_secs must be positive");
        }

        if self.auth.signing_key.is_empty() {
            bail!("auth.signing_key must not be empty");
        }

        crate::logger::parse_filter(&self.log.filter)?;

        Ok(())
    }
}

#[cfg(debug_assertions)]
const SETTINGS_PATH: &str = "settings/dev.toml";
#[cfg(not(debug_assertions))]
const SETTINGS_PATH: &str = "settings/release.toml";

pub fn parse_settings(path: Option<&str>) -> Result<Settings> {
    let path = path.unwrap_or(SETTINGS_PATH);

    let settings: Settings = Config::builder()
        .add_source(File::with_name(path))
        .add_source(Environment::with_prefix("FRIENDGRAPH").separator("__"))
        .build()
        .map_err(|e| anyhow!(e))?
        .try_deserialize()
        .map_err(|e| anyhow!(e))?;

    settings.validate()?;

    Ok(settings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use config::FileFormat;

    const MEMORY_ONLY: &str = r#"
        [http]
        address = "127.0.0.1:8080"

        [log]
        filter = "info"

        [store]
        backend = "memory"

        [users]
        backend = "memory"

        [events]
        backend = "none"

        [auth]
        issuer = "sharenote.auth"
        audience = "sharenote"
        signing_key = "dev-secret"
    "#;

    fn parse(toml: &str) -> Result<Settings> {
        Config::builder()
            .add_source(File::from_str(toml, FileFormat::Toml))
            .build()?
            .try_deserialize()
            .map_err(|e| anyhow!(e))
    }

    #[test]
    fn memory_settings_get_defaults_and_validate() {
        let settings = parse(MEMORY_ONLY).unwrap();
        assert_eq!(settings.store.backend, StoreBackend::Memory);
        assert_eq!(settings.http.request_timeout(), Duration::from_secs(10));
        assert_eq!(settings.events.timeout(), Duration::from_secs(10));
        assert!(settings.http.tls().is_none());
        settings.validate().unwrap();
    }

    #[test]
    fn unknown_backend_is_a_parse_error() {
        let toml = MEMORY_ONLY.replace(r#"backend = "memory""#, r#"backend = "mongo""#);
        assert!(parse(&toml).is_err());
    }

    #[test]
    fn mysql_backend_requires_dsn() {
        let toml = MEMORY_ONLY.replacen(r#"backend = "memory""#, r#"backend = "mysql""#, 1);
        let settings = parse(&toml).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("mysql_dsn"));
    }

    #[test]
    fn kafka_backend_requires_topic() {
        let toml = MEMORY_ONLY.replace(
            r#"backend = "none""#,
            "backend = \"kafka\"\nbootstrap_server = \"localhost:9092\"\ngroup_id = \"g\"",
        );
        let settings = parse(&toml).unwrap();
        let err = settings.validate().unwrap_err();
        assert!(err.to_string().contains("events.topic"));
    }

    #[test]
    fn half_configured_tls_is_rejected() {
        let toml = MEMORY_ONLY.replace(
            r#"address = "127.0.0.1:8080""#,
            "address = \"127.0.0.1:8080\"\ncert_path = \"cert.pem\"",
        );
        let settings = parse(&toml).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn bad_log_filter_is_rejected() {
        let toml = MEMORY_ONLY.replace(
            r#"filter = "info""#,
            r#"filter = "info,friendgraph=loud""#,
        );
        let settings = parse(&toml).unwrap();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn memory_directory_is_read_from_users_section() {
        let toml = MEMORY_ONLY.replace(
            "[users]\n        backend = \"memory\"",
            "[users]\n        backend = \"memory\"\n        profiles = { u1 = \"Ann\" }",
        );
        let settings = parse(&toml).unwrap();
        assert_eq!(
            settings.users.profiles.get("u1").map(String::as_str),
            Some("Ann")
        );
        settings.validate().unwrap();
    }

    #[test]
    fn debug_output_hides_signing_key() {
        let settings = parse(MEMORY_ONLY).unwrap();
        let printed = format!("{settings:?}");
        assert!(!printed.contains("dev-secret"));
    }
}
