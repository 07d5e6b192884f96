use super::validator::{validate_parity, validate_weekday};
use super::ConfigError;
use crate::db::models::Role;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

#[derive(Debug, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub policy: PolicyConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_address")]
    pub bind_address: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

#[derive(Debug, Deserialize)]
pub struct AuthConfig {
    /// Token accepted on every /api route.
    pub api_token: SecretString,
    /// Token additionally required on admin routes.
    pub admin_token: SecretString,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub conn_string: Option<String>,
    #[serde(default)]
    pub filename: Option<String>,
    #[serde(default)]
    pub max_connections: Option<u32>,
    #[serde(default)]
    pub min_connections: Option<u32>,
}

impl DatabaseConfig {
    pub fn db_type(&self) -> DbType {
        let url = self.connection_string();
        if url.starts_with("sqlite://") || self.filename.is_some() {
            DbType::Sqlite
        } else {
            DbType::Postgres
        }
    }

    pub fn connection_string(&self) -> String {
        if let Some(ref url) = self.url {
            url.clone()
        } else if let Some(ref conn) = self.conn_string {
            conn.clone()
        } else if let Some(ref file) = self.filename {
            format!("sqlite://{}", file)
        } else {
            String::new()
        }
    }

    pub fn sqlite_path(&self) -> Option<String> {
        if let DbType::Sqlite = self.db_type() {
            let url = self.connection_string();
            Some(url.strip_prefix("sqlite://").unwrap_or(&url).to_string())
        } else {
            None
        }
    }

    pub fn max_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.max_connections,
            DbType::Sqlite => Some(1),
        }
    }

    pub fn min_connections(&self) -> Option<u32> {
        match self.db_type() {
            DbType::Postgres => self.min_connections,
            DbType::Sqlite => Some(1),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DbType {
    Postgres,
    Sqlite,
}

/// Role-gate tables. These encode organization rules (who may book which
/// weekday, alternating-week access, the morning unlock hour), so they are
/// configuration rather than code.
#[derive(Debug, Clone, Deserialize)]
pub struct PolicyConfig {
    #[serde(default = "default_unlock_hour")]
    pub unlock_hour: u32,
    #[serde(default = "default_policy_roles")]
    pub roles: BTreeMap<String, RoleRuleConfig>,
}

impl Default for PolicyConfig {
    fn default() -> Self {
        Self {
            unlock_hour: default_unlock_hour(),
            roles: default_policy_roles(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RoleRuleConfig {
    #[serde(default)]
    pub weekdays: Vec<String>,
    #[serde(default)]
    pub alternating: Vec<AlternatingDayConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlternatingDayConfig {
    pub weekday: String,
    pub parity: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct NotifyConfig {
    #[serde(default)]
    pub webhook_url: Option<String>,
    #[serde(default = "default_notify_timeout_ms")]
    pub timeout_ms: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("CONFIG_PATH").unwrap_or_else(|_| "config.yaml".to_string());

        Self::load_from_file(&config_path)
    }

    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let mut config: Config = serde_yaml::from_str(&content)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 {
            return Err(ConfigError::InvalidConfig(
                "server.port must be between 1 and 65535".to_string(),
            ));
        }

        if self.auth.api_token.expose_secret().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.api_token cannot be empty".to_string(),
            ));
        }

        if self.auth.admin_token.expose_secret().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "auth.admin_token cannot be empty".to_string(),
            ));
        }

        if self.database.connection_string().is_empty() {
            return Err(ConfigError::InvalidConfig(
                "database connection string cannot be empty".to_string(),
            ));
        }

        if self.policy.unlock_hour > 23 {
            return Err(ConfigError::InvalidConfig(
                "policy.unlock_hour must be between 0 and 23".to_string(),
            ));
        }

        for (role_name, rule) in &self.policy.roles {
            if Role::parse(role_name).is_none() {
                return Err(ConfigError::InvalidConfig(format!(
                    "unknown role in policy table: {role_name}"
                )));
            }
            for weekday in &rule.weekdays {
                validate_weekday(weekday)?;
            }
            for alternating in &rule.alternating {
                validate_weekday(&alternating.weekday)?;
                validate_parity(&alternating.parity)?;
            }
        }

        if let Some(ref webhook_url) = self.notify.webhook_url {
            url::Url::parse(webhook_url).map_err(|e| {
                ConfigError::InvalidConfig(format!("notify.webhook_url is not a valid URL: {e}"))
            })?;
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(value) = std::env::var("DESKBOOK_DATABASE_URL") {
            self.database.url = Some(value);
        }
        if let Ok(value) = std::env::var("DESKBOOK_API_TOKEN") {
            self.auth.api_token = SecretString::from(value);
        }
        if let Ok(value) = std::env::var("DESKBOOK_ADMIN_TOKEN") {
            self.auth.admin_token = SecretString::from(value);
        }
        if let Ok(value) = std::env::var("DESKBOOK_WEBHOOK_URL") {
            self.notify.webhook_url = Some(value);
        }
    }
}

fn default_port() -> u16 {
    8320
}

fn default_bind_address() -> String {
    "0.0.0.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}

fn default_unlock_hour() -> u32 {
    7
}

fn default_notify_timeout_ms() -> u64 {
    5000
}

fn default_policy_roles() -> BTreeMap<String, RoleRuleConfig> {
    let mut roles = BTreeMap::new();
    roles.insert(
        "spp".to_string(),
        RoleRuleConfig {
            weekdays: weekday_list(&["Mon", "Tue", "Thu", "Fri"]),
            alternating: vec![AlternatingDayConfig {
                weekday: "Wed".to_string(),
                parity: "even".to_string(),
            }],
        },
    );
    roles.insert(
        "gst".to_string(),
        RoleRuleConfig {
            weekdays: weekday_list(&["Tue", "Thu"]),
            alternating: vec![AlternatingDayConfig {
                weekday: "Wed".to_string(),
                parity: "odd".to_string(),
            }],
        },
    );
    roles.insert(
        "intern".to_string(),
        RoleRuleConfig {
            weekdays: weekday_list(&["Mon", "Tue", "Wed", "Thu", "Fri"]),
            alternating: Vec::new(),
        },
    );
    roles.insert(
        "user".to_string(),
        RoleRuleConfig {
            weekdays: weekday_list(&["Mon", "Tue", "Wed", "Thu", "Fri"]),
            alternating: Vec::new(),
        },
    );
    roles
}

fn weekday_list(days: &[&str]) -> Vec<String> {
    days.iter().map(|d| d.to_string()).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_yaml() -> &'static str {
        r#"
server:
  port: 9000
auth:
  api_token: "user-secret"
  admin_token: "admin-secret"
database:
  filename: "deskbook.db"
"#
    }

    #[test]
    fn minimal_config_parses_with_defaults() {
        let config: Config = serde_yaml::from_str(minimal_yaml()).expect("parse");
        config.validate().expect("valid");

        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.bind_address, "0.0.0.0");
        assert_eq!(config.policy.unlock_hour, 7);
        assert!(config.policy.roles.contains_key("spp"));
        assert_eq!(config.database.db_type(), DbType::Sqlite);
        assert_eq!(config.database.sqlite_path().as_deref(), Some("deskbook.db"));
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn postgres_url_selects_postgres_backend() {
        let yaml = r#"
server:
  port: 9000
auth:
  api_token: "a"
  admin_token: "b"
database:
  url: "postgres://deskbook:pw@localhost/deskbook"
  max_connections: 8
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert_eq!(config.database.db_type(), DbType::Postgres);
        assert_eq!(config.database.max_connections(), Some(8));
        assert!(config.database.sqlite_path().is_none());
    }

    #[test]
    fn empty_token_is_rejected() {
        let yaml = r#"
server:
  port: 9000
auth:
  api_token: ""
  admin_token: "admin-secret"
database:
  filename: "deskbook.db"
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_policy_weekday_is_rejected() {
        let yaml = r#"
server:
  port: 9000
auth:
  api_token: "a"
  admin_token: "b"
database:
  filename: "deskbook.db"
policy:
  roles:
    spp:
      weekdays: ["Funday"]
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn unknown_policy_role_is_rejected() {
        let yaml = r#"
server:
  port: 9000
auth:
  api_token: "a"
  admin_token: "b"
database:
  filename: "deskbook.db"
policy:
  roles:
    supervisor:
      weekdays: ["Mon"]
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.validate().is_err());
    }

    #[test]
    fn invalid_webhook_url_is_rejected() {
        let yaml = r#"
server:
  port: 9000
auth:
  api_token: "a"
  admin_token: "b"
database:
  filename: "deskbook.db"
notify:
  webhook_url: "not a url"
"#;
        let config: Config = serde_yaml::from_str(yaml).expect("parse");
        assert!(config.validate().is_err());
    }
}
