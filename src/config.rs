pub use self::parser::{
    AlternatingDayConfig, AuthConfig, Config, DatabaseConfig, DbType, LoggingConfig,
    NotifyConfig, PolicyConfig, RoleRuleConfig, ServerConfig,
};
pub use self::validator::ConfigError;

mod parser;
mod validator;
