use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] serde_yaml::Error),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

pub(crate) fn validate_weekday(token: &str) -> Result<(), ConfigError> {
    token
        .parse::<chrono::Weekday>()
        .map(|_| ())
        .map_err(|_| ConfigError::InvalidConfig(format!("unknown weekday: {token}")))
}

pub(crate) fn validate_parity(token: &str) -> Result<(), ConfigError> {
    match token.to_ascii_lowercase().as_str() {
        "odd" | "even" => Ok(()),
        _ => Err(ConfigError::InvalidConfig(format!(
            "week parity must be \"odd\" or \"even\", got: {token}"
        ))),
    }
}
