use log::warn;
use std::path::PathBuf;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BCRYPT_COST: u32 = 10;

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("invalid {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    /// Directory of the sled database; a temporary store is used when unset.
    pub connection_uri: Option<String>,
    pub jwt_secret: String,
    pub bcrypt_cost: u32,
    pub seed_file: Option<PathBuf>,
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let non_empty = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        let port = match non_empty("PORT") {
            Some(value) => value.trim().parse::<u16>().map_err(|_| ConfigError::Invalid {
                name: "PORT",
                value,
            })?,
            None => DEFAULT_PORT,
        };
        let bcrypt_cost = match non_empty("BCRYPT_COST") {
            Some(value) => match value.trim().parse::<u32>() {
                Ok(cost) if (4..=31).contains(&cost) => cost,
                _ => {
                    return Err(ConfigError::Invalid {
                        name: "BCRYPT_COST",
                        value,
                    })
                }
            },
            None => DEFAULT_BCRYPT_COST,
        };
        let jwt_secret = non_empty("JWT_SECRET").ok_or(ConfigError::Missing("JWT_SECRET"))?;

        Ok(Config {
            port,
            connection_uri: non_empty("CONNECTION_URI"),
            jwt_secret,
            bcrypt_cost,
            seed_file: non_empty("SEED_FILE").map(PathBuf::from),
        })
    }

    pub fn open_db(&self) -> sled::Result<sled::Db> {
        match &self.connection_uri {
            Some(path) => sled::open(path),
            None => {
                warn!("CONNECTION_URI not set, using a temporary database");
                sled::Config::new().temporary(true).open()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults() {
        let config = config(&[("JWT_SECRET", "s3cret")]).unwrap();
        assert_eq!(config.port, 8080);
        assert_eq!(config.bcrypt_cost, 10);
        assert_eq!(config.connection_uri, None);
        assert_eq!(config.seed_file, None);
    }

    #[test]
    fn secret_is_required() {
        assert_eq!(config(&[]).unwrap_err(), ConfigError::Missing("JWT_SECRET"));
        assert_eq!(
            config(&[("JWT_SECRET", "  ")]).unwrap_err(),
            ConfigError::Missing("JWT_SECRET")
        );
    }

    #[test]
    fn rejects_bad_numbers() {
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("PORT", "http")]),
            Err(ConfigError::Invalid { name: "PORT", .. })
        ));
        assert!(matches!(
            config(&[("JWT_SECRET", "s"), ("BCRYPT_COST", "2")]),
            Err(ConfigError::Invalid { name: "BCRYPT_COST", .. })
        ));
    }

    #[test]
    fn reads_everything() {
        let config = config(&[
            ("JWT_SECRET", "s"),
            ("PORT", "3000"),
            ("CONNECTION_URI", "/var/lib/ymdb"),
            ("BCRYPT_COST", "12"),
            ("SEED_FILE", "data/seed.json"),
        ])
        .unwrap();
        assert_eq!(config.port, 3000);
        assert_eq!(config.connection_uri.as_deref(), Some("/var/lib/ymdb"));
        assert_eq!(config.bcrypt_cost, 12);
        assert_eq!(config.seed_file, Some(PathBuf::from("data/seed.json")));
    }
}
