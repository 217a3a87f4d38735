use anyhow::{Context, Result, bail};

const DEFAULT_MAX_CONNECTIONS: u32 = 10;
const DEFAULT_HISTORY_EMBED_LIMIT: usize = 20;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StoreBackend {
    Postgres {
        database_url: String,
        max_connections: u32,
    },
    Memory,
}

#[derive(Clone, Debug)]
pub struct ServiceConfig {
    pub store: StoreBackend,
    pub redis_url: Option<String>,
    pub http_addr: String,
    pub history_embed_limit: usize,
}

impl ServiceConfig {
    pub fn from_env(default_http_addr: &str) -> Result<Self> {
        Self::from_lookup(default_http_addr, |key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(default_http_addr: &str, lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            lookup(key)
                .map(|value| value.trim().to_string())
                .filter(|value| !value.is_empty())
        };

        let store = match var("STOCK_STORE")
            .unwrap_or_else(|| "postgres".to_string())
            .to_ascii_lowercase()
            .as_str()
        {
            "postgres" => {
                let database_url = var("DATABASE_URL").context("DATABASE_URL is required")?;
                let max_connections = var("DATABASE_MAX_CONNECTIONS")
                    .map(|value| {
                        value
                            .parse::<u32>()
                            .context("DATABASE_MAX_CONNECTIONS must be a positive integer")
                    })
                    .transpose()?
                    .unwrap_or(DEFAULT_MAX_CONNECTIONS);
                if max_connections == 0 {
                    bail!("DATABASE_MAX_CONNECTIONS must be a positive integer");
                }
                StoreBackend::Postgres {
                    database_url,
                    max_connections,
                }
            }
            "memory" => StoreBackend::Memory,
            other => bail!("STOCK_STORE must be postgres or memory, got {other}"),
        };

        let history_embed_limit = var("HISTORY_EMBED_LIMIT")
            .map(|value| {
                value
                    .parse::<usize>()
                    .context("HISTORY_EMBED_LIMIT must be a non-negative integer")
            })
            .transpose()?
            .unwrap_or(DEFAULT_HISTORY_EMBED_LIMIT);

        Ok(Self {
            store,
            redis_url: var("REDIS_URL"),
            http_addr: var("HTTP_ADDR").unwrap_or_else(|| default_http_addr.to_string()),
            history_embed_limit,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn config_from(pairs: &[(&str, &str)]) -> Result<ServiceConfig> {
        let env: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect();
        ServiceConfig::from_lookup("0.0.0.0:8080", |key| env.get(key).cloned())
    }

    #[test]
    fn postgres_is_the_default_backend() {
        let config = config_from(&[("DATABASE_URL", "postgres://localhost/fallah")]).unwrap();
        assert_eq!(
            config.store,
            StoreBackend::Postgres {
                database_url: "postgres://localhost/fallah".to_string(),
                max_connections: 10,
            }
        );
        assert_eq!(config.http_addr, "0.0.0.0:8080");
        assert_eq!(config.history_embed_limit, 20);
        assert!(config.redis_url.is_none());
    }

    #[test]
    fn postgres_requires_database_url() {
        let err = config_from(&[]).unwrap_err();
        assert_eq!(err.to_string(), "DATABASE_URL is required");
    }

    #[test]
    fn memory_backend_needs_no_database() {
        let config = config_from(&[
            ("STOCK_STORE", "Memory"),
            ("REDIS_URL", "redis://127.0.0.1:6379"),
            ("HTTP_ADDR", "127.0.0.1:9000"),
            ("HISTORY_EMBED_LIMIT", "5"),
        ])
        .unwrap();
        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.redis_url.as_deref(), Some("redis://127.0.0.1:6379"));
        assert_eq!(config.http_addr, "127.0.0.1:9000");
        assert_eq!(config.history_embed_limit, 5);
    }

    #[test]
    fn rejects_unknown_backend_and_bad_numbers() {
        assert!(config_from(&[("STOCK_STORE", "sqlite")]).is_err());
        assert!(
            config_from(&[
                ("DATABASE_URL", "postgres://localhost/fallah"),
                ("DATABASE_MAX_CONNECTIONS", "0"),
            ])
            .is_err()
        );
        assert!(
            config_from(&[("STOCK_STORE", "memory"), ("HISTORY_EMBED_LIMIT", "many")]).is_err()
        );
    }
}
