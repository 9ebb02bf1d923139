use anyhow::{anyhow, Result};
use serde::Deserialize;
use std::env;
use std::path::{Path, PathBuf};

const MIN_BCRYPT_COST: u32 = 4;
const MAX_BCRYPT_COST: u32 = 31;

#[derive(Debug, Clone)]
pub struct LentaConfig {
    pub api_port: u16,
    pub paths: LentaPaths,
    pub auth: AuthConfig,
}

impl LentaConfig {
    pub fn from_env() -> Result<Self> {
        let paths = match env::var("LENTA_HOME") {
            Ok(raw) if !raw.trim().is_empty() => LentaPaths::from_base_dir(raw.trim())?,
            _ => LentaPaths::discover()?,
        };
        let api_port = env::var("LENTA_API_PORT")
            .ok()
            .and_then(|raw| raw.parse().ok())
            .unwrap_or(8080);
        let auth = AuthConfig::from_env();
        Ok(Self {
            api_port,
            paths,
            auth,
        })
    }

    pub fn new(api_port: u16, paths: LentaPaths, auth: AuthConfig) -> Self {
        Self {
            api_port,
            paths,
            auth,
        }
    }
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub bcrypt_cost: u32,
    pub session_ttl_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            bcrypt_cost: bcrypt::DEFAULT_COST,
            session_ttl_hours: 24 * 14,
        }
    }
}

impl AuthConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let bcrypt_cost = env::var("LENTA_BCRYPT_COST")
            .ok()
            .and_then(|raw| raw.parse::<u32>().ok())
            .map(|cost| cost.clamp(MIN_BCRYPT_COST, MAX_BCRYPT_COST))
            .unwrap_or(defaults.bcrypt_cost);
        let session_ttl_hours = env::var("LENTA_SESSION_TTL_HOURS")
            .ok()
            .and_then(|raw| raw.parse::<i64>().ok())
            .filter(|hours| *hours > 0)
            .unwrap_or(defaults.session_ttl_hours);
        Self {
            bcrypt_cost,
            session_ttl_hours,
        }
    }

    /// Cheapest settings bcrypt accepts; meant for tests.
    pub fn fast_for_tests() -> Self {
        Self {
            bcrypt_cost: MIN_BCRYPT_COST,
            ..Self::default()
        }
    }
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct LentaPaths {
    pub base: PathBuf,
    pub data_dir: PathBuf,
    pub db_path: PathBuf,
    pub logs_dir: PathBuf,
}

impl LentaPaths {
    pub fn discover() -> Result<Self> {
        let exe_path = std::env::current_exe()
            .map_err(|err| anyhow!("failed to resolve current executable: {err}"))?;
        let base = exe_path
            .parent()
            .ok_or_else(|| anyhow!("executable path missing parent"))?
            .to_path_buf();
        Self::from_base_dir(base)
    }

    pub fn from_base_dir<P: AsRef<Path>>(base: P) -> Result<Self> {
        let base = base.as_ref().to_path_buf();
        let data_dir = base.join("data");
        let db_path = data_dir.join("lenta.db");
        let logs_dir = base.join("logs");

        Ok(Self {
            base,
            data_dir,
            db_path,
            logs_dir,
        })
    }
}
