//! Settings, from the environment.

use std::{path::PathBuf, time::Duration};

use anyhow::{Result, bail};

use crate::page_cache::DEFAULT_PAGE_CACHE_SIZE;
use crate::util::{getenv, getenv_bool, getenv_parsed};


#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub listen_addr: String,
    /// Pages kept per session
    pub page_cache_size: usize,
    pub session_timeout: Duration,
    pub worker_threads: usize,
    /// Where `access.log` and `error.log` go; stderr if None.
    pub log_dir: Option<PathBuf>,
    pub debug: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        AppConfig {
            listen_addr: "127.0.0.1:1200".into(),
            page_cache_size: DEFAULT_PAGE_CACHE_SIZE,
            session_timeout: Duration::from_secs(3600),
            worker_threads: 4,
            log_dir: None,
            debug: false,
        }
    }
}

impl AppConfig {
    /// `NG_LISTEN_ADDR`, `NG_PAGE_CACHE_SIZE`, `NG_SESSION_TIMEOUT`
    /// (seconds), `NG_WORKER_THREADS`, `NG_LOG_DIR`, `NG_DEBUG`; unset
    /// variables keep the defaults.
    pub fn from_env() -> Result<Self> {
        let d = AppConfig::default();
        let config = AppConfig {
            listen_addr: getenv("NG_LISTEN_ADDR")?.unwrap_or(d.listen_addr),
            page_cache_size: getenv_parsed("NG_PAGE_CACHE_SIZE", d.page_cache_size)?,
            session_timeout: Duration::from_secs(
                getenv_parsed("NG_SESSION_TIMEOUT", d.session_timeout.as_secs())?),
            worker_threads: getenv_parsed("NG_WORKER_THREADS", d.worker_threads)?,
            log_dir: getenv("NG_LOG_DIR")?.filter(|s| !s.is_empty()).map(PathBuf::from),
            debug: getenv_bool("NG_DEBUG", d.debug)?,
        };
        config.check()?;
        Ok(config)
    }

    pub fn check(&self) -> Result<()> {
        if self.page_cache_size == 0 {
            bail!("NG_PAGE_CACHE_SIZE must be at least 1")
        }
        if self.worker_threads == 0 {
            bail!("NG_WORKER_THREADS must be at least 1")
        }
        if self.session_timeout.is_zero() {
            bail!("NG_SESSION_TIMEOUT must be at least 1")
        }
        Ok(())
    }
}
