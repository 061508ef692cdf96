use log::debug;
use std::net::SocketAddr;
use std::sync::Arc;

use crate::catalog::LocalStorage;
use crate::catalog::errors::{Error, Result};
use crate::catalog::pagination::DEFAULT_PAGE_SIZE;

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:8000";

// Configuration for the Server struct
pub struct Config {
    pub storage: Arc<LocalStorage>,
    pub bind_addr: SocketAddr,
    pub page_size: u32,
}

/// Explicit values win, then `DATABASE_URL` / `MUSICBOX_ADDR` /
/// `MUSICBOX_PAGE_SIZE`, then built-in defaults.
#[derive(Default)]
pub struct ConfigBuilder {
    database_url: Option<String>,
    bind_addr: Option<String>,
    page_size: Option<u32>,
    storage: Option<Arc<LocalStorage>>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn database_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    pub fn bind_addr(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = Some(addr.into());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }

    /// Use an already opened storage instead of connecting.
    pub fn storage(mut self, storage: Arc<LocalStorage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn build(self) -> Result<Config> {
        let bind_addr: SocketAddr = match self.bind_addr {
            Some(addr) => addr,
            None => env_or("MUSICBOX_ADDR", DEFAULT_BIND_ADDR),
        }
        .parse()?;

        let page_size = match self.page_size {
            Some(size) => size,
            None => match std::env::var("MUSICBOX_PAGE_SIZE") {
                Ok(raw) => raw.trim().parse().map_err(|_| {
                    Error::ConfigurationError(format!("MUSICBOX_PAGE_SIZE is not a number: {raw}"))
                })?,
                Err(_) => DEFAULT_PAGE_SIZE,
            },
        };
        if page_size == 0 {
            return Err(Error::ConfigurationError(
                "page size must be greater than zero".into(),
            ));
        }

        let storage = match self.storage {
            Some(s) => s,
            None => {
                let url = match self.database_url {
                    Some(url) => url,
                    None => env_or("DATABASE_URL", &LocalStorage::default_url()),
                };
                Arc::new(LocalStorage::connect(&url).await?)
            }
        };

        debug!("Configured server on {bind_addr} with page size {page_size}");
        Ok(Config {
            storage,
            bind_addr,
            page_size,
        })
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}
