use log::info;
use tokio::net::TcpListener;

use crate::catalog::errors::Result;
use crate::config::Config;
use crate::http::{self, AppState};

// Serves the catalog API described by a Config
pub struct Server {
    config: Config,
}

impl Server {
    pub fn new(config: Config) -> Self {
        Server { config }
    }

    pub fn router(&self) -> axum::Router {
        http::router(AppState {
            storage: self.config.storage.clone(),
            page_size: self.config.page_size,
        })
    }

    /// Prepare the schema, then serve until Ctrl-C.
    pub async fn serve(self) -> Result<()> {
        self.config.storage.init_db().await?;

        let listener = TcpListener::bind(self.config.bind_addr).await?;
        info!("Listening on http://{}", listener.local_addr()?);

        axum::serve(listener, self.router())
            .with_graceful_shutdown(shutdown_signal())
            .await?;

        info!("Server stopped");
        Ok(())
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        log::warn!("Failed to listen for shutdown signal: {e}");
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
