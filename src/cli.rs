use clap::{Parser, Subcommand};
use log::info;
use musicbox::catalog::errors::Result;
use musicbox::config::ConfigBuilder;
use musicbox::server::Server;

#[derive(Parser)]
#[command(name = "musicbox")]
#[command(version, about = "REST API for a music catalog of artists, albums and songs", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the schema if needed and serve the API
    Serve {
        /// Listen address, e.g. 127.0.0.1:8000
        #[arg(long)]
        bind: Option<String>,
        /// SQLite URL, e.g. sqlite:musicbox.db
        #[arg(long)]
        database_url: Option<String>,
    },
    /// Create the schema and exit
    Migrate {
        /// SQLite URL, e.g. sqlite:musicbox.db
        #[arg(long)]
        database_url: Option<String>,
    },
}

pub async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { bind, database_url } => serve(bind, database_url).await,
        Commands::Migrate { database_url } => migrate(database_url).await,
    }
}

fn builder(database_url: Option<String>) -> ConfigBuilder {
    match database_url {
        Some(url) => ConfigBuilder::new().database_url(url),
        None => ConfigBuilder::new(),
    }
}

async fn serve(bind: Option<String>, database_url: Option<String>) -> Result<()> {
    info!("Building config ...");
    let mut builder = builder(database_url);
    if let Some(bind) = bind {
        builder = builder.bind_addr(bind);
    }
    let config = builder.build().await?;
    Server::new(config).serve().await
}

async fn migrate(database_url: Option<String>) -> Result<()> {
    let config = builder(database_url).build().await?;
    config.storage.init_db().await?;
    info!("Schema is up to date");
    Ok(())
}
