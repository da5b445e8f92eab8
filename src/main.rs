//! Tile Pyramid - command-line front end for the tile engine.
//!
//! Opens a source, runs one request and writes the result to a file or
//! stdout.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tokio::io::AsyncWriteExt;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use tile_pyramid::{
    config::{Cli, Command, Config, RenderArgs, SourceArgs, TileArgs},
    DirectPaths, EncodedImage, LocalStorage, SourceRegistry, StorageResolver, TileCoord,
    TileError, TileRequest, TileService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    init_logging(cli.config.verbose);

    if let Err(e) = cli.config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    let service = build_service(&cli.config);
    match run(&service, cli.command).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(status = e.status_code().as_u16(), "{}", e);
            ExitCode::FAILURE
        }
    }
}

fn build_service(config: &Config) -> TileService {
    let storage: Arc<dyn StorageResolver> = match config.root {
        Some(ref root) => {
            info!("Resolving files under {}", root.display());
            Arc::new(LocalStorage::new(root))
        }
        None => Arc::new(DirectPaths),
    };
    let registry = SourceRegistry::new(storage, config.source_options());
    TileService::with_cache_capacity(registry, config.cache_tiles)
}

// =============================================================================
// Commands
// =============================================================================

async fn run(service: &TileService, command: Command) -> Result<(), TileError> {
    match command {
        Command::Metadata(args) => run_metadata(service, args).await,
        Command::Tile(args) => run_tile(service, args).await,
        Command::Thumbnail(args) => {
            let image = service
                .get_thumbnail(&args.source.source, &args.source.params())
                .await?;
            write_image(&args, image).await
        }
        Command::Region(args) => {
            let image = service
                .get_region(&args.source.source, &args.source.params())
                .await?;
            write_image(&args, image).await
        }
    }
}

async fn run_metadata(service: &TileService, args: SourceArgs) -> Result<(), TileError> {
    let metadata = service.metadata(&args.source, &args.params()).await?;
    let json = serde_json::to_string_pretty(&metadata)
        .map_err(|e| TileError::encode(e.to_string()))?;
    println!("{}", json);
    Ok(())
}

async fn run_tile(service: &TileService, args: TileArgs) -> Result<(), TileError> {
    let coord = TileCoord::parse(&args.level, &args.x, &args.y)?;
    let request = TileRequest {
        source: args.source.source.clone(),
        coord,
        params: args.source.params(),
    };
    let response = service.get_tile(&request).await?;
    info!(
        mime = response.image.mime_type(),
        bytes = response.image.data.len(),
        "Tile ready"
    );
    write_output(args.output.as_deref(), &response.image.data).await
}

async fn write_image(args: &RenderArgs, image: EncodedImage) -> Result<(), TileError> {
    if image.data.is_empty() {
        info!("Empty region, nothing to write");
    }
    write_output(args.output.as_deref(), &image.data).await
}

async fn write_output(path: Option<&Path>, data: &[u8]) -> Result<(), TileError> {
    let result = match path {
        Some(path) => tokio::fs::write(path, data).await,
        None => {
            let mut stdout = tokio::io::stdout();
            match stdout.write_all(data).await {
                Ok(()) => stdout.flush().await,
                Err(e) => Err(e),
            }
        }
    };
    result.map_err(|e| TileError::encode(format!("Failed to write output: {}", e)))
}

/// Initialize the tracing subscriber for logging.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "tile_pyramid=debug"
    } else {
        "tile_pyramid=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
