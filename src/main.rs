//! Metatile renderer - render map tiles a metatile at a time.
//!
//! This binary renders tiles with the built-in debug engine, either one tile
//! at a time or a whole metatile into a `z/x/y` directory tree.

use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use metatile_renderer::{
    config::{BatchArgs, Cli, Command, RenderArgs, TileArgs},
    engine::{DebugEngine, StyleSource},
    error::RenderError,
    tile::{TileFormat, TileRenderer},
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let result = match cli.command {
        Command::Tile(args) => run_tile(args).await,
        Command::Batch(args) => run_batch(args).await,
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "metatile_renderer=debug"
    } else {
        "metatile_renderer=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Load the style and build a renderer for the requested format.
async fn build_renderer(args: &RenderArgs) -> Result<TileRenderer<DebugEngine>, RenderError> {
    let format: TileFormat = args.format.parse()?;
    let style = StyleSource::from_file(&args.style).await?;
    let config = args.renderer_config(&style);

    info!(
        "Rendering {} tiles from {} (metatile {}, pool {})",
        format,
        args.style.display(),
        config.metatile,
        config.pool_max_size
    );

    TileRenderer::new(format.kind(), Arc::new(DebugEngine::new()), &config)
}

// =============================================================================
// Tile Command
// =============================================================================

async fn run_tile(args: TileArgs) -> Result<(), RenderError> {
    let renderer = build_renderer(&args.render).await?;
    let render = &args.render;

    let result = renderer
        .get_tile(&render.format, render.z, render.x, render.y)
        .await;
    renderer.close().await;
    let tile = result?;

    write_file(&args.output, &tile.data).await?;
    info!("Wrote {} bytes to {}", tile.data.len(), args.output.display());

    let headers = serde_json::to_string_pretty(&tile.headers)
        .map_err(|e| RenderError::Render(e.to_string()))?;
    println!("{}", headers);

    Ok(())
}

// =============================================================================
// Batch Command
// =============================================================================

async fn run_batch(args: BatchArgs) -> Result<(), RenderError> {
    let renderer = build_renderer(&args.render).await?;
    let render = &args.render;
    let format: TileFormat = render.format.parse()?;

    let result = renderer
        .get_metatile(&render.format, render.z, render.x, render.y)
        .await;
    renderer.close().await;
    let tiles = result?;

    for (coord, tile) in &tiles {
        let path = args
            .out_dir
            .join(coord.z.to_string())
            .join(coord.x.to_string())
            .join(format!("{}.{}", coord.y, format.extension()));
        write_file(&path, &tile.data).await?;
        println!("{}", path.display());
    }

    info!("Wrote {} tile(s) to {}", tiles.len(), args.out_dir.display());
    Ok(())
}

async fn write_file(path: &Path, data: &[u8]) -> Result<(), RenderError> {
    let io_error = |e: std::io::Error| RenderError::Render(format!("{}: {}", path.display(), e));

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_error)?;
    }
    tokio::fs::write(path, data).await.map_err(io_error)
}
