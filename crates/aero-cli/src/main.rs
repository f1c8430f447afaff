use std::path::{Path, PathBuf};
use std::sync::Arc;

use aero_core::{Backend, Dashboard, ImageUpload};
use aero_http::HttpBackend;
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};

mod config;
mod render;

use config::Config;

#[derive(Parser)]
#[command(name = "aero", about = "AERO airport surveillance dashboard CLI")]
struct Cli {
    /// Backend base URL (overrides AERO_API_BASE)
    #[arg(long, global = true)]
    api: Option<String>,

    /// Print snapshots as JSON
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List cameras and the auto-selected stream source
    Cameras,
    /// Upload a photo of a suspicious person for face matching
    Upload {
        /// Image file to analyze
        path: PathBuf,
        /// Confidence threshold in percent (50-100)
        #[arg(short, long)]
        threshold: Option<u8>,
    },
    /// Check backend health once
    Health,
    /// Print the live stream URL for a camera
    StreamUrl {
        /// Camera ID (e.g., "cam1")
        camera: String,
    },
    /// Run a live dashboard session, reading commands from stdin
    Watch,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load()?;
    if let Some(api) = cli.api {
        config.api_base = api;
    }
    tracing::debug!(?config, "configuration loaded");

    let backend = Arc::new(
        HttpBackend::new(&config.api_base, config.request_timeout())
            .with_context(|| format!("cannot use backend {}", config.api_base))?,
    );
    let dashboard = Dashboard::new(backend.clone(), config.dashboard_options());

    match cli.command {
        Commands::Cameras => {
            match dashboard.refresh_cameras().await {
                Ok(cameras) if cameras.is_empty() => println!("No cameras available"),
                Ok(cameras) => {
                    let selected = dashboard.snapshot().selected_camera;
                    for cam in cameras {
                        let marker = if selected.as_deref() == Some(cam.as_str()) { "*" } else { " " };
                        println!("{marker} {}", cam.to_uppercase());
                    }
                }
                Err(err) => println!("Error loading cameras: {err}"),
            }
        }
        Commands::Upload { path, threshold } => {
            if let Some(threshold) = threshold {
                dashboard.set_confidence_threshold(threshold);
            }
            let image = read_image(&path)?;
            println!("Analyzing image...");
            let result = dashboard.submit(image).await;
            print_snapshot(&dashboard, cli.json)?;
            if let Err(err) = result {
                tracing::debug!(error = %err, "upload did not complete");
            }
        }
        Commands::Health => {
            match dashboard.poll_health().await {
                Ok(status) if status.is_running() => println!("ONLINE"),
                Ok(status) => println!("OFFLINE (status: {})", status.status),
                Err(err) => println!("OFFLINE ({err})"),
            }
        }
        Commands::StreamUrl { camera } => {
            println!("{}", backend.stream_url(&camera));
        }
        Commands::Watch => run_watch(dashboard, cli.json).await?,
    }

    Ok(())
}

/// Read an image from disk and determine its MIME type from content, then extension.
fn read_image(path: &Path) -> Result<ImageUpload> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    let mime_type = image::guess_format(&bytes)
        .or_else(|_| image::ImageFormat::from_path(path))
        .map(|format| format.to_mime_type().to_string())
        .unwrap_or_else(|_| "application/octet-stream".to_string());
    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "upload".to_string());

    Ok(ImageUpload {
        bytes,
        mime_type,
        file_name,
    })
}

fn print_snapshot(dashboard: &Dashboard, json: bool) -> Result<()> {
    let snapshot = dashboard.snapshot();
    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
    } else {
        print!("{}", render::render_snapshot(&snapshot));
    }
    Ok(())
}

const WATCH_HELP: &str = "commands: upload <path> | select <camera>|none | start | stop | \
threshold <50-100> | dismiss | refresh | health | quit";

/// Live session: re-render on every state change, run stdin commands.
async fn run_watch(dashboard: Dashboard, json: bool) -> Result<()> {
    dashboard.start().await;

    let mut snapshots = dashboard.subscribe();
    let renderer = tokio::spawn(async move {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if json {
                match serde_json::to_string(&snapshot) {
                    Ok(line) => println!("{line}"),
                    Err(err) => tracing::warn!(error = %err, "snapshot serialization failed"),
                }
            } else {
                println!("{}", render::render_snapshot(&snapshot));
            }
            if snapshots.changed().await.is_err() {
                break;
            }
        }
    });

    eprintln!("{WATCH_HELP}");
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                if !handle_command(&dashboard, line.trim()).await {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("interrupted");
                break;
            }
        }
    }

    dashboard.shutdown();
    renderer.abort();
    Ok(())
}

/// Run one watch command. Returns false to end the session.
async fn handle_command(dashboard: &Dashboard, line: &str) -> bool {
    let (cmd, arg) = match line.split_once(char::is_whitespace) {
        Some((cmd, arg)) => (cmd, arg.trim()),
        None => (line, ""),
    };

    match cmd {
        "" => {}
        "quit" | "exit" => return false,
        "upload" => {
            // Detached: alerts land in completion order.
            match read_image(Path::new(arg)) {
                Ok(image) => {
                    let dashboard = dashboard.clone();
                    tokio::spawn(async move {
                        let _ = dashboard.submit(image).await;
                    });
                }
                Err(err) => eprintln!("{err:#}"),
            }
        }
        "select" => match arg {
            "" | "none" => dashboard.select_camera(None),
            cam => dashboard.select_camera(Some(cam)),
        },
        "start" => {
            dashboard.start_surveillance();
        }
        "stop" => dashboard.stop_surveillance(),
        "threshold" => match arg.parse::<u8>() {
            Ok(value) => {
                dashboard.set_confidence_threshold(value);
            }
            Err(_) => eprintln!("threshold must be a number between 50 and 100"),
        },
        "dismiss" => dashboard.dismiss_matches(),
        "refresh" => {
            let _ = dashboard.refresh_cameras().await;
        }
        "health" => {
            let _ = dashboard.poll_health().await;
        }
        _ => eprintln!("{WATCH_HELP}"),
    }
    true
}
