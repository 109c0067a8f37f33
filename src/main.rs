//! vitrine — self-hosted directory listing and media gallery server.

use std::fs;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod api;
mod auth;
mod config;
mod format;
mod listing;
mod paths;
mod prefs;
mod render;
mod themes;

use api::{AppState, IconFile};
use config::{Config, ConfigError};
use prefs::{IconSettings, PageConfig};

#[derive(Parser)]
#[command(name = "vitrine")]
#[command(about = "Self-hosted directory listing and media gallery server", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the server (runs in background)
    Serve {
        /// Run in foreground (don't daemonize)
        #[arg(long)]
        foreground: bool,

        /// Config file path
        #[arg(short, long, env = "VITRINE_CONFIG")]
        config: Option<PathBuf>,

        /// Port to listen on (overrides the config file)
        #[arg(short, long, env = "VITRINE_PORT")]
        port: Option<u16>,

        /// Address to bind to (overrides the config file)
        #[arg(short, long, env = "VITRINE_BIND")]
        bind: Option<String>,

        /// Root directory to serve (overrides the config file)
        #[arg(short, long, env = "VITRINE_ROOT")]
        root: Option<PathBuf>,
    },
    /// Stop the server
    Down,
    /// Show server status
    Status,
}

fn pid_file() -> PathBuf {
    dirs::runtime_dir()
        .or_else(dirs::data_local_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join("vitrine.pid")
}

fn is_server_running() -> Option<u32> {
    let pid_path = pid_file();
    if pid_path.exists() {
        if let Ok(pid_str) = fs::read_to_string(&pid_path) {
            if let Ok(pid) = pid_str.trim().parse::<u32>() {
                #[cfg(unix)]
                {
                    let result = Command::new("kill")
                        .args(["-0", &pid.to_string()])
                        .stdout(Stdio::null())
                        .stderr(Stdio::null())
                        .status();
                    if result.map(|s| s.success()).unwrap_or(false) {
                        return Some(pid);
                    }
                }
                #[cfg(not(unix))]
                {
                    return Some(pid);
                }
            }
        }
        // Stale pid file, remove it
        let _ = fs::remove_file(&pid_path);
    }
    None
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Down => stop_server(),
        Commands::Status => show_status(),
        Commands::Serve {
            foreground: false,
            config,
            port,
            bind,
            root,
        } => start_daemon(config, port, bind, root),
        Commands::Serve {
            foreground: true,
            config,
            port,
            bind,
            root,
        } => {
            let config = load_config(config, port, bind, root)?;

            let default_filter = if config.debug {
                "vitrine=debug,tower_http=debug"
            } else {
                "vitrine=info,tower_http=info"
            };

            tracing_subscriber::registry()
                .with(
                    tracing_subscriber::EnvFilter::try_from_default_env()
                        .unwrap_or_else(|_| default_filter.into()),
                )
                .with(tracing_subscriber::fmt::layer())
                .init();

            run_server(config).await
        }
    }
}

fn load_config(
    path: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
    root: Option<PathBuf>,
) -> Result<Config, ConfigError> {
    let mut config = match path {
        Some(path) => Config::from_file(&path)?,
        None => Config::default(),
    };

    if let Some(port) = port {
        config.server.port = port;
    }
    if let Some(bind) = bind {
        config.server.bind = bind;
    }
    if let Some(root) = root {
        config.server.root = root;
    }

    Ok(config)
}

fn start_daemon(
    config: Option<PathBuf>,
    port: Option<u16>,
    bind: Option<String>,
    root: Option<PathBuf>,
) -> anyhow::Result<()> {
    if let Some(pid) = is_server_running() {
        println!("vitrine already running (pid {})", pid);
        return Ok(());
    }

    let exe = std::env::current_exe()?;

    let mut args: Vec<String> = vec!["serve".to_string(), "--foreground".to_string()];
    if let Some(config) = &config {
        args.push("--config".to_string());
        args.push(config.display().to_string());
    }
    if let Some(port) = port {
        args.push("--port".to_string());
        args.push(port.to_string());
    }
    if let Some(bind) = &bind {
        args.push("--bind".to_string());
        args.push(bind.clone());
    }
    if let Some(root) = &root {
        args.push("--root".to_string());
        args.push(root.display().to_string());
    }

    let child = Command::new(&exe)
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .spawn()?;

    let pid = child.id();

    let pid_path = pid_file();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, pid.to_string())?;

    let loaded = load_config(config, port, bind, root)?;
    println!("vitrine serving on {}:{}", loaded.server.bind, loaded.server.port);
    println!("pid: {}", pid);

    Ok(())
}

fn stop_server() -> anyhow::Result<()> {
    if let Some(pid) = is_server_running() {
        #[cfg(unix)]
        {
            Command::new("kill").arg(pid.to_string()).status()?;
        }
        #[cfg(not(unix))]
        {
            Command::new("taskkill")
                .args(["/PID", &pid.to_string(), "/F"])
                .status()?;
        }

        let _ = fs::remove_file(pid_file());
        println!("vitrine stopped");
    } else {
        println!("vitrine not running");
    }
    Ok(())
}

fn show_status() -> anyhow::Result<()> {
    if let Some(pid) = is_server_running() {
        println!("vitrine running");
        println!("  pid: {}", pid);
    } else {
        println!("vitrine not running");
    }
    Ok(())
}

/// Resolves the configured favicon; a missing file warns and continues.
fn resolve_icon(config: &Config) -> Option<IconFile> {
    let icon = config.icon.as_ref()?;

    if !icon.file.exists() {
        tracing::warn!(
            path = %icon.file.display(),
            "custom favicon does not exist - continuing without"
        );
        return None;
    }

    let extension = icon
        .file
        .extension()
        .map(|e| format!(".{}", e.to_string_lossy()))
        .unwrap_or_default();

    let mime = icon.mime.clone().unwrap_or_else(|| {
        mime_guess::from_path(&icon.file)
            .first_or_octet_stream()
            .to_string()
    });

    Some(IconFile {
        uri: format!("/favicon{extension}"),
        file: icon.file.clone(),
        mime,
    })
}

async fn run_server(config: Config) -> anyhow::Result<()> {
    // Save PID for foreground mode too
    let pid_path = pid_file();
    if let Some(parent) = pid_path.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::write(&pid_path, std::process::id().to_string())?;

    // Fatal startup checks: the served root must exist, and a configured
    // asset bundle must actually be there.
    let root = config
        .server
        .root
        .canonicalize()
        .map_err(|_| ConfigError::RootMissing(config.server.root.clone()))?;
    if !root.is_dir() {
        return Err(ConfigError::RootNotDirectory(root).into());
    }

    if let Some(assets) = &config.assets {
        if !assets.is_dir() {
            return Err(ConfigError::AssetsMissing(assets.clone()).into());
        }
    }

    if config.debug {
        tracing::debug!("debugging is enabled");
        tracing::debug!(root = %root.display(), "serving root directory");
    }

    // Startup-time enrichment, before the config freezes into the state.
    let theme_settings = themes::resolve_themes(&config).await;
    let icon = resolve_icon(&config);

    let icon_settings = IconSettings {
        path: icon.as_ref().map(|i| i.uri.clone()),
        mime: icon
            .as_ref()
            .map(|i| i.mime.clone())
            .unwrap_or_else(|| "image/png".to_string()),
    };

    let template = PageConfig::template(&config, theme_settings, icon_settings);

    let addr: SocketAddr = format!("{}:{}", config.server.bind, config.server.port).parse()?;
    let state = AppState::new(root, config, template, icon);
    let app = api::router(state);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("listening on http://{}", addr);

    axum::serve(listener, app).await?;

    // Cleanup PID file
    let _ = fs::remove_file(pid_file());

    Ok(())
}
