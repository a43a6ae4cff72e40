use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use catalog::GalleryConfig;
use renderer::gpu::BackendOptions;
use serde::Serialize;
use tracing_subscriber::EnvFilter;

use crate::app;
use crate::cli::{Cli, Command, ConfigAction, InitArgs, RunArgs};
use crate::paths::AppPaths;
use crate::routes::Route;

pub fn run(cli: Cli) -> Result<()> {
    initialise_tracing();

    let paths = AppPaths::discover()?;
    tracing::debug!(
        config_dir = %paths.config_dir().display(),
        "resolved gallery paths"
    );
    let config_path = cli.run.config.clone();

    match cli.command {
        Some(Command::List(args)) => {
            let config = load_config(config_path.as_deref(), &paths)?;
            list_demos(&config, args.json)
        }
        Some(Command::Config(command)) => match command.action {
            ConfigAction::Show => {
                let config = load_config(config_path.as_deref(), &paths)?;
                let text = config
                    .to_toml_string()
                    .context("failed to serialise configuration")?;
                print!("{text}");
                Ok(())
            }
            ConfigAction::Where => {
                println!("{}", resolve_config_path(config_path.as_deref(), &paths).display());
                Ok(())
            }
            ConfigAction::Init(args) => init_config(config_path.as_deref(), &paths, &args),
        },
        None => {
            let config = load_config(config_path.as_deref(), &paths)?;
            open_gallery(cli.run, config)
        }
    }
}

fn initialise_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(io::stderr)
        .init();
}

fn resolve_config_path(explicit: Option<&Path>, paths: &AppPaths) -> PathBuf {
    explicit
        .map(Path::to_path_buf)
        .unwrap_or_else(|| paths.config_file())
}

/// Loads the configuration. An explicitly named file must exist; the default
/// location is optional and falls back to built-in defaults.
fn load_config(explicit: Option<&Path>, paths: &AppPaths) -> Result<GalleryConfig> {
    let path = resolve_config_path(explicit, paths);
    if explicit.is_none() && !path.exists() {
        tracing::debug!(path = %path.display(), "no configuration file; using defaults");
        return Ok(GalleryConfig::default());
    }

    let text = fs::read_to_string(&path)
        .with_context(|| format!("failed to read configuration {}", path.display()))?;
    let config = GalleryConfig::from_toml_str(&text)
        .with_context(|| format!("invalid configuration {}", path.display()))?;
    tracing::debug!(
        path = %path.display(),
        demos = config.demos.len(),
        "loaded configuration"
    );
    Ok(config)
}

fn init_config(explicit: Option<&Path>, paths: &AppPaths, args: &InitArgs) -> Result<()> {
    let path = resolve_config_path(explicit, paths);
    if path.exists() && !args.force {
        bail!(
            "{} already exists; pass --force to overwrite it",
            path.display()
        );
    }
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let text = GalleryConfig::default()
        .to_toml_string()
        .context("failed to serialise default configuration")?;
    fs::write(&path, text).with_context(|| format!("failed to write {}", path.display()))?;
    tracing::info!(path = %path.display(), "wrote default configuration");
    Ok(())
}

#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    id: &'a str,
    title: &'a str,
    description: &'a str,
    route: String,
}

fn list_demos(config: &GalleryConfig, json: bool) -> Result<()> {
    let entries: Vec<ListEntry<'_>> = config
        .demos
        .iter()
        .map(|demo| ListEntry {
            id: &demo.id,
            title: &demo.title,
            description: &demo.description,
            route: Route::detail(&demo.id).to_string(),
        })
        .collect();

    let stdout = io::stdout();
    let mut out = stdout.lock();
    if json {
        serde_json::to_writer_pretty(&mut out, &entries).context("failed to encode demo list")?;
        writeln!(out)?;
        return Ok(());
    }

    let width = entries.iter().map(|entry| entry.id.len()).max().unwrap_or(0);
    for entry in &entries {
        writeln!(out, "{:<width$}  {}", entry.id, entry.title)?;
        if !entry.description.is_empty() {
            writeln!(out, "{:<width$}  {}", "", entry.description)?;
        }
    }
    Ok(())
}

fn open_gallery(args: RunArgs, config: GalleryConfig) -> Result<()> {
    let route = Route::parse(&args.route);
    if route == Route::Redirect {
        tracing::info!(requested = %args.route, "unknown route; opening the gallery");
    }
    let options = BackendOptions {
        backends: args.backends,
        power_preference: if args.low_power {
            wgpu::PowerPreference::LowPower
        } else {
            wgpu::PowerPreference::HighPerformance
        },
    };
    tracing::info!(route = %route, backends = ?options.backends, "starting gallery");
    app::run(config, route.resolve(), options)
}
