use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
    name = "gallery",
    author,
    version,
    about = "Browse small real-time GPU demos",
    arg_required_else_help = false
)]
pub struct Cli {
    #[command(flatten)]
    pub run: RunArgs,
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Parser, Debug)]
pub struct RunArgs {
    /// Page to open: `/` for the gallery or `/detail/<id>` for one demo.
    #[arg(value_name = "ROUTE", default_value = "/")]
    pub route: String,

    /// Gallery configuration file; defaults to `gallery.toml` in the config directory.
    #[arg(long, global = true, value_name = "PATH", env = "WEBGPU_GALLERY_CONFIG")]
    pub config: Option<PathBuf>,

    /// GPU backends to consider: `all`, `primary`, `secondary`, or a comma-separated
    /// list of `vulkan`, `metal`, `dx12`, `gl`.
    #[arg(
        long,
        value_name = "LIST",
        value_parser = parse_backends,
        default_value = "all"
    )]
    pub backends: wgpu::Backends,

    /// Prefer a low-power adapter over a discrete GPU.
    #[arg(long)]
    pub low_power: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the demo table.
    List(ListArgs),
    /// Inspect or create the configuration file.
    Config(ConfigCommand),
}

#[derive(Parser, Debug, Default)]
pub struct ListArgs {
    /// Emit JSON instead of a table.
    #[arg(long)]
    pub json: bool,
}

#[derive(Parser, Debug)]
pub struct ConfigCommand {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration as TOML.
    Show,
    /// Print the configuration file path.
    Where,
    /// Write the default configuration file.
    Init(InitArgs),
}

#[derive(Parser, Debug, Default)]
pub struct InitArgs {
    /// Overwrite an existing file.
    #[arg(long)]
    pub force: bool,
}

pub fn parse() -> Cli {
    Cli::parse()
}

pub fn parse_backends(value: &str) -> Result<wgpu::Backends, String> {
    let normalized = value.trim().to_ascii_lowercase();
    match normalized.as_str() {
        "" => return Err("backend list must not be empty".to_string()),
        "all" | "auto" => return Ok(wgpu::Backends::all()),
        "primary" => return Ok(wgpu::Backends::PRIMARY),
        "secondary" => return Ok(wgpu::Backends::SECONDARY),
        _ => {}
    }

    let mut backends = wgpu::Backends::empty();
    for name in normalized.split(',').map(str::trim) {
        backends |= match name {
            "vulkan" | "vk" => wgpu::Backends::VULKAN,
            "metal" | "mtl" => wgpu::Backends::METAL,
            "dx12" | "d3d12" => wgpu::Backends::DX12,
            "gl" | "gles" | "opengl" => wgpu::Backends::GL,
            "" => return Err(format!("empty entry in backend list '{value}'")),
            other => {
                return Err(format!(
                    "unknown backend '{other}'; use vulkan, metal, dx12, gl, primary or all"
                ))
            }
        };
    }
    Ok(backends)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_backend_keywords_and_lists() {
        assert_eq!(parse_backends("all").unwrap(), wgpu::Backends::all());
        assert_eq!(parse_backends(" Primary ").unwrap(), wgpu::Backends::PRIMARY);
        assert_eq!(
            parse_backends("vulkan, gl").unwrap(),
            wgpu::Backends::VULKAN | wgpu::Backends::GL
        );
        assert_eq!(parse_backends("d3d12").unwrap(), wgpu::Backends::DX12);
    }

    #[test]
    fn rejects_bad_backend_lists() {
        assert!(parse_backends("").is_err());
        assert!(parse_backends("vulkan,,gl").is_err());
        assert!(parse_backends("glide").unwrap_err().contains("glide"));
    }

    #[test]
    fn route_defaults_to_gallery() {
        let cli = Cli::try_parse_from(["gallery"]).unwrap();
        assert_eq!(cli.run.route, "/");
        assert!(cli.command.is_none());
        assert_eq!(cli.run.backends, wgpu::Backends::all());
        assert!(!cli.run.low_power);
    }

    #[test]
    fn accepts_route_and_flags() {
        let cli = Cli::try_parse_from([
            "gallery",
            "/detail/texture",
            "--backends",
            "vulkan",
            "--low-power",
        ])
        .unwrap();
        assert_eq!(cli.run.route, "/detail/texture");
        assert_eq!(cli.run.backends, wgpu::Backends::VULKAN);
        assert!(cli.run.low_power);
    }

    #[test]
    fn parses_subcommands() {
        let cli = Cli::try_parse_from(["gallery", "list", "--json"]).unwrap();
        assert!(matches!(cli.command, Some(Command::List(ListArgs { json: true }))));

        let cli = Cli::try_parse_from(["gallery", "config", "init", "--force"]).unwrap();
        let Some(Command::Config(ConfigCommand {
            action: ConfigAction::Init(args),
        })) = cli.command
        else {
            panic!("expected config init");
        };
        assert!(args.force);
    }
}
