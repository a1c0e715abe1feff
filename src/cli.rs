use crate::config::ManagerOptions;
use crate::culture::CultureName;
use crate::error::ConfigError;
use crate::manager::Manager;
use crate::resolver::{CultureManifest, resolve};
use crate::scope::ResourceScope;
use crate::source::{EmbeddedSource, FsSource, ManifestLister};
use crate::{linfo, lprintln};
use clap::{Parser, Subcommand};
use rust_embed::RustEmbed;
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Messages printed by the CLI itself.
#[derive(RustEmbed)]
#[folder = "assets/"]
struct CliAssets;

/// Builds the manager serving the CLI's own messages.
pub fn cli_messages() -> Manager {
    let options = ManagerOptions::new(ResourceScope::new("", "locales", "cli.yaml"));
    Manager::new(options, Arc::new(EmbeddedSource::<CliAssets>::new()))
}

/// Command line interface
#[derive(Parser)]
#[command(name = "locman", version, about = "Inspect localization resources")]
pub struct Cli {
    /// Root directory the resource paths are relative to
    #[arg(short, long, default_value = ".")]
    pub root: PathBuf,

    /// Options file (RON); defaults to ~/.locman/options.ron when present
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Path in front of the resource directory
    #[arg(long)]
    pub parent: Option<String>,

    /// Directory holding one sub-directory per culture
    #[arg(short, long)]
    pub directory: Option<String>,

    /// Resource file name, e.g. strings.yaml
    #[arg(short, long)]
    pub file: Option<String>,

    /// Culture to load
    #[arg(short = 'l', long)]
    pub culture: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

/// Subcommands
#[derive(Subcommand)]
pub enum Commands {
    /// Write the default options file unless it exists
    Init,

    /// List the cultures available in the resource directory
    Cultures,

    /// Show which culture a request resolves to
    Resolve {
        #[arg(value_name = "CULTURE")]
        culture: String,
    },

    /// List every key of the loaded culture
    Keys,

    /// Print the value stored at a dotted key
    Get {
        #[arg(value_name = "KEY")]
        key: String,
    },

    /// Print a string with `{name}` placeholders filled in
    Format {
        #[arg(value_name = "KEY")]
        key: String,
        /// Placeholder values
        #[arg(value_name = "NAME=VALUE")]
        args: Vec<String>,
    },
}

impl Cli {
    /// Options from the config file (or defaults) with command line overrides.
    pub fn options(&self) -> Result<ManagerOptions, ConfigError> {
        let mut options = match &self.config {
            Some(path) => ManagerOptions::load_from_path(path)?,
            None => match ManagerOptions::load() {
                Ok(options) => options,
                Err(ConfigError::NotFound(_)) => ManagerOptions::default(),
                Err(e) => return Err(e),
            },
        };
        if let Some(parent) = &self.parent {
            options.scope.parent_path = parent.clone();
        }
        if let Some(directory) = &self.directory {
            options.scope.directory_name = directory.clone();
        }
        if let Some(file) = &self.file {
            options.scope.resource_filename = file.clone();
        }
        if let Some(culture) = &self.culture {
            options.culture = Some(CultureName::new(culture));
        }
        Ok(options)
    }

    pub async fn run(&self) -> Result<(), Box<dyn std::error::Error>> {
        let ui = cli_messages();
        if let Commands::Init = self.command {
            ManagerOptions::ensure_default()?;
            lprintln!(&ui, "cli.init.path", ManagerOptions::get_config_path()?.display());
            return Ok(());
        }

        let options = self.options()?;
        let source = Arc::new(FsSource::new(&self.root));

        match &self.command {
            Commands::Cultures => {
                let cultures = source.list_cultures(&options.scope)?;
                if cultures.is_empty() {
                    lprintln!(&ui, "cli.cultures.none", source.root().display());
                }
                for culture in cultures {
                    lprintln!(&ui, "cli.cultures.entry", culture, culture.locale_form());
                }
                return Ok(());
            }
            Commands::Resolve { culture } => {
                let manifest = CultureManifest::new(source.list_cultures(&options.scope)?);
                let system = sys_locale::get_locale().map(CultureName::new);
                let resolution = resolve(
                    &CultureName::new(culture),
                    &manifest,
                    system.as_ref(),
                    &options.default_culture,
                );
                if resolution.matched {
                    lprintln!(&ui, "cli.resolve.matched", culture, resolution.name);
                } else {
                    lprintln!(&ui, "cli.resolve.fallback", culture, resolution.name);
                }
                return Ok(());
            }
            _ => {}
        }

        let manager = Arc::new(Manager::new(options, source));
        manager.build_async().await?;
        if let Some(path) = manager.resource_path() {
            linfo!(&ui, "cli.loaded", path);
        }

        match &self.command {
            Commands::Keys => {
                let token = CancellationToken::new();
                for key in manager.get_keys(&token).unwrap_or_default() {
                    println!("{}", key);
                }
            }
            Commands::Get { key } => match manager.get_object(key) {
                Some(value) => println!("{}", value),
                None => lprintln!(&ui, "cli.get.missing", key),
            },
            Commands::Format { key, args } => {
                let pairs: Vec<(&str, &str)> = args
                    .iter()
                    .filter_map(|arg| arg.split_once('='))
                    .collect();
                println!("{}", manager.format_string(key, &pairs));
            }
            Commands::Init | Commands::Cultures | Commands::Resolve { .. } => {}
        }

        Ok(())
    }
}
