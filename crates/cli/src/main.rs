mod cmd;
mod output;
mod prompts;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use cmd::{BuildArgs, OnError, cmd_build, cmd_check, cmd_dot, cmd_info, cmd_list};
use output::OutputFormat;
use session::Session;

/// jhb - build interdependent source modules into a shared prefix
#[derive(Parser)]
#[command(name = "jhb")]
#[command(author, version, about, long_about = None)]
struct Cli {
  /// Enable verbose output
  #[arg(short, long, global = true)]
  verbose: bool,

  /// Configuration file (default: $XDG_CONFIG_HOME/jhb/config.toml)
  #[arg(short, long, global = true)]
  config: Option<PathBuf>,

  /// Moduleset file, overriding the one named in the configuration
  #[arg(short, long, global = true)]
  moduleset: Option<PathBuf>,

  #[command(subcommand)]
  command: Commands,
}

#[derive(Subcommand)]
enum Commands {
  /// Build modules and their dependencies
  Build {
    /// Modules to build (default: the configured modules, or all of them)
    modules: Vec<String>,

    /// Modules to leave out, along with anything only they pull in
    #[arg(short, long, value_delimiter = ',')]
    skip: Vec<String>,

    /// Do not update checkouts
    #[arg(long)]
    no_network: bool,

    /// Only fetch sources, do not build
    #[arg(long)]
    no_build: bool,

    /// Run configure even when a module was configured before
    #[arg(long)]
    always_configure: bool,

    /// Installation prefix
    #[arg(long)]
    prefix: Option<PathBuf>,

    /// Directory holding source checkouts
    #[arg(long)]
    checkout_root: Option<PathBuf>,

    /// What to do when a build stage fails
    #[arg(long, value_enum, default_value_t = OnError::Ask)]
    on_error: OnError,
  },

  /// Show the build order
  List {
    /// Modules to plan for (default: the configured modules, or all of them)
    modules: Vec<String>,

    #[arg(short, long, value_delimiter = ',')]
    skip: Vec<String>,

    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },

  /// Print the dependency graph in Graphviz format
  Dot {
    /// Restrict the graph to these modules and their dependencies
    modules: Vec<String>,
  },

  /// Validate the moduleset
  Check,

  /// Show the resolved configuration
  Info {
    #[arg(short = 'o', long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
  },
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_level = if cli.verbose { "debug" } else { "warn" };
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)))
    .with_writer(std::io::stderr)
    .without_time()
    .init();

  let session = Session::load(cli.config.as_deref(), cli.moduleset.as_deref())?;

  match cli.command {
    Commands::Build {
      modules,
      skip,
      no_network,
      no_build,
      always_configure,
      prefix,
      checkout_root,
      on_error,
    } => {
      let args = BuildArgs {
        modules,
        skip,
        no_network,
        no_build,
        always_configure,
        prefix,
        checkout_root,
        on_error,
      };
      if !cmd_build(&session, args)? {
        std::process::exit(1);
      }
    }
    Commands::List { modules, skip, format } => cmd_list(&session, &modules, &skip, format)?,
    Commands::Dot { modules } => cmd_dot(&session, &modules)?,
    Commands::Check => cmd_check(&session)?,
    Commands::Info { format } => cmd_info(&session, format)?,
  }

  Ok(())
}
