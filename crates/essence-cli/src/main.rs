#![forbid(unsafe_code)]

mod cmd;
mod output;
mod session;

use clap::{CommandFactory, Parser, Subcommand};
use cmd::CmdContext;
use essence_core::RecipeError;
use std::env;
use std::path::PathBuf;
use tracing::{debug, info};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "ess: build an essential-oil recipe step by step",
    long_about = None
)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long)]
    verbose: bool,

    /// Emit JSON output instead of human-readable text.
    #[arg(long, global = true)]
    json: bool,

    /// Suppress non-essential output.
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Directory holding saved drafts. Overrides `[storage] dir`.
    #[arg(long, global = true, value_name = "DIR")]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    #[command(
        next_help_heading = "Wizard",
        about = "Work through the recipe wizard",
        long_about = "Work through the recipe wizard one step per command. \
                      The draft is saved between runs.",
        after_help = "EXAMPLES:\n    ess wizard start --concern \"trouble sleeping\"\n    \
                      ess wizard demographics --gender female --age-category adult --age 34\n    \
                      ess wizard causes\n    ess wizard select-causes 1 3\n    \
                      ess wizard status --json"
    )]
    Wizard {
        #[command(subcommand)]
        command: cmd::wizard::WizardCommand,
    },

    #[command(
        next_help_heading = "Maintenance",
        about = "Inspect and prune saved drafts",
        after_help = "EXAMPLES:\n    ess storage keys\n    ess storage purge"
    )]
    Storage {
        #[command(subcommand)]
        command: cmd::storage::StorageCommand,
    },

    #[command(
        next_help_heading = "Server",
        about = "Run the recipe HTTP proxy",
        long_about = "Serve /api/create-recipe and forward validated requests to the \
                      configured webhook.",
        after_help = "EXAMPLES:\n    ESSENCE_WEBHOOK_URL=https://hooks.example/recipe ess serve\n    \
                      ess serve --bind 0.0.0.0:8080"
    )]
    Serve(cmd::serve::ServeArgs),

    #[command(
        next_help_heading = "Maintenance",
        about = "Generate shell completion scripts",
        after_help = "EXAMPLES:\n    ess completions bash > ~/.local/share/bash-completion/completions/ess"
    )]
    Completions(cmd::completions::CompletionsArgs),
}

/// Directive used when `ESSENCE_LOG` is unset. `ess` covers the binary's
/// own modules and `essence` the library crates.
const fn default_directive(verbose: bool, debug: bool) -> &'static str {
    if verbose || debug {
        "ess=debug,essence=debug,info"
    } else {
        "ess=info,essence=info,warn"
    }
}

fn init_tracing(verbose: bool) {
    let filter = EnvFilter::try_from_env("ESSENCE_LOG").unwrap_or_else(|_| {
        EnvFilter::new(default_directive(verbose, env::var("DEBUG").is_ok()))
    });

    let format = env::var("ESSENCE_LOG_FORMAT").unwrap_or_else(|_| "compact".to_string());

    let registry = tracing_subscriber::registry().with(filter);

    match format.as_str() {
        "json" => {
            registry
                .with(fmt::layer().json().with_ansi(false).with_writer(std::io::stderr))
                .init();
        }
        _ => {
            registry
                .with(fmt::layer().compact().with_writer(std::io::stderr))
                .init();
        }
    }
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);
    if cli.verbose {
        info!("Verbose mode enabled");
    }

    if let Commands::Completions(args) = &cli.command {
        return cmd::completions::run_completions(args.shell, &mut Cli::command());
    }

    let project_root = env::current_dir()?;
    let output = output::resolve_output_mode(cli.json);
    let config = essence_core::resolve_config(&project_root)?;
    debug!(?config, "configuration resolved");
    let ctx = CmdContext::new(output, cli.quiet, config, cli.storage_dir, &project_root);

    let command_result = match &cli.command {
        Commands::Wizard { command } => cmd::wizard::run_wizard(command, &ctx),
        Commands::Storage { command } => cmd::storage::run_storage(command, &ctx),
        Commands::Serve(args) => cmd::serve::run_serve(args, &ctx),
        Commands::Completions(_) => Ok(()),
    };

    // Domain errors were already rendered on stderr in the chosen format.
    match command_result {
        Err(err) if err.is::<RecipeError>() => std::process::exit(1),
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use essence_core::RecipeStep;

    #[test]
    fn global_flags_parse_after_subcommand() {
        let cli = Cli::parse_from(["ess", "wizard", "status", "--json", "-q"]);
        assert!(cli.json);
        assert!(cli.quiet);
    }

    #[test]
    fn storage_dir_flag_parsed() {
        let cli = Cli::parse_from(["ess", "--storage-dir", "/tmp/drafts", "storage", "keys"]);
        assert_eq!(cli.storage_dir, Some(PathBuf::from("/tmp/drafts")));
    }

    #[test]
    fn back_takes_a_step_name() {
        let cli = Cli::parse_from(["ess", "wizard", "back", "health-concern"]);
        let Commands::Wizard {
            command: cmd::wizard::WizardCommand::Back(args),
        } = cli.command
        else {
            panic!("expected wizard back");
        };
        assert_eq!(args.step, RecipeStep::HealthConcern);
    }

    #[test]
    fn select_requires_at_least_one_number() {
        assert!(Cli::try_parse_from(["ess", "wizard", "select-causes"]).is_err());
    }

    #[test]
    fn unknown_step_is_rejected() {
        assert!(Cli::try_parse_from(["ess", "wizard", "back", "dessert"]).is_err());
    }

    #[test]
    fn verbose_raises_the_default_filter() {
        assert_eq!(default_directive(false, false), "ess=info,essence=info,warn");
        assert_eq!(default_directive(true, false), "ess=debug,essence=debug,info");
        assert_eq!(default_directive(false, true), default_directive(true, false));
    }

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }
}
