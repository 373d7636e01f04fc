//! Point d'entrée CLI pour camtrap-oca

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

mod anonymize;
mod cli;
mod config;
mod export;
mod metadata;
mod observation;
mod projection;
mod rename;
mod report;
mod router;
mod transcode;

use cli::Commands;

/// Organiser et exporter les médias de pièges photographiques
#[derive(Parser)]
#[command(name = "camtrap-oca")]
#[command(author, version)]
#[command(about = "Organiser et exporter les médias de pièges photographiques")]
#[command(
    long_about = "Chaîne de traitement des médias de pièges photographiques: renommage \
canonique, conversion des vidéos, géotag depuis le manifeste, contrôle d'annotation, \
copie vers l'arborescence de destination par relevé et export des observations en CSV \
Lambert-93."
)]
struct Cli {
    /// Augmenter la verbosité (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Mode silencieux
    #[arg(short, long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Commands,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Configurer le logging
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Rename(args) => {
            info!(input_dir = %args.input_dir.display(), "Renommage canonique");
            cli::cmd_rename(args)?;
        }
        Commands::Convert(args) => {
            info!(
                input_dir = %args.input_dir.display(),
                output_dir = %args.output_dir.display(),
                "Conversion AVI vers MP4"
            );
            cli::cmd_convert(args)?;
        }
        Commands::Geotag(args) => {
            info!(input_dir = %args.input_dir.display(), "Géotag depuis le manifeste");
            cli::cmd_geotag(args)?;
        }
        Commands::Verify(args) => {
            info!(input_dir = %args.input_dir.display(), "Contrôle d'annotation");
            cli::cmd_verify(args)?;
        }
        Commands::Copy(args) => {
            info!(
                input_dir = %args.input_dir.display(),
                output_dir = %args.output_dir.display(),
                "Copie vers la destination"
            );
            cli::cmd_copy(args)?;
        }
        Commands::Export(args) => {
            info!(
                input_dir = %args.input_dir.display(),
                output = %args.output.display(),
                "Export des observations"
            );
            cli::cmd_export(args)?;
        }
        Commands::Compare(args) => {
            info!(
                input_dir = %args.input_dir.display(),
                output_dir = %args.output_dir.display(),
                "Comparaison source/destination"
            );
            cli::cmd_compare(args)?;
        }
        Commands::Analyze(args) => {
            info!(input_dir = %args.input_dir.display(), "Analyse des occurrences");
            cli::cmd_analyze(args)?;
        }
    }

    Ok(())
}

fn init_logging(verbose: u8, quiet: bool) {
    let level = match (quiet, verbose) {
        (true, _) => Level::WARN,
        (_, 0) => Level::INFO,
        (_, 1) => Level::DEBUG,
        (_, _) => Level::TRACE,
    };

    let filter = EnvFilter::from_default_env().add_directive(level.into());

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .init();
}
