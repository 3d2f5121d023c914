//! Point d'entrée CLI pour peta-suara

use anyhow::Result;
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::{fmt, EnvFilter};

// Charger .env au démarrage
fn load_env() {
    if dotenvy::dotenv().is_err() {
        // Essayer depuis le répertoire du binaire
        if let Ok(exe) = std::env::current_exe() {
            if let Some(dir) = exe.parent() {
                let _ = dotenvy::from_path(dir.join(".env"));
            }
        }
    }
}

mod cli;

use cli::Commands;

/// Cartes électorales colorées à partir des rekap PostgreSQL
#[derive(Parser)]
#[command(name = "peta-suara")]
#[command(author, version)]
#[command(about = "Serve colour-coded election maps (kokab, kecamatan, desa) from PostgreSQL")]
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

#[tokio::main]
async fn main() -> Result<()> {
    load_env();

    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    match cli.command {
        Commands::Serve { bind, config, db } => {
            info!(bind = %bind, config = %config, "Starting server");
            cli::cmd_serve(&bind, &config, db).await?;
        }
        Commands::InitSchema { drop, db } => {
            cli::cmd_init_schema(drop, db).await?;
        }
        Commands::CheckDapil { tier, db } => {
            cli::cmd_check_dapil(tier.as_deref(), db).await?;
        }
        Commands::Export {
            level,
            mode,
            kab_id,
            kec_id,
            output,
            report,
            config,
            db,
        } => {
            info!(level = %level, mode = %mode, output = %output.display(), "Exporting map");
            cli::cmd_export(
                &level,
                &mode,
                kab_id,
                kec_id,
                &output,
                report.as_deref(),
                &config,
                db,
            )
            .await?;
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
