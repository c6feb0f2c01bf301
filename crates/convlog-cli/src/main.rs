use clap::Parser;
use convlog_cli::commands;
use convlog_cli::config::{Cli, Command, obfuscate_config};
use convlog_logging::SubscriberBuilder;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let _guard = SubscriberBuilder::new()
        .with_level(&cli.log_level)
        .with_json_console(cli.json_logs)
        .init();

    match cli.command {
        Command::Index { log } => {
            let stdout = std::io::stdout();
            commands::index(&log, &mut stdout.lock())?;
        }
        Command::State { log, output } => {
            let path = commands::state(&log, output)?;
            println!("{}", path.display());
        }
        Command::Obfuscate {
            src,
            dst,
            seed,
            salt,
            config,
        } => {
            let (config, random_seed) = obfuscate_config(config.as_deref(), seed, salt)?;
            if random_seed {
                warn!(
                    seed = config.seed,
                    "No seed given, output is not reproducible without it"
                );
            }
            let stats = commands::obfuscate(&src, &dst, &config)?;
            info!(
                records = stats.records,
                messages = stats.messages,
                files = stats.files,
                "Wrote {}",
                dst.display()
            );
        }
        Command::Replay { src, dst } => {
            let stats = commands::replay_copy(&src, &dst).await?;
            info!(
                dispatched = stats.dispatched,
                skipped = stats.skipped,
                "Wrote {}",
                dst.display()
            );
        }
        Command::Serve { log, addr } => {
            commands::serve(&log, addr).await?;
        }
    }

    Ok(())
}
