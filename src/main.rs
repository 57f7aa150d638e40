//! imessage-audit - import iMessage/SMS history into an audit store
//!
//! Decodes message bodies from chat.db or an iPhone backup, upserts them by
//! stable external id, and shows threads merged per contact.
//!
//! CHANGELOG:
//! - 10/16/2026 - Commands: import, threads, thread, decode, stats
//! - 01/10/2026 - Initial scaffold with CLI skeleton

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;

use imessage_audit::commands;
use imessage_audit::config::EngineConfig;
use imessage_audit::output::{self, OutputControls};

/// Import iMessage/SMS history into an audit store and review it per contact.
#[derive(Parser, Debug)]
#[command(name = "imessage-audit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Compact JSON output (no whitespace)
    #[arg(long, global = true)]
    compact: bool,

    /// Truncate text fields to this length
    #[arg(long, global = true)]
    max_text_chars: Option<u32>,

    /// Config file (default: ~/.config/imessage-audit/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Audit store database
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Contacts JSON file
    #[arg(long, global = true)]
    contacts: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Import messages from chat.db or an unencrypted iPhone backup
    Import {
        /// Source chat.db (default: ~/Library/Messages/chat.db)
        #[arg(long, conflicts_with = "backup")]
        source: Option<PathBuf>,

        /// iPhone backup folder (reads its sms.db)
        #[arg(long)]
        backup: Option<PathBuf>,

        /// Messages decoded per parallel batch
        #[arg(long)]
        batch_size: Option<usize>,
    },

    /// List threads merged per contact, most recent first
    Threads {
        /// Max threads
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
    },

    /// Show the merged thread for one contact
    Thread {
        /// Contact name (fuzzy matched) or handle
        contact: String,

        /// Show only the last N messages
        #[arg(short, long, default_value_t = 50)]
        limit: usize,
    },

    /// Decode a single message body file
    Decode {
        /// File holding the raw attributedBody bytes
        file: PathBuf,

        /// File contains hex text instead of raw bytes
        #[arg(long)]
        hex: bool,
    },

    /// Show audit store counts and import counters
    Stats,
}

fn build_config(cli: &Cli) -> anyhow::Result<EngineConfig> {
    let mut config = EngineConfig::load(cli.config.as_deref())?;
    if let Some(store) = &cli.store {
        config.store = store.clone();
    }
    if let Some(contacts) = &cli.contacts {
        config.contacts = contacts.clone();
    }
    if let Command::Import { source, backup, batch_size } = &cli.command {
        if let Some(source) = source {
            config.source = source.clone();
        }
        if let Some(backup) = backup {
            config.backup_dir = Some(backup.clone());
        }
        match batch_size {
            Some(0) => anyhow::bail!("--batch-size must be a positive integer"),
            Some(n) => config.batch_size = *n,
            None => {}
        }
    }
    Ok(config)
}

fn main() -> ExitCode {
    // Initialize tracing/logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    // Build output controls from global flags
    let output_controls = OutputControls {
        json: cli.json,
        compact: cli.compact,
        max_text_chars: cli.max_text_chars,
    };

    let result = build_config(&cli).and_then(|config| match &cli.command {
        Command::Import { .. } => commands::import::run(&config, &output_controls),
        Command::Threads { limit } => commands::threads::list(&config, *limit, &output_controls),
        Command::Thread { contact, limit } => {
            commands::threads::show(&config, contact, *limit, &output_controls)
        }
        Command::Decode { file, hex } => commands::decode::run(file, *hex, &output_controls),
        Command::Stats => commands::stats::run(&config, &output_controls),
    });

    match result {
        Ok(()) => ExitCode::from(0),
        Err(e) => {
            if output_controls.json {
                eprintln!("{}", output::format_error(&format!("{:#}", e)));
            } else {
                eprintln!("Error: {:#}", e);
            }
            ExitCode::from(1)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_import_flags_override_config() {
        let cli = Cli::parse_from([
            "imessage-audit",
            "--store",
            "/tmp/a.db",
            "import",
            "--backup",
            "/backups/0000",
            "--batch-size",
            "25",
        ]);
        let config = build_config(&cli).unwrap();
        assert_eq!(config.store, PathBuf::from("/tmp/a.db"));
        assert_eq!(config.backup_dir, Some(PathBuf::from("/backups/0000")));
        assert_eq!(config.batch_size, 25);
    }

    #[test]
    fn test_source_conflicts_with_backup() {
        let parsed = Cli::try_parse_from([
            "imessage-audit",
            "import",
            "--source",
            "/x/chat.db",
            "--backup",
            "/b",
        ]);
        assert!(parsed.is_err());
    }
}
