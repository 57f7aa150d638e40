//! Import command: read a source store and upsert it into the audit store.
//!
//! CHANGELOG:
//! - 10/16/2026 - Initial import command (chat.db or iPhone backup)

use anyhow::{Context, Result};

use crate::config::EngineConfig;
use std::path::{Path, PathBuf};

use crate::db::connection::{default_backup_root, locate_backup_sms_db, open_source};
use crate::db::source::read_snapshot;
use crate::import::{CancelFlag, ImportReport, ImportSession, Importer};
use crate::output::OutputControls;

pub fn run(config: &EngineConfig, output: &OutputControls) -> Result<()> {
    let source_path = match &config.backup_dir {
        Some(dir) => locate_backup_sms_db(&resolve_backup_dir(dir))
            .with_context(|| format!("Cannot use iPhone backup at {:?}", dir))?,
        None => config.source.clone(),
    };

    let conn = open_source(&source_path).with_context(|| {
        format!(
            "Failed to open message source at {:?} (Full Disk Access may be required)",
            source_path
        )
    })?;
    let snapshot = read_snapshot(&conn).context("Failed to read message source")?;
    let store = super::open_store(config)?;

    let session = ImportSession::new();
    let lease = session
        .try_acquire()
        .context("Another import is already running")?;

    let report = Importer::new(&store)
        .with_batch_size(config.batch_size)
        .run(&lease, &snapshot, &CancelFlag::new())
        .context("Import failed while writing the audit store")?;

    if output.json {
        output.print(&report);
    } else {
        print_report(&report);
    }
    Ok(())
}

/// A bare device id (no such directory here) is looked up under the default
/// backup root.
fn resolve_backup_dir(dir: &Path) -> PathBuf {
    if dir.is_relative() && !dir.exists() {
        return default_backup_root().join(dir);
    }
    dir.to_path_buf()
}

fn print_report(report: &ImportReport) {
    println!("Import {}", report.run_id);
    println!("{}", "-".repeat(50));
    println!("Messages seen:        {}", report.seen);
    println!("  inserted:           {}", report.inserted);
    println!("  updated:            {}", report.updated);
    println!("  text:               {}", report.text);
    println!("  reaction/system:    {}", report.reaction_or_system);
    println!("  unable to parse:    {}", report.unable_to_parse);
    println!(
        "Attachments:          {} new, {} repaired, {} unchanged, {} orphaned",
        report.attachments_inserted,
        report.attachments_repaired,
        report.attachments_unchanged,
        report.attachments_orphaned
    );
    if report.identity_collisions > 0 || report.write_conflicts > 0 {
        println!(
            "Identity collisions:  {} (write conflicts: {})",
            report.identity_collisions, report.write_conflicts
        );
    }
    if report.cancelled {
        println!("Cancelled before completion; re-run to resume.");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_id_resolves_under_backup_root() {
        let resolved = resolve_backup_dir(Path::new("00008030-001A2B3C4D5E6F70"));
        assert_eq!(
            resolved,
            default_backup_root().join("00008030-001A2B3C4D5E6F70")
        );
    }

    #[test]
    fn test_existing_dir_is_kept() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(resolve_backup_dir(dir.path()), dir.path().to_path_buf());
    }
}
