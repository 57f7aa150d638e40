//! Thread commands: threads, thread.
//!
//! CHANGELOG:
//! - 10/16/2026 - Merged per-contact thread listing and thread view

use anyhow::{Context, Result};
use serde::Serialize;

use crate::config::EngineConfig;
use crate::db::queries::unix_ms_to_iso;
use crate::identity::handle::canonical_handle;
use crate::output::OutputControls;
use crate::threads::{merge, MergedThread, ThreadKey};

#[derive(Debug, Serialize)]
struct ThreadSummary<'a> {
    key: &'a ThreadKey,
    display_name: &'a str,
    handles: &'a [String],
    is_group: bool,
    message_count: usize,
    last_date: Option<String>,
    last_text: Option<&'a str>,
}

impl<'a> From<&'a MergedThread> for ThreadSummary<'a> {
    fn from(thread: &'a MergedThread) -> Self {
        let last = thread.messages.last();
        Self {
            key: &thread.key,
            display_name: &thread.display_name,
            handles: &thread.handles,
            is_group: thread.is_group,
            message_count: thread.messages.len(),
            last_date: last.and_then(|m| unix_ms_to_iso(m.timestamp_ms)),
            last_text: last.map(|m| m.text.as_display()),
        }
    }
}

fn merged_threads(config: &EngineConfig) -> Result<Vec<MergedThread>> {
    let store = super::open_store(config)?;
    let contacts = super::load_contacts(config)?;
    let raw = store.load_threads().context("Failed to load threads")?;
    Ok(merge(&raw, &contacts))
}

/// List merged threads, most recent first.
pub fn list(config: &EngineConfig, limit: usize, output: &OutputControls) -> Result<()> {
    let merged = merged_threads(config)?;
    let shown: Vec<ThreadSummary> = merged.iter().take(limit).map(ThreadSummary::from).collect();

    if output.json {
        output.print(&shown);
        return Ok(());
    }

    if shown.is_empty() {
        println!("No threads. Run 'imessage-audit import' first.");
        return Ok(());
    }

    println!("Threads ({} of {}):", shown.len(), merged.len());
    println!("{}", "-".repeat(60));
    for t in &shown {
        let marker = if t.is_group { " [group]" } else { "" };
        println!(
            "{}{} - {} messages, last {}",
            t.display_name,
            marker,
            t.message_count,
            t.last_date.as_deref().unwrap_or("never")
        );
        if let Some(text) = t.last_text {
            println!("    {}", output.clip(text));
        }
    }
    Ok(())
}

/// Show one merged thread, found by contact name or handle.
pub fn show(config: &EngineConfig, contact: &str, limit: usize, output: &OutputControls) -> Result<()> {
    let contacts = super::load_contacts(config)?;
    let merged = merged_threads(config)?;

    let wanted_key = contacts
        .resolve(contact)
        .map(|c| ThreadKey::Assigned(c.contact_id().to_string()));
    let wanted_handle = canonical_handle(contact);

    let thread = merged
        .iter()
        .find(|t| Some(&t.key) == wanted_key.as_ref())
        .or_else(|| {
            merged
                .iter()
                .find(|t| !t.is_group && t.handles.contains(&wanted_handle))
        })
        .with_context(|| format!("No thread found for {:?}", contact))?;

    let skip = thread.messages.len().saturating_sub(limit);
    let messages = &thread.messages[skip..];

    if output.json {
        #[derive(Serialize)]
        struct ThreadView<'a> {
            #[serde(flatten)]
            summary: ThreadSummary<'a>,
            chat_identifiers: &'a [String],
            messages: &'a [crate::threads::ThreadMessage],
        }
        output.print(&ThreadView {
            summary: ThreadSummary::from(thread),
            chat_identifiers: &thread.chat_identifiers,
            messages,
        });
        return Ok(());
    }

    println!("{} ({})", thread.display_name, thread.handles.join(", "));
    println!("{}", "-".repeat(60));
    for m in messages {
        let who = if m.is_from_me { "Me" } else { m.handle.as_str() };
        println!(
            "[{}] {} ({}): {}",
            unix_ms_to_iso(m.timestamp_ms).unwrap_or_default(),
            who,
            m.channel,
            output.clip(m.text.as_display())
        );
    }
    Ok(())
}
