//! `ess storage`: inspect and prune persisted drafts.

use clap::Subcommand;
use serde::Serialize;
use std::io::Write;

use super::CmdContext;
use crate::output::{fail, pretty_kv, pretty_section, render_mode};

#[derive(Subcommand, Debug)]
pub enum StorageCommand {
    /// List live keys in the namespace.
    Keys,
    /// Drop expired entries.
    Purge,
    /// Remove every entry in the namespace.
    Clear,
}

#[derive(Debug, Serialize)]
struct KeysReport {
    namespace: String,
    dir: String,
    keys: Vec<String>,
}

#[derive(Debug, Serialize)]
struct CountReport {
    action: &'static str,
    namespace: String,
    removed: usize,
}

pub fn run_storage(command: &StorageCommand, ctx: &CmdContext) -> anyhow::Result<()> {
    let storage = ctx.storage().map_err(|e| fail(ctx.output, e))?;
    let namespace = storage.namespace().to_string();

    match command {
        StorageCommand::Keys => {
            let keys = storage.keys().map_err(|e| fail(ctx.output, e))?;
            let report = KeysReport {
                namespace,
                dir: ctx.storage_dir.display().to_string(),
                keys,
            };
            render_mode(
                ctx.output,
                &report,
                |r, w| {
                    for key in &r.keys {
                        writeln!(w, "{key}")?;
                    }
                    Ok(())
                },
                |r, w| {
                    pretty_section(w, &format!("Storage ({})", r.namespace))?;
                    pretty_kv(w, "Directory", &r.dir)?;
                    if r.keys.is_empty() {
                        writeln!(w, "(empty)")?;
                    }
                    for key in &r.keys {
                        writeln!(w, "  {key}")?;
                    }
                    Ok(())
                },
            )
        }
        StorageCommand::Purge | StorageCommand::Clear => {
            let (action, removed) = if matches!(command, StorageCommand::Purge) {
                ("purge", storage.purge_expired())
            } else {
                ("clear", storage.clear())
            };
            let report = CountReport {
                action,
                namespace,
                removed: removed.map_err(|e| fail(ctx.output, e))?,
            };
            if !ctx.chatty() {
                return Ok(());
            }
            render_mode(
                ctx.output,
                &report,
                |r, w| writeln!(w, "{}\t{}", r.action, r.removed),
                |r, w| writeln!(w, "✓ {}: removed {} entr{}", r.action, r.removed, if r.removed == 1 { "y" } else { "ies" }),
            )
        }
    }
}
