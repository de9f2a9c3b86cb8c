//! `guesthost call` and `guesthost poll`.

use anyhow::{Context, Result};
use guesthost_core::config::{ScriptConfig, SourceConfig};
use guesthost_core::info_log;
use guesthost_marshal::Cursor;
use guesthost_script::{GuestValue, ScriptHost};
use guesthost::connect::SourceTask;
use std::collections::HashMap;

/// `guesthost call`
pub fn cmd_call(props: &HashMap<String, String>, args: &[String], cleanup: bool) -> Result<()> {
    let cfg = ScriptConfig::from_props_with_env(props)?;
    let args = parse_args(args)?;

    let mut host = ScriptHost::from_config(&cfg)
        .with_context(|| format!("Failed to build script host for '{}'", cfg.entry_point))?;
    let result = host.call_entry_point(&args);

    if cleanup {
        let env = host.into_environment();
        let root = env.root().to_path_buf();
        env.remove()
            .with_context(|| format!("Failed to remove environment {}", root.display()))?;
    }

    let result = result.context("Entry point call failed")?;
    println!("{}", result.to_json());
    Ok(())
}

/// `guesthost poll`
pub fn cmd_poll(props: &HashMap<String, String>, cursor: Option<&str>, polls: u32) -> Result<()> {
    let cfg = SourceConfig::from_props_with_env(props)?;
    let stored = cursor
        .map(|c| serde_json::from_str(c).context("--cursor must be a JSON object"))
        .transpose()?
        .map(Cursor::from_json);

    let mut task = SourceTask::start(&cfg, stored)?;
    let mut produced = 0usize;
    for _ in 0..polls {
        if let Some(records) = task.poll().context("Poll failed")? {
            for r in &records {
                println!("{}", r.to_json());
            }
            produced += records.len();
        }
    }
    info_log!(produced, cursor = %task.cursor().to_json(), "polling finished");
    task.stop();
    Ok(())
}

fn parse_args(raw: &[String]) -> Result<Vec<GuestValue>> {
    raw.iter()
        .map(|a| {
            serde_json::from_str(a)
                .map(GuestValue::from_json)
                .with_context(|| format!("Argument is not valid JSON: {}", a))
        })
        .collect()
}
