// src/notify/stdout.rs
use anyhow::{Context, Result};
use std::io::Write;

use super::{Notifier, Story};

/// One JSON line per story on standard output.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdoutNotifier;

pub fn json_line(story: &Story) -> Result<String> {
    serde_json::to_string(story).context("encoding story as json")
}

#[async_trait::async_trait]
impl Notifier for StdoutNotifier {
    fn name(&self) -> &str {
        "stdout"
    }

    async fn send(&self, story: &Story) -> Result<()> {
        let line = json_line(story)?;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{line}").context("writing story to stdout")?;
        Ok(())
    }
}
