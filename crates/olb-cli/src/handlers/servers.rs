//! Servers command handler.
//!
//! Prints stored configs only; it does not contact a running bridge.

use std::fmt::Write as _;

use anyhow::Result;
use olb_core::{ServerConfig, ServerConfigRepository};

use crate::bootstrap::CliContext;

pub fn render(configs: &[ServerConfig]) -> String {
    if configs.is_empty() {
        return "No servers configured.\n".to_string();
    }

    let id_width = configs.iter().map(|c| c.id.len()).max().unwrap_or(0).max(2);
    let name_width = configs.iter().map(|c| c.name.len()).max().unwrap_or(0).max(4);

    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<id_width$}  {:<name_width$}  {:<8}  {:<10}  COMMAND",
        "ID", "NAME", "ENABLED", "AUTOSTART"
    );
    for config in configs {
        let command = std::iter::once(config.command.as_str())
            .chain(config.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        let _ = writeln!(
            out,
            "{:<id_width$}  {:<name_width$}  {:<8}  {:<10}  {command}",
            config.id,
            config.name,
            yes_no(config.enabled),
            yes_no(config.auto_start),
        );
    }
    out
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let configs = ctx.store().list().await?;
    print!("{}", render(&configs));
    Ok(())
}
