//! Check command handler.
//!
//! Validates `config.json` and resolves every stored server's launch spec
//! without starting anything.

use std::fmt;

use anyhow::{Result, bail};
use olb_core::{ServerConfigRepository, SettingsError};

use crate::bootstrap::CliContext;

/// Outcome of one checked item.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckLine {
    pub subject: String,
    pub problem: Option<String>,
}

impl fmt::Display for CheckLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.problem {
            None => write!(f, "ok    {}", self.subject),
            Some(problem) => write!(f, "FAIL  {}: {problem}", self.subject),
        }
    }
}

#[derive(Debug, Default)]
pub struct CheckReport {
    pub lines: Vec<CheckLine>,
}

impl CheckReport {
    pub fn failures(&self) -> usize {
        self.lines.iter().filter(|l| l.problem.is_some()).count()
    }

    fn push(&mut self, subject: impl Into<String>, problem: Option<String>) {
        self.lines.push(CheckLine {
            subject: subject.into(),
            problem,
        });
    }
}

/// Run every check and collect the results.
///
/// Only an unreadable servers file is an `Err`; individual problems are
/// report lines.
pub async fn run(ctx: &CliContext) -> Result<CheckReport> {
    let mut report = CheckReport::default();
    report.push(
        "settings",
        ctx.settings.validate().err().map(|e: SettingsError| e.to_string()),
    );

    let configs = ctx.store().list().await?;
    for config in &configs {
        let problem = olb_runtime::resolve_command(config)
            .err()
            .map(|e| e.to_string());
        report.push(format!("server '{}'", config.id), problem);
    }
    Ok(report)
}

pub async fn execute(ctx: &CliContext) -> Result<()> {
    let report = run(ctx).await?;
    for line in &report.lines {
        println!("{line}");
    }
    let failures = report.failures();
    if failures > 0 {
        bail!("{failures} check(s) failed");
    }
    println!("All checks passed.");
    Ok(())
}
