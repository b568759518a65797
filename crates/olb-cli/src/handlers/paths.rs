//! Paths command handler.

use std::fmt::Write as _;

use crate::bootstrap::CliContext;

/// Render resolved paths as `key = value` lines.
pub fn render(ctx: &CliContext) -> String {
    let mut out = String::new();
    for (key, path) in [
        ("config_dir", ctx.config_dir.clone()),
        ("settings_file", ctx.settings_file()),
        ("servers_file", ctx.servers_file()),
    ] {
        let _ = writeln!(out, "{key} = {}", path.display());
    }
    out
}

pub fn execute(ctx: &CliContext) {
    print!("{}", render(ctx));
}

#[cfg(test)]
mod tests {
    use super::*;
    use olb_core::BridgeSettings;
    use std::path::PathBuf;

    #[test]
    fn test_render_lists_all_paths() {
        let ctx = CliContext {
            config_dir: PathBuf::from("/srv/olb"),
            settings: BridgeSettings::default(),
        };
        let out = render(&ctx);
        assert!(out.contains("config_dir = /srv/olb\n"));
        assert!(out.contains("settings_file = /srv/olb/config.json\n"));
        assert!(out.contains("servers_file = /srv/olb/mcp-servers.json\n"));
    }
}
