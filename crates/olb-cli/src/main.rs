//! `olb` entry point.

use clap::{CommandFactory, Parser};

use olb_cli::{Cli, CliContext, Commands, handlers, logging};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();
    let ctx = CliContext::load(cli.config_dir.as_deref())?;
    logging::init(cli.verbose, &ctx.settings.log_level);

    match cli.command {
        Some(Commands::Serve { host, port }) => handlers::serve::execute(&ctx, host, port).await?,
        Some(Commands::Servers) => handlers::servers::execute(&ctx).await?,
        Some(Commands::Check) => handlers::check::execute(&ctx).await?,
        Some(Commands::Paths) => handlers::paths::execute(&ctx),
        None => Cli::command().print_help()?,
    }

    Ok(())
}
