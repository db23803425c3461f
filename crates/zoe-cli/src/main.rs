mod cli;
mod commands;
mod output;

use anyhow::{Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use commands::ZoeClient;
use tracing_subscriber::EnvFilter;

fn client_from_cli(cli: &Cli) -> Result<ZoeClient> {
    let url = cli.url.clone().context(
        "ZOE_URL is not set. Export ZOE_URL, ZOE_USER and ZOE_PASS or pass --url/--user/--pass",
    )?;
    let user = cli.user.clone().context("ZOE_USER is not set")?;
    let pass = cli.pass.clone().context("ZOE_PASS is not set")?;
    ZoeClient::new(url, user, pass)
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(if cli.debug {
            EnvFilter::new("debug")
        } else {
            EnvFilter::new("info")
        })
        .with_target(false)
        .init();

    let result = match &cli.command {
        // Local file validation only — no master to talk to, matching the
        // original CLI's offline app-validate.
        Command::AppValidate { jsonfile } => commands::app_validate_cmd(jsonfile),
        Command::Info => async { commands::info_cmd(&client_from_cli(&cli)?).await }.await,
        Command::Start { name, jsonfile } => {
            async { commands::exec_start_cmd(&client_from_cli(&cli)?, name, jsonfile).await }.await
        }
        Command::ExecLs => async { commands::exec_ls_cmd(&client_from_cli(&cli)?).await }.await,
        Command::ExecGet { id } => async { commands::exec_get_cmd(&client_from_cli(&cli)?, *id).await }.await,
        Command::ExecAppGet { id } => {
            async { commands::exec_app_get_cmd(&client_from_cli(&cli)?, *id).await }.await
        }
        Command::Terminate { id } => async { commands::terminate_cmd(&client_from_cli(&cli)?, *id).await }.await,
        Command::ExecRm { id } => async { commands::exec_rm_cmd(&client_from_cli(&cli)?, *id).await }.await,
        Command::Logs { service_id, timestamps } => {
            async { commands::logs_cmd(&client_from_cli(&cli)?, *service_id, *timestamps).await }.await
        }
        Command::Stats => async { commands::stats_cmd(&client_from_cli(&cli)?).await }.await,
    };

    if let Err(e) = &result {
        eprintln!("{}", e);
        std::process::exit(1);
    }
    Ok(())
}
