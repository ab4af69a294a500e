mod cli;
mod commands;
mod config;

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use log::LevelFilter;
use scribe_engine::SubscriptionManager;
use scribe_logging::{scribe_error, scribe_info, LogDestination};

use cli::{Cli, Command};
use config::{config_path, load_config, AppConfig, ChannelChoice};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let (destination, level) = if cli.verbose {
        (LogDestination::Both, LevelFilter::Debug)
    } else {
        (LogDestination::File, LevelFilter::Info)
    };
    scribe_logging::initialize(destination, level, &scribe_logging::default_log_path());

    match run(cli).await {
        Ok(code) => code,
        Err(err) => {
            scribe_error!("{:#}", err);
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let config = effective_config(&cli);
    scribe_info!("Using API root {}", config.base_url);

    let mut manager =
        SubscriptionManager::connect(&config.transport_settings(), &config.manager_settings())?;
    let transport = manager.transport().clone();

    match cli.command {
        Command::Url { job_id, format } => Ok(commands::url(transport.as_ref(), &job_id, format)),
        Command::History => {
            commands::require_user(transport.as_ref()).await?;
            commands::history(transport.as_ref()).await
        }
        Command::Download {
            job_id,
            format,
            out,
        } => {
            commands::require_user(transport.as_ref()).await?;
            commands::download(transport.as_ref(), &config, &job_id, format, out.as_deref()).await
        }
        Command::Upload { file, options } => {
            commands::require_user(transport.as_ref()).await?;
            commands::upload(&mut manager, &file, options.to_options()).await
        }
        Command::Link { url, options } => {
            commands::require_user(transport.as_ref()).await?;
            commands::link(&mut manager, &url, options.to_options()).await
        }
        Command::Watch { job_id } => {
            commands::require_user(transport.as_ref()).await?;
            commands::watch(&mut manager, &job_id).await
        }
    }
}

/// Config file values with command-line flags applied on top.
fn effective_config(cli: &Cli) -> AppConfig {
    let mut config = load_config(&config_path(cli.config.as_deref()));
    if let Some(base_url) = &cli.base_url {
        config.base_url = base_url.clone();
    }
    if let Some(cookie) = &cli.session_cookie {
        config.session_cookie = Some(cookie.clone());
    }
    if cli.poll {
        config.channel = ChannelChoice::Poll;
    }
    config
}
