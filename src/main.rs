use anyhow::{Context, Result};
use clap::Parser;
use std::process::ExitCode;

mod cli;
mod descriptor;
mod engine;
mod error;
mod host;
mod layout;
mod naming;
mod preflight;
mod staging;
mod templates;
mod util;
mod workflow;

use cli::{Command, CreateArgs, InfoArgs, RootArgs};
use error::DrenvError;
use host::HostContext;

fn main() -> ExitCode {
    init_tracing();
    let args = RootArgs::parse();

    let result = match args.command {
        Some(Command::Info(info)) => cmd_info(info),
        None => cmd_create(args.create),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            let code = err
                .downcast_ref::<DrenvError>()
                .map(DrenvError::exit_code)
                .unwrap_or(1);
            ExitCode::from(code)
        }
    }
}

fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_env("DRENV_LOG")
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}

fn cmd_create(args: CreateArgs) -> Result<()> {
    // clap enforces both positionals whenever no subcommand is given.
    let (Some(distro), Some(env_dir)) = (args.distro, args.env_dir) else {
        anyhow::bail!("ROS_DISTRO and ENV_DIR are required");
    };
    cli::ensure_supported_distro(&distro)?;

    let host = HostContext::from_env()?;
    preflight::check_engine_tools(&args.docker, &args.rocker)?;

    let config = workflow::CreateConfig {
        distro,
        no_cache: args.no_cache,
        no_gpu: args.no_gpu,
        cuda: args.cuda,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
    };
    let resources = staging::ResourceSource::from_dir(args.resource_dir);
    let mut engine = engine::CliEngine::new(args.docker, args.rocker);

    let report =
        workflow::create_environment(&env_dir, &host, &config, &resources, &mut engine)?;

    tracing::debug!(state = %report.state, "creation finished");
    let activate = &report.descriptor.paths.activate_script;
    let shown = if env_dir.is_relative() {
        let cwd = host.cwd.canonicalize().unwrap_or_else(|_| host.cwd.clone());
        util::display_path(activate, Some(&cwd))
    } else {
        util::display_path(activate, None)
    };
    println!();
    println!("Build complete, container is ready for use.");
    println!("To attach to container, source the activation script:");
    println!(". {shown}");
    Ok(())
}

fn cmd_info(args: InfoArgs) -> Result<()> {
    let host = HostContext::from_env().context("read host context")?;
    let format = if args.json {
        workflow::InfoFormat::Json
    } else {
        workflow::InfoFormat::Table
    };
    let text = workflow::run_info(&args.env_dir, &host, format)?;
    print!("{text}");
    Ok(())
}
