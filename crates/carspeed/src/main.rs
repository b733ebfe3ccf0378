//! `carspeed` - CLI for the vehicle speed monitor
//!
//! This binary replays simulated drives through the speed monitor and
//! inspects its configuration.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use tracing::{info, warn};

use carspeed::cli::{Cli, Command, ConfigCommand, ConvertCommand, DriveCommand};
use carspeed::session::{CarSession, StartOutcome, PERMISSION_SPEED};
use carspeed::sim::{
    parse_script, ConsoleDisplay, ConsoleNotifier, LogPushSink, ReplayCarFactory, StaticFeatures,
    StaticPermissions,
};
use carspeed::{display_speed, init_logging, Config, RawValue, UiLoop};

/// Extra time allowed for a scheduled dialog dismissal to land.
const ACK_GRACE: Duration = Duration::from_secs(1);

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone()).context("loading configuration")?;

    // Execute the command
    match cli.command {
        Command::Drive(drive_cmd) => handle_drive(&config, &drive_cmd).await,
        Command::Convert(convert_cmd) => handle_convert(&config, &convert_cmd),
        Command::Config(config_cmd) => handle_config(&config, config_cmd),
    }
}

async fn handle_drive(config: &Config, cmd: &DriveCommand) -> anyhow::Result<()> {
    let (ui, handle) = UiLoop::new(
        config,
        Box::new(ConsoleDisplay),
        Box::new(ConsoleNotifier::new(cmd.ack_after())),
    );
    let ui = if config.push.enabled || cmd.push {
        ui.with_push(Arc::new(LogPushSink))
    } else {
        ui
    };
    let ui_task = tokio::spawn(ui.run());

    let permissions = if cmd.ask_permission {
        StaticPermissions::ask(true)
    } else if cmd.deny_permission {
        StaticPermissions::ask(false)
    } else {
        StaticPermissions::granted()
    };
    let will_grant = permissions.will_grant();

    let mut session = CarSession::new(
        Box::new(permissions),
        Box::new(StaticFeatures::new(!cmd.no_automotive)),
        Box::new(ReplayCarFactory::new(
            parse_script(&cmd.values),
            cmd.interval(),
        )),
        handle.clone(),
        config.property.rate,
    );

    let mut outcome = session.resume()?;
    if outcome == StartOutcome::PermissionRequested {
        outcome = session.on_permission_result(PERMISSION_SPEED, will_grant)?;
    }
    if outcome == StartOutcome::Connecting {
        outcome = session.on_service_connected()?;
    }
    info!(?outcome, "session started");

    if outcome.is_subscribed() {
        session.wait_for_stream_end().await;
    }
    if let Some(delay) = cmd.ack_after() {
        if !handle.wait_until_acknowledged(delay + ACK_GRACE).await? {
            warn!(?delay, "over-speed dialog still open at shutdown");
        }
    }
    session.pause();

    handle.shutdown()?;
    let state = ui_task.await.context("UI loop panicked")?;
    println!(
        "final speed: {} ({} alert)",
        config.messages.speed_text(state.speed),
        if state.latch.is_fired() {
            "unacknowledged"
        } else {
            "no pending"
        }
    );
    Ok(())
}

fn handle_convert(config: &Config, cmd: &ConvertCommand) -> anyhow::Result<()> {
    let speed = display_speed(&RawValue::Text(cmd.raw.clone()))?;
    let over = config.policy().is_over(speed);
    println!(
        "{}{}",
        config.messages.speed_text(speed),
        if over { " (over speed)" } else { "" }
    );
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Alert]");
                println!("  Threshold:          {}", config.alert.threshold);
                println!();
                println!("[Property]");
                println!("  Sample rate:        {}", config.property.rate);
                println!();
                println!("[Messages]");
                println!("  Speed:              {}", config.messages.speed);
                println!("  Dialog title:       {}", config.messages.title);
                println!("  Dialog body:        {}", config.messages.body);
                println!("  Dialog button:      {}", config.messages.button);
                println!();
                println!("[Push]");
                println!("  Enabled:            {}", config.push.enabled);
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
