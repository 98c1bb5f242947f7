//! mimic-battle: play one match against the analysis backend from a terminal.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;

use mimic_core::{BattleOrchestrator, CaptureEngine, GameSessionClient, MatchResources, PlaybackConfig, PlaybackService};
use mimic_native::cli::{self, Args, CliError};
use mimic_native::{permissions, AppConfig, CpalBackend, CpalSink, DeviceEnumerator, HttpGameClient, TerminalObserver};

#[tokio::main]
async fn main() {
    let args = Args::parse();
    cli::init_logging(&args);

    if let Err(e) = run(args).await {
        log::error!("mimic-battle failed: {}", e);
        eprintln!("{}", e);
        std::process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    if args.list_devices {
        return list_devices();
    }

    let mut config = AppConfig::from_env()?;
    if let Some(url) = args.api_url {
        config.api_url = url;
    }
    if args.input_device.is_some() {
        config.input_device = args.input_device;
    }
    if args.output_device.is_some() {
        config.output_device = args.output_device;
    }
    if let Some(ms) = args.capture_ms {
        config.capture_window = Duration::from_millis(ms);
    }
    log::info!("Using backend at {}", config.api_url);

    match permissions::check_microphone_permission() {
        Ok(true) => {}
        Ok(false) => log::warn!("Default microphone looks unavailable or blocked"),
        Err(e) => log::warn!("Could not check microphone access: {}", e),
    }

    // The capture context is created before anything awaits.
    let capture_config = config.capture_config();
    let backend = Arc::new(CpalBackend::new(config.input_device.clone(), capture_config.block_size));
    let engine = CaptureEngine::new(backend, capture_config)?;
    let resources = MatchResources::prepare(&engine)?;

    let client = Arc::new(HttpGameClient::new(&config.api_url, config.http_timeout)?);
    if !args.skip_health_check {
        client.health().await?;
        log::info!("Backend healthy");
    }

    let playback = PlaybackService::new(Arc::new(CpalSink::new(config.output_device.clone())), PlaybackConfig::default());
    let battle_config = config.battle_config();
    let observer = Arc::new(TerminalObserver::new(&battle_config.opponent_name, battle_config.opponent_health));

    let mut orchestrator = BattleOrchestrator::new(client, engine, playback, resources, battle_config)?;
    orchestrator.set_observer(observer);

    let outcome = orchestrator.run().await?;
    println!("{}", outcome.to_json()?);
    Ok(())
}

fn list_devices() -> Result<(), CliError> {
    let enumerator = DeviceEnumerator::new();
    let mut devices = enumerator.list_capture_devices()?;
    devices.extend(enumerator.list_render_devices()?);
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}
