//! MCU surface sync - standalone runner
//!
//! Drives one Mackie-Control-class unit from an in-memory mixer, standing in
//! for a host: surface input is applied to the mixer and reported back to the
//! engine as refresh notifications.

use anyhow::Result;
use clap::Parser;
use colored::*;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mcu_sync::config::{AppConfig, ConfigWatcher};
use mcu_sync::mcu::{self, McuInput, McuOutput};
use mcu_sync::sink::TracingSink;
use mcu_sync::surface::{buttons, LedState};
use mcu_sync::{EngineSettings, HardwareSink, HostCallbacks, MixerSnapshot, SurfaceEngine};

type Engine = SurfaceEngine<MixerSnapshot, Box<dyn HardwareSink>>;

/// Half a beat at 120 BPM
const BEAT_HALF_PERIOD: Duration = Duration::from_millis(250);

/// MCU surface sync - keep a control surface in step with a mixer
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: String,

    /// Log level (error, warn, info, debug, trace)
    #[arg(short, long, env = "LOG_LEVEL", default_value = "info")]
    log_level: String,

    /// List available MIDI ports
    #[arg(long)]
    list_ports: bool,

    /// Log surface updates instead of opening the device
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let args = Args::parse();

    init_logging(&args.log_level)?;

    if args.list_ports {
        list_ports_formatted();
        return Ok(());
    }

    info!("Starting MCU surface sync...");
    info!("Configuration file: {}", args.config);

    let (config_watcher, config) = ConfigWatcher::new(args.config.clone()).await?;
    info!("Configuration loaded successfully with hot-reload enabled");

    let layout = config.surface.layout();
    let (midi_tx, midi_rx) = mpsc::channel(1024);

    // Input connection must outlive the loop
    let (sink, _input): (Box<dyn HardwareSink>, Option<McuInput>) = if args.dry_run {
        info!("Dry run: surface updates are logged, no device is opened");
        (Box::new(TracingSink::new()), None)
    } else {
        let output = McuOutput::connect(&config.midi.output_port, layout.clone())?;
        let input = McuInput::connect(&config.midi.input_port, midi_tx)?;
        info!("Surface connected on '{}'", output.port_name());
        (Box::new(output), Some(input))
    };

    let host = config.mixer.clone().unwrap_or_default();
    let mut engine: Engine = SurfaceEngine::new(EngineSettings::from(&config), host, sink);
    engine.on_init();

    run_app(engine, config, config_watcher, midi_rx).await;

    info!("MCU surface sync shutdown complete");
    Ok(())
}

async fn run_app(
    mut engine: Engine,
    mut config: AppConfig,
    mut config_watcher: ConfigWatcher,
    mut midi_rx: mpsc::Receiver<Vec<u8>>,
) {
    info!("Starting main loop ({:?} tick)", config.scheduler.tick_interval());

    let mut idle_ticker = interval(config.scheduler.tick_interval());
    idle_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut beat_ticker = interval(BEAT_HALF_PERIOD);
    let mut half_beats: u32 = 0;

    let shutdown = shutdown_signal();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = idle_ticker.tick() => {
                engine.on_update_meters();
                engine.on_idle();
            }
            _ = beat_ticker.tick() => {
                half_beats = advance_beat(&mut engine, half_beats);
            }
            Some(raw) = midi_rx.recv() => {
                handle_surface_message(&mut engine, &raw);
            }
            Some(new_config) = config_watcher.next_config() => {
                if config.requires_restart(&new_config) {
                    warn!("MIDI or surface settings changed; restart to apply them");
                }
                if new_config.scheduler != config.scheduler {
                    idle_ticker = interval(new_config.scheduler.tick_interval());
                    idle_ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
                    engine.set_scheduler_settings(new_config.scheduler.clone());
                    engine.on_send_temp_msg("Settings reloaded", 1500);
                    info!("Scheduler settings applied");
                }
                config = new_config;
            }
            _ = &mut shutdown => {
                break;
            }
        }
    }

    engine.on_deinit();
}

/// Feed one raw surface message to the engine, then play host
fn handle_surface_message(engine: &mut Engine, raw: &[u8]) {
    if raw.first() == Some(&0xF0) {
        engine.on_sysex(raw);
    } else {
        engine.on_midi_msg(raw);
    }

    let layout = engine.layout().clone();
    let mut flags = 0;
    for event in engine.take_host_input() {
        flags |= engine.host_mut().apply_input(&layout, &event).bits();
    }
    if flags != 0 {
        engine.on_refresh(flags);
    }
}

/// Flash the beat LED while the transport plays; bar on every fourth beat
fn advance_beat(engine: &mut Engine, half_beats: u32) -> u32 {
    if engine.host().led(buttons::PLAY) != LedState::On {
        if half_beats != 0 {
            engine.on_update_beat_indicator(0);
        }
        return 0;
    }

    let value = match (half_beats % 2, half_beats / 2 % 4) {
        (1, _) => 0,
        (_, 0) => 1,
        _ => 2,
    };
    engine.on_update_beat_indicator(value);
    half_beats.wrapping_add(1)
}

fn list_ports_formatted() {
    println!("\n{}", "=== Available MIDI Ports ===".bold().cyan());

    match mcu::list_ports() {
        Ok((inputs, outputs)) => {
            print_ports("Input Ports:", &inputs);
            print_ports("Output Ports:", &outputs);
        }
        Err(e) => println!("  {} {}", "Failed to list ports:".red(), e),
    }
    println!();
}

fn print_ports(title: &str, ports: &[String]) {
    println!("\n{}", title.bold());
    if ports.is_empty() {
        println!("  {}", "No ports found".dimmed());
        return;
    }
    for name in ports {
        let lower = name.to_lowercase();
        let marker = if lower.contains("x-touch") || lower.contains("mackie") || lower.contains("mcu") {
            "[SURFACE]".green()
        } else {
            "[OTHER]".dimmed()
        };
        println!("  {} {}", marker, name);
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_thread_ids(false)
                .with_thread_names(false),
        )
        .init();

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!("Failed to install CTRL+C signal handler: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}
