// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

use std::env;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use looper::audio::{AudioBackend, SimulatedBackend};
use looper::config::{EngineConfig, TriggerKind};
use looper::control::{ConsoleTrigger, KeyboardTrigger, ScriptedTrigger, TriggerSource};
use looper::demos::Demo;
use looper::program::Program;

/// Dry-run press spacing
const DRY_RUN_INTERVAL: Duration = Duration::from_millis(500);

fn print_usage() {
    println!("Looper - trigger-driven live looping engine");
    println!();
    println!("Usage: looper [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <FILE>     Load engine settings from a YAML file");
    println!("  --demo <NAME>       Program to perform (default: loop)");
    for demo in Demo::ALL {
        println!("                        {:<6} {}", demo.name(), demo.description());
    }
    println!("  --dry-run           Simulated audio and scripted presses");
    println!("  --presses <N>       Presses to script in a dry run (default: enough to finish)");
    #[cfg(feature = "hardware")]
    println!("  --list-midi         List MIDI inputs usable as a footswitch");
    println!("  --help              Show this help message");
}

#[derive(Debug, Default)]
struct Options {
    config: Option<PathBuf>,
    demo: Demo,
    dry_run: bool,
    presses: Option<usize>,
    list_midi: bool,
    help: bool,
}

fn parse_args(args: &[String]) -> Result<Options> {
    let mut options = Options::default();
    let mut iter = args.iter();

    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| anyhow!("--config requires a file path"))?;
                options.config = Some(PathBuf::from(path));
            }
            "--demo" => {
                let name = iter
                    .next()
                    .ok_or_else(|| anyhow!("--demo requires a name"))?;
                options.demo = name.parse().map_err(|e: String| anyhow!(e))?;
            }
            "--presses" => {
                let count = iter
                    .next()
                    .ok_or_else(|| anyhow!("--presses requires a number"))?;
                options.presses = Some(
                    count
                        .parse()
                        .with_context(|| format!("Invalid press count: {}", count))?,
                );
            }
            "--dry-run" => options.dry_run = true,
            "--list-midi" => options.list_midi = true,
            "--help" | "-h" => options.help = true,
            other => bail!("Unknown option: {}", other),
        }
    }
    Ok(options)
}

fn init_logging(config: &EngineConfig) {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.logging.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

#[cfg(feature = "hardware")]
fn list_midi() -> Result<()> {
    let ports = looper::control::midi::list_ports()?;
    if ports.is_empty() {
        println!("No MIDI inputs found");
    }
    for (index, name) in ports.iter().enumerate() {
        println!("  {}: {}", index, name);
    }
    Ok(())
}

#[cfg(not(feature = "hardware"))]
fn list_midi() -> Result<()> {
    bail!("MIDI support requires the `hardware` feature")
}

#[cfg(feature = "hardware")]
fn device_backend(config: &EngineConfig) -> Arc<dyn AudioBackend> {
    Arc::new(looper::audio::DeviceBackend::new(
        config.audio.sample_rate,
        config.audio.channels,
    ))
}

#[cfg(not(feature = "hardware"))]
fn device_backend(config: &EngineConfig) -> Arc<dyn AudioBackend> {
    tracing::warn!("built without the `hardware` feature; audio is simulated");
    simulated_backend(config)
}

fn simulated_backend(config: &EngineConfig) -> Arc<dyn AudioBackend> {
    Arc::new(SimulatedBackend::with_format(
        config.audio.sample_rate,
        config.audio.channels,
    ))
}

fn trigger_source(config: &EngineConfig) -> Result<Box<dyn TriggerSource>> {
    match config.trigger.source {
        TriggerKind::Keyboard => Ok(Box::new(KeyboardTrigger::with_defaults())),
        TriggerKind::Console => Ok(Box::new(ConsoleTrigger::stdin())),
        #[cfg(feature = "hardware")]
        TriggerKind::Midi => Ok(Box::new(looper::control::MidiTrigger::connect(
            config.trigger.midi_port,
            config.trigger.midi_controller,
        )?)),
        #[cfg(not(feature = "hardware"))]
        TriggerKind::Midi => bail!("MIDI triggers require the `hardware` feature"),
    }
}

fn main() -> Result<()> {
    let args: Vec<String> = env::args().skip(1).collect();
    let options = match parse_args(&args) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(1);
        }
    };

    if options.help {
        print_usage();
        return Ok(());
    }
    if options.list_midi {
        return list_midi();
    }

    let config = match &options.config {
        Some(path) => EngineConfig::load(path)?,
        None => EngineConfig::default(),
    };
    init_logging(&config);

    let backend = if options.dry_run {
        simulated_backend(&config)
    } else {
        device_backend(&config)
    };

    let mut program = Program::from_config(&config, backend);
    options
        .demo
        .build(&mut program)
        .with_context(|| format!("Failed to build demo '{}'", options.demo))?;
    info!(demo = %options.demo, tracks = program.tracks().len(), "program ready");

    if options.dry_run {
        let presses = options
            .presses
            .unwrap_or_else(|| program.events().pending_presses() + 1);
        program.run(ScriptedTrigger::new(presses).with_interval(DRY_RUN_INTERVAL))?;
    } else {
        program.run(trigger_source(&config)?)?;
    }

    Ok(())
}
