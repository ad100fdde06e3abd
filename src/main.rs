//! coildrive - Rotating magnetic field generator for 3-axis coil rigs

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use anyhow::Result;
use clap::Parser;
use cpal::traits::{DeviceTrait, HostTrait};

use coildrive::choreo::ChoreographySequencer;
use coildrive::config;
use coildrive::engine::{BufferedStreamer, CpalDevice, Recorder};
use coildrive::params::{ParameterStore, SignalParameters};
use coildrive::synth::WaveSynthesizer;
use coildrive::viz::{self, ChunkBuffer};

mod cli;

use cli::{Cli, Commands};

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run { config: config_path } => {
            let cfg = config::load_config(&config_path)?;

            let store = ParameterStore::new(SignalParameters::from(&cfg.defaults));
            let chunk_buffer = Arc::new(Mutex::new(ChunkBuffer::new()));

            let shutdown = Arc::new(AtomicBool::new(false));
            {
                let shutdown = shutdown.clone();
                ctrlc::set_handler(move || shutdown.store(true, Ordering::SeqCst))?;
            }

            let rt = tokio::runtime::Runtime::new()?;
            let mut sequencer = ChoreographySequencer::new(store.clone(), rt.handle().clone());

            let output = cfg.output.clone();
            let session_store = store.clone();
            let session_buffer = chunk_buffer.clone();
            let open_session = move || {
                let synth = WaveSynthesizer::new(output.sample_rate, output.chunk_size)?;
                let (device, events) = CpalDevice::open(&output)?;
                BufferedStreamer::new(synth, session_store.clone())
                    .with_chunk_buffer(session_buffer.clone())
                    .start(device, events)
            };

            viz::run_panel(store, &mut sequencer, chunk_buffer, shutdown, open_session)?;
        }

        Commands::Record {
            config: config_path,
            output,
            duration,
        } => {
            println!("Loading configuration from {:?}...", config_path);
            let cfg = config::load_config(&config_path)?;

            println!("Rendering {} seconds to {:?}...", duration, output);

            let mut synth = WaveSynthesizer::new(cfg.output.sample_rate, cfg.output.chunk_size)?;
            let params = SignalParameters::from(&cfg.defaults);
            let mut recorder = Recorder::new(&output, cfg.output.sample_rate)?;

            let stop = Arc::new(AtomicBool::new(false));
            {
                let stop = stop.clone();
                ctrlc::set_handler(move || stop.store(true, Ordering::SeqCst))?;
            }

            let chunks_per_sec = synth.chunks_per_sec() as u64;
            let total_chunks = chunks_per_sec * duration;

            for i in 0..total_chunks {
                if stop.load(Ordering::SeqCst) {
                    println!("\nStopped early.");
                    break;
                }

                let chunk = synth.synthesize(&params);
                recorder.write_chunk(&chunk)?;

                // Progress update every second
                if i % chunks_per_sec == 0 {
                    print!("\r  Progress: {}s / {}s", i / chunks_per_sec, duration);
                    use std::io::Write;
                    std::io::stdout().flush()?;
                }
            }

            println!("\nRendered {:.1}s to {:?}", recorder.duration_secs(), output);
            recorder.finalize()?;
        }

        Commands::Devices => {
            println!("Available output devices:\n");

            let host = cpal::default_host();

            // Default output device
            if let Some(device) = host.default_output_device() {
                println!("Default output: {}", device.name().unwrap_or_default());
                if let Ok(config) = device.default_output_config() {
                    println!(
                        "  Sample rate: {} Hz, Channels: {}",
                        config.sample_rate().0,
                        config.channels()
                    );
                }
                println!();
            }

            println!("Output devices:");
            match host.output_devices() {
                Ok(devices) => {
                    for device in devices {
                        let name = device.name().unwrap_or_else(|_| "Unknown".to_string());
                        print!("  - {}", name);

                        if let Ok(config) = device.default_output_config() {
                            print!(
                                " ({} Hz, {} ch)",
                                config.sample_rate().0,
                                config.channels()
                            );
                        }
                        println!();
                    }
                }
                Err(e) => {
                    println!("  Error listing devices: {}", e);
                }
            }
        }

        Commands::Check { config: config_path } => {
            println!("Checking configuration at {:?}...", config_path);

            match config::load_config(&config_path) {
                Ok(cfg) => {
                    println!("Configuration is valid!");
                    println!(
                        "  Device: {}",
                        cfg.output.device.as_deref().unwrap_or("(default)")
                    );
                    println!("  Sample rate: {} Hz", cfg.output.sample_rate);
                    println!("  Chunk size: {} samples", cfg.output.chunk_size);
                    println!(
                        "  Refill rate: {} chunks/s",
                        cfg.output.sample_rate as usize / cfg.output.chunk_size
                    );
                    println!("  Device buffer: {} chunks", cfg.output.buffer_chunks);
                    println!("  Frequency: {} Hz", cfg.defaults.frequency);
                    println!("  Camber: {}°", cfg.defaults.camber);
                    println!("  Heading: {}°", cfg.defaults.zphase);
                    println!("  Z coefficient: {}", cfg.defaults.zcoeff);
                    println!("  Dead zone: {}", cfg.input.dead_zone);
                }
                Err(e) => {
                    println!("Configuration is invalid: {}", e);
                    std::process::exit(1);
                }
            }
        }

        Commands::Init => {
            let example_config = include_str!("../coildrive.example.yaml");

            let path = "coildrive.yaml";
            if std::path::Path::new(path).exists() {
                println!("coildrive.yaml already exists. Not overwriting.");
            } else {
                std::fs::write(path, example_config)?;
                println!("Created coildrive.yaml with example configuration.");
            }
        }
    }

    Ok(())
}
