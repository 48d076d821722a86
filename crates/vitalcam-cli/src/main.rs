use std::f32::consts::PI;
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use log::info;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use vitalcam_signals::{Frame, FrameSource, ProcessorConfig, VitalSignsProcessor};

/// Minimum confidence for a session's final reading
const FINAL_CONFIDENCE: f32 = 0.3;

#[derive(Parser)]
#[command(name = "vitalcam", about = "Camera PPG vital-signs pipeline")]
struct Cli {
    /// TOML configuration file (VITALCAM_* environment variables still apply)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    cmd: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a session against a synthetic fingertip camera
    Simulate {
        /// Pulse rate of the simulated finger
        #[arg(long, default_value_t = 90.0)]
        bpm: f32,
        /// Session length in seconds
        #[arg(long, default_value_t = 15.0)]
        duration: f32,
        /// Camera frame rate
        #[arg(long, default_value_t = 30.0)]
        fps: f32,
        /// Child age in years (clamped to 0-7)
        #[arg(long, default_value_t = 5)]
        age: i32,
        /// Body temperature in degrees C (clamped to 35-42)
        #[arg(long, default_value_t = 37.0)]
        temperature: f32,
        /// Peak green-channel noise added to each frame
        #[arg(long, default_value_t = 0.5)]
        noise: f32,
        /// Seconds with the finger lifted at the start
        #[arg(long, default_value_t = 0.0)]
        lift: f32,
        /// Seed for camera noise and the diastolic ratio
        #[arg(long)]
        seed: Option<u64>,
        /// Print every result as a JSON line
        #[arg(long)]
        json: bool,
    },
    /// Print the effective configuration as TOML
    Config {},
}

/// Dark frame with an upright fingertip whose green channel carries the pulse
struct SyntheticCamera {
    width: u32,
    height: u32,
    bpm: f32,
    fps: f32,
    frames: usize,
    lifted_frames: usize,
    noise: f32,
    rng: StdRng,
    next: usize,
}

impl SyntheticCamera {
    fn frame_at(&mut self, index: usize, t: f32) -> Option<Frame> {
        let mut frame = Frame::filled(self.width, self.height, [20, 20, 20]).ok()?;
        if index < self.lifted_frames {
            return Some(frame);
        }
        let noise = if self.noise > 0.0 {
            self.rng.gen_range(-self.noise..self.noise)
        } else {
            0.0
        };
        let pulse = 3.0 * (2.0 * PI * self.bpm / 60.0 * t).sin();
        let green = (70.0 + pulse + noise).round().clamp(0.0, 255.0) as u8;
        let (w, h) = (self.width * 5 / 16, self.height * 11 / 12);
        frame.fill_rect((self.width - w) / 2, (self.height - h) / 2, w, h, [190, green, 50]);
        Some(frame)
    }
}

impl FrameSource for SyntheticCamera {
    fn next_frame(&mut self) -> Option<(Frame, f64)> {
        if self.next >= self.frames {
            return None;
        }
        let index = self.next;
        self.next += 1;
        let t = index as f32 / self.fps;
        let frame = self.frame_at(index, t)?;
        Some((frame, t as f64))
    }

    fn frame_rate(&self) -> Option<f32> {
        Some(self.fps)
    }
}

fn load_config(path: Option<&PathBuf>) -> Result<ProcessorConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(path) => {
            let mut config = ProcessorConfig::from_file(path)?;
            config.apply_env_overrides()?;
            config.validate()?;
            config
        }
        None => ProcessorConfig::load_layered(None, None)?,
    };
    Ok(config)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let config = load_config(cli.config.as_ref())?;

    match cli.cmd {
        Commands::Config {} => {
            print!("{}", config.to_toml_string()?);
        }
        Commands::Simulate {
            bpm,
            duration,
            fps,
            age,
            temperature,
            noise,
            lift,
            seed,
            json,
        } => {
            if !(fps > 0.0 && duration > 0.0) {
                return Err("fps and duration must be positive".into());
            }
            let seed = seed.unwrap_or_else(rand::random);
            info!("simulating {duration} s at {fps} fps, {bpm} BPM, seed {seed}");

            let mut processor = VitalSignsProcessor::with_seed(config, seed)?;
            processor.configure(temperature, age);

            let mut camera = SyntheticCamera {
                width: 64,
                height: 48,
                bpm,
                fps,
                frames: (duration * fps).round() as usize,
                lifted_frames: (lift * fps).round() as usize,
                noise: noise.abs(),
                rng: StdRng::seed_from_u64(seed.wrapping_add(1)),
                next: 0,
            };

            let mut final_result = None;
            let mut printed = 0usize;
            while let Some((frame, t)) = camera.next_frame() {
                let Some(result) = processor.process_frame(&frame, t) else {
                    continue;
                };
                if json {
                    println!("{}", serde_json::to_string(&result)?);
                } else if printed % fps.round().max(1.0) as usize == 0 {
                    println!(
                        "t={t:5.1}s finger={:<5} hr={:>4} bp={:>7} conf={:.2} {}{}",
                        result.finger_detected,
                        result.heart_rate.map(|v| v.to_string()).unwrap_or("-".into()),
                        result
                            .blood_pressure
                            .map(|bp| format!("{}/{}", bp.systolic, bp.diastolic))
                            .unwrap_or("-".into()),
                        result.confidence,
                        result.quality,
                        result.message.as_deref().map(|m| format!(" ({m})")).unwrap_or_default(),
                    );
                }
                printed += 1;
                if result.is_reportable(FINAL_CONFIDENCE) {
                    final_result = Some(result);
                }
            }

            let stats = processor.stats();
            info!(
                "frames received {}, accepted {}, throttled {}",
                stats.frames.received, stats.frames.accepted, stats.frames.throttled
            );
            if !json {
                match final_result {
                    Some(r) => println!(
                        "final: {} BPM, {} ({}, confidence {:.2})",
                        r.heart_rate.unwrap_or_default(),
                        r.blood_pressure
                            .map(|bp| format!("{}/{} mmHg", bp.systolic, bp.diastolic))
                            .unwrap_or_else(|| "no blood pressure".into()),
                        r.quality,
                        r.confidence
                    ),
                    None => println!("final: no reading reached confidence {FINAL_CONFIDENCE}"),
                }
            }
        }
    }
    Ok(())
}
