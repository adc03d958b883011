use std::{error::Error, fs, path::Path};

use clap::Parser;
use imucal_pipeline::{run_imu_camera_calibration, CalibrationConfig, CalibrationInput};

/// Continuous-time IMU-to-camera calibration from JSON artifacts.
#[derive(Debug, Parser)]
#[command(author, version, about = "Continuous-time IMU-to-camera calibration")]
struct Args {
    /// Path to a JSON CalibrationInput (poses, corners, landmarks,
    /// intrinsics, telemetry, and seed artifacts).
    #[arg(long)]
    input: String,

    /// Optional path to a JSON CalibrationConfig. Defaults are used if omitted.
    #[arg(long)]
    config: Option<String>,

    /// Optional JSON SplineWeighting artifact overriding the one in the input.
    #[arg(long)]
    weighting: Option<String>,

    /// Optional JSON ImuBiasInit artifact overriding the one in the input.
    #[arg(long)]
    bias: Option<String>,

    /// Optional JSON RoughAlignment artifact overriding the one in the input.
    #[arg(long)]
    alignment: Option<String>,

    /// Truncate the calibration window this many seconds after the first pose.
    #[arg(long)]
    max_duration: Option<f64>,
}

fn load_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn Error>> {
    let data = fs::read_to_string(path)?;
    let value = serde_json::from_str(&data)?;
    Ok(value)
}

fn run_calibration_from_files(args: &Args) -> Result<String, Box<dyn Error>> {
    let mut input: CalibrationInput = load_json_file(Path::new(&args.input))?;
    let mut config = match &args.config {
        Some(path) => load_json_file::<CalibrationConfig>(Path::new(path))?,
        None => CalibrationConfig::default(),
    };

    if let Some(path) = &args.weighting {
        input.weighting = load_json_file(Path::new(path))?;
    }
    if let Some(path) = &args.bias {
        input.bias = load_json_file(Path::new(path))?;
    }
    if let Some(path) = &args.alignment {
        input.alignment = load_json_file(Path::new(path))?;
    }
    if args.max_duration.is_some() {
        config.max_duration_s = args.max_duration;
    }

    let report = run_imu_camera_calibration(&input, &config)?;
    Ok(serde_json::to_string_pretty(&report)?)
}

fn main() {
    env_logger::init();
    if let Err(err) = try_main() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn try_main() -> Result<(), Box<dyn Error>> {
    let args = Args::parse();
    let json = run_calibration_from_files(&args)?;
    println!("{}", json);
    Ok(())
}
