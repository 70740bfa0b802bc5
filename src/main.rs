//! specdegrade CLI - Calibrated speech degradation and level measurement
//!
//! Command-line interface for generating degraded test material and
//! measuring active speech levels per ITU-T P.56.

use clap::{Parser, Subcommand, ValueEnum};
use rand::rngs::StdRng;
use rand::SeedableRng;
use specdegrade::audio::{compute_rms, linear_to_db, load_audio, save_samples};
use specdegrade::degrade::{apply_spectral_subtraction, DegradeConfig};
use specdegrade::{active_speech_level_ex, scale_to_asl, AslOptions, Prefilter, Result};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "specdegrade",
    about = "Calibrated speech degradation and active speech level measurement",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PrefilterArg {
    None,
    Narrowband,
    SuperWideband,
    Fullband,
}

impl From<PrefilterArg> for Prefilter {
    fn from(arg: PrefilterArg) -> Self {
        match arg {
            PrefilterArg::None => Prefilter::None,
            PrefilterArg::Narrowband => Prefilter::Narrowband,
            PrefilterArg::SuperWideband => Prefilter::SuperWideband,
            PrefilterArg::Fullband => Prefilter::Fullband,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Degrade a clean speech file with calibrated speech-shaped noise
    Degrade {
        /// Clean input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Output audio file path
        #[arg(short, long, default_value = "degraded.wav")]
        output: PathBuf,

        /// Assumed active speech level of the input in dB
        #[arg(short, long, default_value = "-26.0", allow_hyphen_values = true)]
        level: f64,

        /// Signal-to-noise ratio of the injected noise in dB
        #[arg(short, long, default_value = "10.0", allow_hyphen_values = true)]
        snr: f64,

        /// Random seed for the noise generator
        #[arg(long, default_value = "0")]
        seed: u64,

        /// Configuration file path
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Over-subtraction factor override
        #[arg(long)]
        over_subtraction: Option<f64>,

        /// Wiener power exponent override
        #[arg(long)]
        power_exponent: Option<f64>,

        /// Rescale the output to this active speech level in dB
        #[arg(long, allow_hyphen_values = true)]
        calibrate_to: Option<f64>,
    },

    /// Measure the active speech level of an audio file
    Asl {
        /// Input audio file
        #[arg(short, long)]
        input: PathBuf,

        /// Band-limiting pre-filter applied before measurement
        #[arg(short, long, default_value = "none")]
        prefilter: PrefilterArg,

        /// Assumed quantization depth in bits
        #[arg(long, default_value = "16")]
        nbits: u32,

        /// Activity margin in dB
        #[arg(long, default_value = "15.9")]
        margin: f64,

        /// Hangover time in seconds
        #[arg(long, default_value = "0.2")]
        hangover: f64,

        /// Envelope time constant in seconds
        #[arg(long, default_value = "0.03")]
        time_constant: f64,

        /// Lower peak-amplitude bound before safety rescaling
        #[arg(long, default_value = "0.1")]
        min_amplitude: f64,

        /// Upper peak-amplitude bound before safety rescaling
        #[arg(long, default_value = "1.0")]
        max_amplitude: f64,
    },

    /// Generate default configuration file
    InitConfig {
        /// Output path for config file
        #[arg(short, long, default_value = "degrade.yaml")]
        output: PathBuf,
    },

    /// Show information about the system
    Info,
}

fn main() -> Result<()> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Degrade {
            input,
            output,
            level,
            snr,
            seed,
            config,
            over_subtraction,
            power_exponent,
            calibrate_to,
        } => {
            log::info!("Speech Degradation");
            log::info!("==================");

            // Load or create config, then apply overrides
            let mut cfg = if let Some(config_path) = config {
                DegradeConfig::load(config_path)?
            } else {
                DegradeConfig::default()
            };
            if let Some(osf) = over_subtraction {
                cfg.over_subtraction = osf;
            }
            if let Some(p) = power_exponent {
                cfg.power_exponent = p;
            }

            let audio = load_audio(&input)?;
            log::info!("Input: {} ({:.2}s)", input.display(), audio.duration());
            log::info!("Speech level: {:.1} dB, SNR: {:.1} dB, seed: {}", level, snr, seed);

            let mut rng = StdRng::seed_from_u64(seed);
            let mut degraded = apply_spectral_subtraction(
                &audio.samples,
                audio.sample_rate,
                level,
                snr,
                &cfg,
                &mut rng,
            )?;

            if let Some(target) = calibrate_to {
                let (scaled, gain) =
                    scale_to_asl(&degraded, audio.sample_rate, target, &AslOptions::default())?;
                log::info!("Calibrated to {:.1} dB ASL (gain {:.4})", target, gain);
                degraded = scaled;
            }

            save_samples(&output, &degraded, audio.sample_rate)?;
            println!("✓ Degraded audio written to: {}", output.display());
        }

        Commands::Asl {
            input,
            prefilter,
            nbits,
            margin,
            hangover,
            time_constant,
            min_amplitude,
            max_amplitude,
        } => {
            let audio = load_audio(&input)?;
            let opts = AslOptions {
                nbits,
                margin_db: margin,
                hangover_s: hangover,
                time_constant_s: time_constant,
            };

            let prefilter: Prefilter = prefilter.into();
            let result = active_speech_level_ex(
                &audio.samples,
                audio.sample_rate,
                prefilter,
                min_amplitude,
                max_amplitude,
                &opts,
            )?;

            println!("File: {}", input.display());
            println!("Duration: {:.2}s", audio.duration());
            println!("Pre-filter: {}", prefilter);
            println!(
                "Long-term level: {:.2} dB",
                linear_to_db(compute_rms(&audio.samples) as f64)
            );
            println!("Active speech level: {:.2} dB", result.level_db);
            println!("Activity factor: {:.1}%", result.activity * 100.0);
        }

        Commands::InitConfig { output } => {
            log::info!("Creating default configuration...");

            let config = DegradeConfig::default();
            config.save(&output)?;

            println!("✓ Configuration saved to: {}", output.display());
        }

        Commands::Info => {
            println!("specdegrade - Speech Degradation and Level Measurement");
            println!("======================================================");
            println!("Version: {}", specdegrade::VERSION);
            println!("Platform: {}", std::env::consts::OS);
            println!("Architecture: {}", std::env::consts::ARCH);
            println!();
            println!("Features:");
            println!("  - Spectral-subtraction degradation with Wiener gain control");
            println!("  - ITU-T P.50 speech-shaped noise calibration");
            println!("  - ITU-T P.56 method B active speech level measurement");
            println!("  - Narrowband / super-wideband / fullband pre-filters");
            println!();
            println!("Default FFT Size: {}", specdegrade::N_FFT);
            println!("Default Overlap: {}", specdegrade::OVERLAP);
        }
    }

    Ok(())
}
