use std::time::Duration;

use clap::Parser;

use peakhz_app::{Recorder, RecorderConfig};
use peakhz_foundation::NO_ESTIMATE;

#[derive(Parser, Debug)]
#[command(
    name = "peakhz",
    about = "Reports the dominant frequency of the audio input in near-real time"
)]
struct Cli {
    /// Capture device name (default: host default input)
    #[arg(long)]
    device: Option<String>,

    /// How often the latest estimate is printed, in milliseconds
    #[arg(long, default_value_t = 500)]
    print_interval_ms: u64,
}

fn init_logging() {
    let log_level = std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string());
    tracing_subscriber::fmt()
        .with_env_filter(log_level)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_logging();
    let cli = Cli::parse();
    tracing::info!("Starting peakhz");

    let recorder = Recorder::new(RecorderConfig {
        device: cli.device.clone(),
        ..Default::default()
    });

    if let Err(e) = recorder.start() {
        if e.is_retryable() {
            tracing::error!("microphone access denied; grant capture permission and run again");
        }
        return Err(e.into());
    }

    let mut print_interval = tokio::time::interval(Duration::from_millis(cli.print_interval_ms));
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Shutdown signal received");
                break;
            }
            _ = print_interval.tick() => {
                let hz = recorder.latest_estimate();
                if hz == NO_ESTIMATE {
                    println!("Frequency: --");
                } else {
                    println!("Frequency: {} Hz", hz);
                }
            }
        }
    }

    recorder.stop();
    tracing::info!("Recorder stopped; exiting");
    Ok(())
}
