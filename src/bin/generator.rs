use clap::Parser;
use multithreshold::storage::{save_json, write_thresholds};
use multithreshold::{ThresholdSet, THRESHOLDS_PER_CHANNEL};
use rand::Rng;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    #[arg(short, long, default_value_t = 24)]
    channels: usize,

    #[arg(short, long, default_value = "thresholds.bin")]
    output: PathBuf,

    /// Lower end of the threshold range.
    #[arg(long, default_value_t = -1.0, allow_negative_numbers = true)]
    min: f32,

    /// Upper end of the threshold range.
    #[arg(long, default_value_t = 1.0, allow_negative_numbers = true)]
    max: f32,

    /// Write JSON instead of the binary format.
    #[arg(long)]
    json: bool,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();
    if !(args.min < args.max) {
        eprintln!("Error: --min must be below --max");
        std::process::exit(1);
    }

    println!(
        "Generating {} channels of {} thresholds in [{}, {})...",
        args.channels, THRESHOLDS_PER_CHANNEL, args.min, args.max
    );
    let mut rng = rand::thread_rng();
    let mut values = Vec::with_capacity(args.channels * THRESHOLDS_PER_CHANNEL);
    for _ in 0..args.channels {
        let mut row: Vec<f32> = (0..THRESHOLDS_PER_CHANNEL)
            .map(|_| rng.gen_range(args.min..args.max))
            .collect();
        row.sort_by(f32::total_cmp);
        values.extend(row);
    }
    let thresholds = ThresholdSet::new(values, args.channels)?;

    if args.json {
        save_json(&args.output, &thresholds)?;
    } else {
        write_thresholds(&args.output, &thresholds)?;
    }
    println!("Saved to {:?}", args.output);

    Ok(())
}
