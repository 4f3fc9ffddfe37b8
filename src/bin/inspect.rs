use multithreshold::core::diagnostics::{Diagnostics, HealthStatus};
use multithreshold::storage::ThresholdFile;
use multithreshold::LossyThresholdLookup;
use serde::Serialize;
use std::path::Path;

#[derive(Serialize)]
struct Report {
    channels: u32,
    per_channel: u32,
    checksum: u32,
    health: HealthStatus,
    channel_stats: Vec<ChannelStats>,
}

#[derive(Serialize)]
struct ChannelStats {
    channel: usize,
    min: f32,
    max: f32,
    table_entries: Option<usize>,
    collisions: Option<usize>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args: Vec<String> = std::env::args().collect();
    if args.len() < 2 {
        eprintln!("Usage: {} <thresholds_path> [precision_digits]", args[0]);
        std::process::exit(1);
    }

    let path = Path::new(&args[1]);
    let digits: u32 = match args.get(2) {
        Some(d) => d.parse()?,
        None => 4,
    };

    let file = ThresholdFile::load(path)?;
    let header = *file.header();
    let thresholds = file.to_threshold_set()?;

    let channel_stats = (0..thresholds.channels())
        .map(|c| {
            let (min, max) = thresholds.channel_bounds(c);
            // Channels too wide for a table are reported without one.
            let lookup = LossyThresholdLookup::build(thresholds.channel(c), digits).ok();
            ChannelStats {
                channel: c,
                min,
                max,
                table_entries: lookup.as_ref().map(|l| l.table().len()),
                collisions: lookup.as_ref().map(|l| l.collisions()),
            }
        })
        .collect();

    let report = Report {
        channels: header.channels,
        per_channel: header.per_channel,
        checksum: header.checksum,
        health: Diagnostics::check(&thresholds, digits),
        channel_stats,
    };

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
