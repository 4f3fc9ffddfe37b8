use clap::Parser;
use multithreshold::core::diagnostics::Diagnostics;
use multithreshold::storage::ThresholdFile;
use multithreshold::{
    Batch, ExactQuantizer, IterationOrder, LossyQuantizer, PerTensorAffine, PoolConfig, Quantizer,
    Strategy, ThresholdSet, WorkerPool, THRESHOLDS_PER_CHANNEL,
};
use rand::Rng;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about = "Quantize a random batch with every kernel", long_about = None)]
struct Args {
    /// Threshold file written by `generator`. Random thresholds if omitted.
    #[arg(short, long)]
    thresholds: Option<PathBuf>,

    #[arg(short, long, default_value_t = 24)]
    channels: usize,

    #[arg(short, long, default_value_t = 4096)]
    samples: usize,

    #[arg(short, long, default_value_t = 4)]
    digits: u32,

    #[arg(long)]
    threads: Option<usize>,

    #[arg(long)]
    pin: bool,
}

fn random_thresholds(channels: usize) -> Result<ThresholdSet, Box<dyn std::error::Error>> {
    let mut rng = rand::thread_rng();
    let mut values = Vec::with_capacity(channels * THRESHOLDS_PER_CHANNEL);
    for _ in 0..channels {
        let mut row: Vec<f32> = (0..THRESHOLDS_PER_CHANNEL).map(|_| rng.gen_range(-1.0..1.0)).collect();
        row.sort_by(f32::total_cmp);
        values.extend(row);
    }
    Ok(ThresholdSet::new(values, channels)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let thresholds = match &args.thresholds {
        Some(path) => ThresholdFile::load(path)?.to_threshold_set()?,
        None => random_thresholds(args.channels)?,
    };
    let channels = thresholds.channels();
    info!(channels, health = ?Diagnostics::check(&thresholds, args.digits), "thresholds ready");

    let mut rng = rand::thread_rng();
    let inputs: Vec<f32> = (0..channels * args.samples).map(|_| rng.gen_range(-1.2..1.2)).collect();
    let batch = Batch::batch_major(&inputs, channels)?;

    let pool = Arc::new(WorkerPool::new(PoolConfig {
        thread_cap: args.threads,
        pin_threads: args.pin,
    })?);
    info!(
        pool = pool.size(),
        granted = pool.threads_for(channels, args.samples),
        "worker pool"
    );

    let mut quantizers: Vec<Box<dyn Quantizer>> = vec![
        Box::new(ExactQuantizer::new(Strategy::Reference)),
        Box::new(ExactQuantizer::new(Strategy::BinarySearch(IterationOrder::BatchMajor))),
        Box::new(ExactQuantizer::new(Strategy::BinarySearch(IterationOrder::ChannelMajor))),
        Box::new(ExactQuantizer::new(Strategy::Monotonic)),
        Box::new(ExactQuantizer::parallel(pool)),
        Box::new(PerTensorAffine::new(&thresholds)),
    ];

    let build = Instant::now();
    match LossyQuantizer::build(&thresholds, args.digits) {
        Ok(lossy) => {
            info!(elapsed = ?build.elapsed(), entries = lossy.table_bytes(), "lookup tables built");
            quantizers.push(Box::new(lossy));
        }
        Err(err) => warn!(digits = args.digits, %err, "skipping lookup tables"),
    }

    let reference = quantizers[0].quantize(&thresholds, &batch)?;
    for q in &quantizers {
        let start = Instant::now();
        let codes = q.quantize(&thresholds, &batch)?;
        let elapsed = start.elapsed();
        let report = multithreshold::DeviationReport::compare(codes.as_slice(), reference.as_slice());
        println!(
            "{:<28} {:>10.2?}  mismatches {:>7} / {}  max step {}",
            q.name(),
            elapsed,
            report.mismatches,
            report.total,
            report.max_step
        );
    }

    Ok(())
}
