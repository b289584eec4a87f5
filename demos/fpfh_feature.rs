//! FPFH Feature Example
//!
//! Builds the benchmark surface, computes FPFH descriptors on the requested
//! device and precision, and optionally checks them against the sequential
//! reference backend.
//!
//! ```text
//! cargo run --release --bin fpfh_feature -- --device parallel --dtype f64 --max-nn 50 --radius 0.02
//! ```

use std::time::Instant;

use anyhow::{bail, Context};
use clap::Parser;
use log::{info, warn};
use pointfeat::algorithms::subset_from_ratio;
use pointfeat::prelude::*;
use pointfeat_bench::{fixture_with, FIXTURE_POINTS};

#[derive(Debug, Parser)]
#[command(name = "fpfh_feature", about = "Compute FPFH descriptors on a synthetic surface")]
struct Args {
    /// Execution device: sequential, parallel[:N], cpu[:N], gpu[:N], cuda:N
    #[arg(long, default_value = "parallel")]
    device: Device,

    /// Precision: float32 / f32 or float64 / f64
    #[arg(long, default_value = "float32")]
    dtype: Dtype,

    /// Maximum number of neighbors (KNN, or hybrid together with --radius)
    #[arg(long)]
    max_nn: Option<usize>,

    /// Search radius (radius, or hybrid together with --max-nn)
    #[arg(long)]
    radius: Option<f64>,

    /// Describe only every 1/ratio-th point
    #[arg(long)]
    ratio_indices: Option<f64>,

    /// Number of raw surface samples before down-sampling
    #[arg(long, default_value_t = FIXTURE_POINTS)]
    points: usize,

    /// Compare the result with the sequential backend
    #[arg(long)]
    compare: bool,
}

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let (max_nn, radius) = match (args.max_nn, args.radius) {
        (None, None) => (Some(50), Some(0.02)),
        other => other,
    };
    let policy = SearchPolicy::from_options(max_nn, radius).context("invalid search policy")?;
    let context = ExecutionContext::new(args.device, args.dtype);

    let start = Instant::now();
    let cloud = fixture_with(args.points)?;
    info!("Prepared {} oriented points in {:?}", cloud.len(), start.elapsed());

    let indices = args
        .ratio_indices
        .map(|ratio| subset_from_ratio(cloud.len(), ratio))
        .transpose()?;
    if let Some(indices) = &indices {
        info!("Describing {} of {} points", indices.len(), cloud.len());
    }

    let start = Instant::now();
    let features = compute_fpfh_feature(&cloud, &policy, &context, indices.as_deref())
        .with_context(|| format!("FPFH computation on {} failed", context))?;
    info!(
        "{} {:?}: {} x {} descriptors in {:?}",
        context,
        policy,
        features.nrows(),
        features.ncols(),
        start.elapsed()
    );

    print_summary(&features.to_f64());

    if args.compare {
        if context.device == Device::Sequential {
            warn!("--compare has no effect on the sequential device");
        } else {
            let reference_context = context.with_device(Device::Sequential);
            let reference =
                compute_fpfh_feature(&cloud, &policy, &reference_context, indices.as_deref())?;
            let Some(diff) = features.max_abs_diff(&reference) else {
                bail!("reference produced a different number of rows");
            };
            let tolerance = match context.dtype {
                Dtype::Float32 => 1e-4,
                Dtype::Float64 => 1e-9,
            };
            if context.device.is_cpu() && diff > tolerance {
                bail!("{} differs from sequential by {:e}", context, diff);
            }
            info!("Max difference to sequential: {:e}", diff);
        }
    }

    Ok(())
}

fn print_summary(features: &FeatureMatrix<f64>) {
    if features.is_empty() {
        println!("No descriptors computed");
        return;
    }

    let rows = features.rows();
    let mut block_means = [0.0; HISTOGRAM_NUM_FEATURES];
    for row in rows {
        for (block, values) in row.chunks(HISTOGRAM_NUM_BINS).enumerate() {
            block_means[block] += values.iter().sum::<f64>();
        }
    }
    for mean in block_means.iter_mut() {
        *mean /= rows.len() as f64;
    }
    let zero_rows = rows
        .iter()
        .filter(|row| row.iter().all(|&v| v == 0.0))
        .count();

    println!("Descriptors: {} x {}", features.nrows(), features.ncols());
    println!(
        "Mean block mass (alpha / phi / theta): {:.2} / {:.2} / {:.2}",
        block_means[0], block_means[1], block_means[2]
    );
    println!("Rows without valid pairs: {}", zero_rows);
    if let Some(first) = features.row(0) {
        let preview: Vec<String> = first.iter().take(11).map(|v| format!("{:.1}", v)).collect();
        println!("Row 0 (alpha block): [{}]", preview.join(", "));
    }
}
