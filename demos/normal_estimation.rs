//! Normal Estimation Example
//!
//! Estimates normals on simple analytic shapes and reports how well they
//! match the known surface normals.

use std::time::Instant;

use pointfeat::prelude::*;

fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("Normal Estimation Example");
    println!("=========================");

    report(
        "Plane z = 0",
        &create_plane(),
        |_| Vector3d::z(),
        &SearchPolicy::knn(8),
    )?;
    report(
        "Unit sphere",
        &create_sphere(),
        |p| p.coords.normalize(),
        &SearchPolicy::knn(12),
    )?;
    report(
        "Cylinder around z",
        &create_cylinder(),
        |p| Vector3d::new(p.x, p.y, 0.0).normalize(),
        &SearchPolicy::hybrid(0.35, 16),
    )?;

    Ok(())
}

/// Estimate normals and compare them with the analytic ones, ignoring sign
fn report(
    name: &str,
    cloud: &PointCloud<Point3d>,
    analytic: impl Fn(&Point3d) -> Vector3d,
    policy: &SearchPolicy<f64>,
) -> anyhow::Result<()> {
    let start = Instant::now();
    let oriented = estimate_normals(cloud, policy)?;
    let elapsed = start.elapsed();

    let mut worst: f64 = 1.0;
    let mut mean = 0.0;
    for point in oriented.iter() {
        let agreement = point.normal.dot(&analytic(&point.position)).abs();
        worst = worst.min(agreement);
        mean += agreement;
    }
    mean /= oriented.len().max(1) as f64;

    println!("\n{} ({} points, {:?})", name, oriented.len(), elapsed);
    println!("  mean |cos| to analytic normal: {:.4}", mean);
    println!("  worst |cos|:                   {:.4}", worst);
    Ok(())
}

fn create_plane() -> PointCloud<Point3d> {
    (0..400)
        .map(|i| Point3d::new((i % 20) as f64 * 0.1 - 1.0, (i / 20) as f64 * 0.1 - 1.0, 0.0))
        .collect()
}

fn create_sphere() -> PointCloud<Point3d> {
    let golden_angle = std::f64::consts::PI * (3.0 - 5.0_f64.sqrt());
    let n = 800;
    (0..n)
        .map(|i| {
            let z = 1.0 - 2.0 * (i as f64 + 0.5) / n as f64;
            let ring = (1.0 - z * z).sqrt();
            let theta = golden_angle * i as f64;
            Point3d::new(ring * theta.cos(), ring * theta.sin(), z)
        })
        .collect()
}

fn create_cylinder() -> PointCloud<Point3d> {
    (0..24 * 12)
        .map(|i| {
            let angle = (i % 24) as f64 * std::f64::consts::TAU / 24.0;
            let height = (i / 24) as f64 * 0.2 - 1.0;
            Point3d::new(angle.cos(), angle.sin(), height)
        })
        .collect()
}
