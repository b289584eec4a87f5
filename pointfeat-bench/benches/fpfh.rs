//! Benchmarks of the FPFH implementations
//!
//! `legacy` measures the double precision single-entry path, `engine` the
//! backend engine on every device and precision this build supports.

use criterion::measurement::WallTime;
use criterion::{black_box, criterion_group, criterion_main, BenchmarkGroup, BenchmarkId, Criterion};
use pointfeat::algorithms::{compute_fpfh_feature_with, legacy};
use pointfeat::{backend, Device, Dtype, NormalPoint3, PointCloud, Real};
use pointfeat_bench::{capture_cases, fixture, BenchCase};

fn devices() -> Vec<Device> {
    let mut devices = vec![Device::Sequential, Device::Parallel { threads: None }];
    if cfg!(feature = "gpu") {
        devices.push(Device::Accelerated { ordinal: 0 });
    }
    devices
}

fn benchmark_legacy(c: &mut Criterion) {
    let cloud = fixture().expect("Failed to build fixture");
    let mut group = c.benchmark_group("legacy");
    group.sample_size(10);

    for case in capture_cases() {
        let policy = case.policy().expect("Invalid benchmark policy");
        let indices = case.indices(cloud.len()).expect("Invalid index ratio");

        group.bench_with_input(BenchmarkId::new("Legacy", case), &case, |b, _| {
            b.iter(|| {
                let fpfh = legacy::compute_fpfh_feature(&cloud, &policy, indices.as_deref())
                    .expect("Failed to compute FPFH");
                black_box(fpfh);
            });
        });
    }

    group.finish();
}

fn bench_engine_case<T: Real>(
    group: &mut BenchmarkGroup<'_, WallTime>,
    cloud: &PointCloud<NormalPoint3<T>>,
    device: Device,
    case: &BenchCase,
) {
    let Ok(engine) = backend::<T>(device) else {
        eprintln!("Skipping {}: device unavailable", device);
        return;
    };
    let policy = case.policy().expect("Invalid benchmark policy").cast::<T>();
    let indices = case.indices(cloud.len()).expect("Invalid index ratio");

    // Warm up
    compute_fpfh_feature_with(engine.as_ref(), cloud, &policy, indices.as_deref())
        .expect("Failed to compute FPFH");

    group.bench_with_input(
        BenchmarkId::new(format!("{}", case), T::DTYPE),
        case,
        |b, _| {
            b.iter(|| {
                let fpfh =
                    compute_fpfh_feature_with(engine.as_ref(), cloud, &policy, indices.as_deref())
                        .expect("Failed to compute FPFH");
                black_box(fpfh);
            });
        },
    );
}

fn benchmark_engine(c: &mut Criterion) {
    let cloud = fixture().expect("Failed to build fixture");
    let cloud_f32 = cloud.cast::<f32>();

    for device in devices() {
        let mut group = c.benchmark_group(format!("engine_{}", device));
        group.sample_size(10);
        for case in capture_cases() {
            for dtype in [Dtype::Float32, Dtype::Float64] {
                match dtype {
                    Dtype::Float32 => bench_engine_case(&mut group, &cloud_f32, device, &case),
                    Dtype::Float64 => bench_engine_case(&mut group, &cloud, device, &case),
                }
            }
        }
        group.finish();
    }
}

criterion_group!(benches, benchmark_legacy, benchmark_engine);

criterion_main!(benches);
