//! Integration tests for pointfeat-algorithms
//!
//! These tests exercise the full descriptor pipeline through the public API:
//! neighbor search, both backends, subset requests, degenerate clouds and
//! error reporting.

use approx::assert_relative_eq;
use nalgebra::{Point3, Vector3};
use pointfeat_algorithms::*;
use pointfeat_core::{
    Device, Error, NearestNeighborSearch, NormalPoint3, NormalPoint3d, Point3d, PointCloud, Real,
    SearchPolicy, Vector3d, HISTOGRAM_DIM,
};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Noisy samples of a gently curved surface with analytic normals
fn create_surface_cloud(n: usize, seed: u64) -> PointCloud<NormalPoint3d> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..n)
        .map(|_| {
            let x: f64 = rng.gen_range(-1.0..1.0);
            let y: f64 = rng.gen_range(-1.0..1.0);
            let z = 0.2 * (2.0 * x).sin() + 0.1 * y * y;
            let normal = Vector3d::new(-0.4 * (2.0 * x).cos(), -0.2 * y, 1.0).normalize();
            NormalPoint3d::new(Point3d::new(x, y, z), normal)
        })
        .collect()
}

/// Regular planar grid with `+z` normals
fn create_grid_cloud<T: Real>(side: usize, spacing: f64) -> PointCloud<NormalPoint3<T>> {
    (0..side * side)
        .map(|i| {
            let x = (i % side) as f64 * spacing;
            let y = (i / side) as f64 * spacing;
            NormalPoint3::new(
                Point3::new(T::cast_f64(x), T::cast_f64(y), T::cast_f64(0.5)),
                Vector3::z(),
            )
        })
        .collect()
}

fn five_points() -> PointCloud<NormalPoint3d> {
    let normals = [
        Vector3d::new(0.0, 0.0, 1.0),
        Vector3d::new(0.0, 0.6, 0.8),
        Vector3d::new(0.6, 0.0, 0.8),
        Vector3d::new(0.0, -0.6, 0.8),
        Vector3d::new(-0.6, 0.0, 0.8),
    ];
    let positions = [
        Point3d::new(0.0, 0.0, 0.0),
        Point3d::new(0.0, 1.0, 0.1),
        Point3d::new(1.1, 0.0, 0.2),
        Point3d::new(0.0, -1.2, 0.0),
        Point3d::new(-1.3, 0.1, 0.1),
    ];
    PointCloud::from_positions_and_normals(&positions, &normals).unwrap()
}

#[test]
fn test_one_row_per_point_and_non_negative_bins() {
    let cloud = create_surface_cloud(300, 7);
    for policy in [
        SearchPolicy::knn(12),
        SearchPolicy::radius(0.2),
        SearchPolicy::hybrid(0.2, 16),
    ] {
        let features = SequentialBackend.compute(&cloud, &policy, None).unwrap();
        assert_eq!(features.nrows(), cloud.len());
        assert_eq!(features.ncols(), HISTOGRAM_DIM);
        assert!(features.is_finite());
        for row in features.rows() {
            assert!(row.iter().all(|&v| v >= 0.0));
        }
    }
}

#[test]
fn test_sequential_and_parallel_agree_f64() {
    let cloud = create_surface_cloud(500, 11);
    let policy = SearchPolicy::hybrid(0.25, 20);
    let sequential = compute_fpfh_feature(&cloud, &policy, Device::Sequential, None).unwrap();
    let parallel = compute_fpfh_feature(&cloud, &policy, Device::default(), None).unwrap();
    assert_eq!(sequential.nrows(), parallel.nrows());
    assert!(sequential.max_abs_diff(&parallel).unwrap() <= 1e-9);
}

#[test]
fn test_sequential_and_parallel_agree_f32() {
    let cloud = create_surface_cloud(500, 13).cast::<f32>();
    let policy = SearchPolicy::knn(15);
    let sequential = compute_fpfh_feature(&cloud, &policy, Device::Sequential, None).unwrap();
    let pooled = ParallelBackend::with_threads(3).unwrap();
    let parallel = compute_fpfh_feature_with(&pooled, &cloud, &policy, None).unwrap();
    assert!(sequential.max_abs_diff(&parallel).unwrap() <= 1e-4);
}

#[test]
fn test_coincident_points_stay_finite() {
    let point = Point3d::new(0.3, -0.2, 1.0);
    let cloud = PointCloud::from_positions_and_normals(
        &[point, point],
        &[Vector3d::z(), Vector3d::x()],
    )
    .unwrap();
    let features = SequentialBackend.compute(&cloud, &SearchPolicy::knn(2), None).unwrap();
    assert_eq!(features.nrows(), 2);
    assert!(features.is_finite());
    for row in features.rows() {
        assert!(row.iter().all(|&v| v == 0.0));
    }
}

#[test]
fn test_subset_rows_match_full_table() {
    let cloud = five_points();
    let policy = SearchPolicy::knn(3);
    let full = SequentialBackend.compute(&cloud, &policy, None).unwrap();
    let subset = SequentialBackend.compute(&cloud, &policy, Some(&[0, 2])).unwrap();
    assert_eq!(subset.nrows(), 2);
    assert_eq!(subset.row(0), full.row(0));
    assert_eq!(subset.row(1), full.row(2));

    let parallel = ParallelBackend::new().compute(&cloud, &policy, Some(&[2, 0])).unwrap();
    assert_eq!(parallel.row(0), full.row(2));
    assert_eq!(parallel.row(1), full.row(0));
}

#[test]
fn test_single_point_cloud_gives_zero_row() {
    let cloud: PointCloud<NormalPoint3d> =
        PointCloud::from_points(vec![NormalPoint3d::new(Point3d::origin(), Vector3d::z())]);
    let features = SequentialBackend.compute(&cloud, &SearchPolicy::knn(5), None).unwrap();
    assert_eq!(features.nrows(), 1);
    assert!(features.rows()[0].iter().all(|&v| v == 0.0));
}

#[test]
fn test_empty_inputs() {
    let cloud: PointCloud<NormalPoint3d> = PointCloud::new();
    let features = ParallelBackend::new().compute(&cloud, &SearchPolicy::knn(5), None).unwrap();
    assert!(features.is_empty());

    let cloud = five_points();
    let features = SequentialBackend.compute(&cloud, &SearchPolicy::knn(3), Some(&[])).unwrap();
    assert_eq!(features.nrows(), 0);
}

#[test]
fn test_larger_radius_never_shrinks_neighborhoods() {
    let cloud = create_surface_cloud(2000, 3);
    let small = SequentialBackend
        .build_neighbor_table(&cloud, &SearchPolicy::hybrid(0.01, 30))
        .unwrap();
    let large = SequentialBackend
        .build_neighbor_table(&cloud, &SearchPolicy::hybrid(0.02, 30))
        .unwrap();
    assert!(large.average_neighbors() >= small.average_neighbors());
    for i in 0..cloud.len() {
        assert!(large.neighbor_count(i) >= small.neighbor_count(i));
        assert_eq!(small.neighbors(i).0[0], i);
    }
}

#[test]
fn test_neighbor_table_respects_policy_bounds() {
    let cloud = create_surface_cloud(400, 5);
    let table = ParallelBackend::new()
        .build_neighbor_table(&cloud, &SearchPolicy::hybrid(0.15, 8))
        .unwrap();
    assert_eq!(table.len(), cloud.len());
    for i in 0..cloud.len() {
        let (indices, distances) = table.neighbors(i);
        assert!(indices.len() <= 8);
        assert_eq!(indices[0], i);
        assert_eq!(distances[0], 0.0);
        assert!(distances.iter().all(|&d| d <= 0.15));
        assert!(distances.windows(2).all(|w| w[0] <= w[1]));
    }
}

#[test]
fn test_invalid_policy_is_rejected() {
    let cloud = five_points();
    for policy in [
        SearchPolicy::knn(0),
        SearchPolicy::radius(0.0),
        SearchPolicy::radius(-1.0),
        SearchPolicy::hybrid(0.5, 0),
        SearchPolicy::hybrid(f64::NAN, 4),
    ] {
        let result = SequentialBackend.compute(&cloud, &policy, None);
        assert!(matches!(result, Err(Error::InvalidPolicy(_))));
    }
}

#[test]
fn test_mismatched_normals_are_rejected() {
    let positions = vec![Point3d::origin(); 4];
    let normals = vec![Vector3d::z(); 3];
    let result = PointCloud::from_positions_and_normals(&positions, &normals);
    assert!(matches!(
        result,
        Err(Error::DimensionMismatch {
            positions: 4,
            normals: 3
        })
    ));
}

#[test]
fn test_out_of_range_index_is_rejected() {
    let cloud = five_points();
    let result = ParallelBackend::new().compute(&cloud, &SearchPolicy::knn(3), Some(&[1, 5]));
    assert!(matches!(
        result,
        Err(Error::IndexOutOfRange { index: 5, len: 5 })
    ));
}

#[test]
fn test_non_unit_normal_is_rejected() {
    let mut cloud = five_points();
    cloud.points[3].normal = Vector3d::new(0.0, 0.0, 2.0);
    let result = SequentialBackend.compute(&cloud, &SearchPolicy::knn(3), None);
    assert!(matches!(result, Err(Error::InvalidNormal { index: 3 })));
}

#[test]
fn test_accelerated_device_is_not_a_cpu_backend() {
    let cloud = five_points();
    let device: Device = "gpu:0".parse().unwrap();
    let result = compute_fpfh_feature(&cloud, &SearchPolicy::knn(3), device, None);
    assert!(matches!(result, Err(Error::Unsupported(_))));
}

#[test]
fn test_single_and_double_precision_agree() {
    let double = create_grid_cloud::<f64>(12, 0.1);
    let single = create_grid_cloud::<f32>(12, 0.1);
    let features64 = SequentialBackend
        .compute(&double, &SearchPolicy::radius(0.15), None)
        .unwrap();
    let features32 = SequentialBackend
        .compute(&single, &SearchPolicy::radius(0.15f32), None)
        .unwrap();

    for (row32, row64) in features32.rows().iter().zip(features64.rows()) {
        for (&a, &b) in row32.iter().zip(row64.iter()) {
            assert_relative_eq!(a as f64, b, epsilon = 1e-3, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_normals_feed_descriptors() {
    let surface = create_surface_cloud(600, 21);
    let positions: PointCloud<Point3d> = surface.positions().into_iter().collect();
    let oriented = estimate_normals(&positions, &SearchPolicy::knn(20)).unwrap();
    assert!(oriented.validate().is_ok());

    // Estimated normals of a near-flat surface point up
    for (estimated, analytic) in oriented.iter().zip(surface.iter()) {
        assert!(estimated.normal.dot(&analytic.normal) > 0.8);
    }

    let subset = subset_from_ratio(oriented.len(), 0.1).unwrap();
    let policy = SearchPolicy::hybrid(0.2, 30);
    let features =
        compute_fpfh_feature(&oriented, &policy, Device::default(), Some(&subset)).unwrap();
    assert_eq!(features.nrows(), subset.len());
}

/// Three points along x with a duplicate of the first, all on one plane
fn duplicate_cloud<T: Real>() -> PointCloud<NormalPoint3<T>> {
    [0.3, 0.3, 0.4]
        .iter()
        .map(|&x| {
            NormalPoint3::new(
                Point3::new(T::cast_f64(x), T::cast_f64(-0.2), T::cast_f64(1.0)),
                Vector3::z(),
            )
        })
        .collect()
}

#[test]
fn test_large_duplicate_cluster_is_absorbed() {
    let mut points = vec![NormalPoint3d::new(Point3d::new(0.2, 0.1, 0.5), Vector3d::z()); 300];
    points.extend(
        (0..50).map(|i| NormalPoint3d::new(Point3d::new(i as f64 * 0.01, 0.0, 0.5), Vector3d::z())),
    );
    let cloud = PointCloud::from_points(points);

    for policy in [
        SearchPolicy::knn(8),
        SearchPolicy::radius(0.05),
        SearchPolicy::hybrid(0.05, 20),
    ] {
        let features = SequentialBackend.compute(&cloud, &policy, None).unwrap();
        assert_eq!(features.nrows(), cloud.len());
        assert!(features.is_finite());
        // Duplicates have no valid pair among themselves
        assert!(features.rows()[0].iter().all(|&v| v == 0.0));

        let parallel = ParallelBackend::new().compute(&cloud, &policy, None).unwrap();
        assert_eq!(features.max_abs_diff(&parallel), Some(0.0));
    }

    let legacy = legacy::compute_fpfh_feature(&cloud, &SearchPolicy::knn(8), None).unwrap();
    assert_eq!(legacy.nrows(), cloud.len());
}

#[test]
fn test_dense_planar_grid() {
    let cloud = create_grid_cloud::<f64>(100, 0.01);
    let policy = SearchPolicy::knn(8);

    let features = SequentialBackend.compute(&cloud, &policy, None).unwrap();
    assert_eq!(features.nrows(), 100 * 100);
    assert!(features.is_finite());
    // Coplanar pairs with parallel normals land in the middle bin of each block
    for row in features.rows() {
        assert!(row[5] >= 100.0);
        assert!(row[16] >= 100.0);
        assert!(row[27] >= 100.0);
    }

    let legacy = legacy::compute_fpfh_feature(&cloud, &policy, Some(&[0, 5050])).unwrap();
    assert_eq!(legacy.row(1), features.row(5050));

    let positions: PointCloud<Point3d> = cloud.positions().into_iter().collect();
    let oriented = estimate_normals(&positions, &policy).unwrap();
    assert!(oriented.iter().all(|p| (p.normal.z - 1.0).abs() < 1e-9));
}

#[test]
fn test_duplicate_point_precisions_agree() {
    let policy = SearchPolicy::radius(0.5);
    let double = SequentialBackend
        .compute(&duplicate_cloud::<f64>(), &policy, None)
        .unwrap();
    let single = SequentialBackend
        .compute(&duplicate_cloud::<f32>(), &policy.cast::<f32>(), None)
        .unwrap();

    // Every row: own SPF of 100 plus the non-coincident neighbors' 100 / 0.1
    for (row32, row64) in single.rows().iter().zip(double.rows()) {
        assert_relative_eq!(row64[5], 1100.0, max_relative = 1e-9);
        for (&a, &b) in row32.iter().zip(row64.iter()) {
            assert_relative_eq!(a as f64, b, epsilon = 1e-3, max_relative = 1e-4);
        }
    }
}

#[test]
fn test_radius_boundary_is_exclusive() {
    let positions = [
        Point3d::new(0.0, 0.0, 0.0),
        Point3d::new(0.5, 0.0, 0.0),
        Point3d::new(0.25, 0.0, 0.0),
    ];
    let cloud =
        PointCloud::from_positions_and_normals(&positions, &[Vector3d::z(); 3]).unwrap();
    let policy = SearchPolicy::radius(0.5);

    let table = SequentialBackend.build_neighbor_table(&cloud, &policy).unwrap();
    assert_eq!(table.neighbors(0).0, &[0, 2]);
    assert_eq!(table.neighbors(1).0, &[1, 2]);
    assert_eq!(table.neighbor_count(2), 3);

    let brute = BruteForceSearch::new(&positions[..]);
    let kdtree = KdTree::new(&positions[..]);
    for (index, point) in positions.iter().enumerate() {
        assert_eq!(
            brute.search(index, point, &policy),
            kdtree.search(index, point, &policy)
        );
    }
}

#[test]
fn test_aggregation_pass_checks_its_inputs() {
    let cloud = five_points();
    let policy = SearchPolicy::knn(3);
    let neighbors = SequentialBackend.build_neighbor_table(&cloud, &policy).unwrap();
    let spf = SequentialBackend.run_spf_pass(&cloud, &neighbors).unwrap();

    let result = SequentialBackend.run_aggregation_pass(&neighbors, &spf, &[7]);
    assert!(matches!(result, Err(Error::IndexOutOfRange { index: 7, len: 5 })));
    let result = ParallelBackend::new().run_aggregation_pass(&neighbors, &spf, &[0, 5]);
    assert!(matches!(result, Err(Error::IndexOutOfRange { index: 5, len: 5 })));

    // SPF table of a different cloud
    let other = create_grid_cloud::<f64>(3, 0.1);
    let other_neighbors = SequentialBackend.build_neighbor_table(&other, &policy).unwrap();
    let other_spf = SequentialBackend.run_spf_pass(&other, &other_neighbors).unwrap();
    let result = SequentialBackend.run_aggregation_pass(&neighbors, &other_spf, &[0]);
    assert!(matches!(result, Err(Error::Algorithm(_))));
}
