//! Nearest neighbor search implementations

use kiddo::immutable::float::kdtree::ImmutableKdTree;
use kiddo::SquaredEuclidean;
use nalgebra::Point3;
use pointfeat_core::{NearestNeighborSearch, Neighborhood, Real};
use rstar::primitives::GeomWithData;
use rstar::RTree;

/// Bucket size for the KD-tree.
const BUCKET_SIZE: usize = 256;

/// Clouds with more points than this sharing one coordinate value on an axis
/// are indexed with an R*-tree; kiddo cannot split such buckets.
const MAX_SHARED_COORDINATE: usize = BUCKET_SIZE / 2;

type IndexedPoint = GeomWithData<[f64; 3], u64>;

fn to_array<T: Real>(point: &Point3<T>) -> [f64; 3] {
    [point.x.as_f64(), point.y.as_f64(), point.z.as_f64()]
}

fn squared_distance(a: &[f64; 3], b: &[f64; 3]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    let dz = a[2] - b[2];
    dx * dx + dy * dy + dz * dz
}

/// Largest number of points sharing one coordinate value on any axis
fn max_shared_coordinate(coords: &[[f64; 3]]) -> usize {
    (0..3)
        .map(|axis| {
            let mut values: Vec<f64> = coords.iter().map(|c| c[axis]).collect();
            values.sort_unstable_by(f64::total_cmp);

            let mut longest = 0;
            let mut run = 0;
            let mut previous: Option<f64> = None;
            for value in values {
                if previous == Some(value) {
                    run += 1;
                } else {
                    run = 1;
                    previous = Some(value);
                }
                longest = longest.max(run);
            }
            longest
        })
        .max()
        .unwrap_or(0)
}

enum SpatialIndex {
    Kiddo(ImmutableKdTree<f64, u64, 3, BUCKET_SIZE>),
    RTree(RTree<IndexedPoint>),
}

/// KD-tree implementation for nearest neighbor search
///
/// Coordinates are indexed in double precision regardless of `T` so that both
/// precisions see identical neighborhoods. Degenerate clouds (flat grids,
/// large clusters of duplicates) are indexed with an R*-tree instead.
pub struct KdTree<T> {
    index: Option<SpatialIndex>,
    len: usize,
    _precision: std::marker::PhantomData<T>,
}

impl<T: Real> KdTree<T> {
    pub fn new(points: &[Point3<T>]) -> Self {
        let coords: Vec<[f64; 3]> = points.iter().map(to_array).collect();
        let index = if coords.is_empty() {
            None
        } else {
            let shared = max_shared_coordinate(&coords);
            if shared > MAX_SHARED_COORDINATE {
                log::debug!(
                    "{} points share a coordinate value, indexing {} points with an R*-tree",
                    shared,
                    coords.len()
                );
                let items: Vec<IndexedPoint> = coords
                    .iter()
                    .enumerate()
                    .map(|(id, &p)| GeomWithData::new(p, id as u64))
                    .collect();
                Some(SpatialIndex::RTree(RTree::bulk_load(items)))
            } else {
                Some(SpatialIndex::Kiddo((&*coords).into()))
            }
        };
        Self {
            index,
            len: points.len(),
            _precision: std::marker::PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl<T: Real> NearestNeighborSearch<T> for KdTree<T> {
    fn find_k_nearest(&self, query: &Point3<T>, k: usize) -> Vec<(usize, T)> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        let k = k.min(self.len);
        if k == 0 {
            return Vec::new();
        }
        let query = to_array(query);
        let mut found: Vec<(usize, f64)> = match index {
            SpatialIndex::Kiddo(tree) => tree
                .nearest_n::<SquaredEuclidean>(&query, k)
                .into_iter()
                .map(|nn| (nn.item as usize, nn.distance))
                .collect(),
            SpatialIndex::RTree(tree) => tree
                .nearest_neighbor_iter_with_distance_2(&query)
                .take(k)
                .map(|(item, d2)| (item.data as usize, d2))
                .collect(),
        };
        sort_by_distance(&mut found);
        into_distances(found)
    }

    fn find_radius_neighbors(&self, query: &Point3<T>, radius: T) -> Vec<(usize, T)> {
        let Some(index) = &self.index else {
            return Vec::new();
        };
        // Both indices work on squared distance; the bound is exclusive
        let radius = radius.as_f64();
        let radius_squared = radius * radius;
        let query = to_array(query);
        let mut found: Vec<(usize, f64)> = match index {
            SpatialIndex::Kiddo(tree) => tree
                .within::<SquaredEuclidean>(&query, radius_squared)
                .into_iter()
                .map(|nn| (nn.item as usize, nn.distance))
                .collect(),
            SpatialIndex::RTree(tree) => tree
                .locate_within_distance(query, radius_squared)
                .map(|item| (item.data as usize, squared_distance(item.geom(), &query)))
                .filter(|&(_, d2)| d2 < radius_squared)
                .collect(),
        };
        sort_by_distance(&mut found);
        into_distances(found)
    }
}

/// Simple brute force nearest neighbor search for small datasets
pub struct BruteForceSearch<T> {
    points: Vec<[f64; 3]>,
    _precision: std::marker::PhantomData<T>,
}

impl<T: Real> BruteForceSearch<T> {
    pub fn new(points: &[Point3<T>]) -> Self {
        Self {
            points: points.iter().map(to_array).collect(),
            _precision: std::marker::PhantomData,
        }
    }

    fn squared_distances(&self, query: &Point3<T>) -> Vec<(usize, f64)> {
        let q = to_array(query);
        self.points
            .iter()
            .enumerate()
            .map(|(idx, point)| (idx, squared_distance(point, &q)))
            .collect()
    }
}

/// Order `(index, squared distance)` pairs by distance, ties by index
fn sort_by_distance(distances: &mut [(usize, f64)]) {
    distances.sort_by(|a, b| {
        a.1.partial_cmp(&b.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });
}

fn into_distances<T: Real>(squared: Vec<(usize, f64)>) -> Vec<(usize, T)> {
    squared
        .into_iter()
        .map(|(idx, d2)| (idx, T::cast_f64(d2.sqrt())))
        .collect()
}

impl<T: Real> NearestNeighborSearch<T> for BruteForceSearch<T> {
    fn find_k_nearest(&self, query: &Point3<T>, k: usize) -> Vec<(usize, T)> {
        let mut distances = self.squared_distances(query);

        // Sort by distance and take k nearest
        sort_by_distance(&mut distances);
        distances.truncate(k);
        into_distances(distances)
    }

    fn find_radius_neighbors(&self, query: &Point3<T>, radius: T) -> Vec<(usize, T)> {
        let radius = radius.as_f64();
        let radius_squared = radius * radius;
        let mut distances: Vec<(usize, f64)> = self
            .squared_distances(query)
            .into_iter()
            .filter(|&(_, d2)| d2 < radius_squared)
            .collect();
        sort_by_distance(&mut distances);
        into_distances(distances)
    }
}

/// Neighborhoods of every point of a cloud in compressed row form
///
/// Row `i` spans `offsets[i]..offsets[i + 1]` of `indices` and `distances`;
/// its first entry is point `i` itself.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborTable<T> {
    offsets: Vec<usize>,
    indices: Vec<usize>,
    distances: Vec<T>,
}

impl<T: Real> NeighborTable<T> {
    pub fn from_neighborhoods(neighborhoods: Vec<Neighborhood<T>>) -> Self {
        let total: usize = neighborhoods.iter().map(Neighborhood::len).sum();
        let mut offsets = Vec::with_capacity(neighborhoods.len() + 1);
        let mut indices = Vec::with_capacity(total);
        let mut distances = Vec::with_capacity(total);

        offsets.push(0);
        for neighborhood in neighborhoods {
            indices.extend(neighborhood.indices);
            distances.extend(neighborhood.distances);
            offsets.push(indices.len());
        }

        Self {
            offsets,
            indices,
            distances,
        }
    }

    /// Number of points with a neighborhood
    pub fn len(&self) -> usize {
        self.offsets.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Neighbor indices and distances of point `index`, self first
    pub fn neighbors(&self, index: usize) -> (&[usize], &[T]) {
        let range = self.offsets[index]..self.offsets[index + 1];
        (&self.indices[range.clone()], &self.distances[range])
    }

    /// Neighborhood size of point `index`, self included
    pub fn neighbor_count(&self, index: usize) -> usize {
        self.offsets[index + 1] - self.offsets[index]
    }

    /// Mean neighborhood size, self included
    pub fn average_neighbors(&self) -> f64 {
        if self.is_empty() {
            return 0.0;
        }
        self.indices.len() as f64 / self.len() as f64
    }

    pub fn offsets(&self) -> &[usize] {
        &self.offsets
    }

    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn distances(&self) -> &[T] {
        &self.distances
    }
}
