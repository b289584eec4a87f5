//! Core traits for pointfeat

use nalgebra::Point3;

use crate::real::Real;
use crate::search::{Neighborhood, SearchPolicy};

/// Trait for nearest neighbor search functionality
///
/// All queries return `(index, distance)` pairs sorted by increasing
/// Euclidean distance.
pub trait NearestNeighborSearch<T: Real> {
    /// Find the k nearest neighbors to a query point
    fn find_k_nearest(&self, query: &Point3<T>, k: usize) -> Vec<(usize, T)>;

    /// Find all neighbors strictly closer than `radius`
    fn find_radius_neighbors(&self, query: &Point3<T>, radius: T) -> Vec<(usize, T)>;

    /// Find at most `max_nn` nearest neighbors strictly closer than `radius`
    fn find_hybrid_neighbors(
        &self,
        query: &Point3<T>,
        radius: T,
        max_nn: usize,
    ) -> Vec<(usize, T)> {
        let mut neighbors = self.find_k_nearest(query, max_nn);
        neighbors.retain(|&(_, distance)| distance < radius);
        neighbors
    }

    /// Neighborhood of the indexed point `query_index` located at `query`
    ///
    /// The query point is always slot 0, even when coincident points exist.
    fn search(
        &self,
        query_index: usize,
        query: &Point3<T>,
        policy: &SearchPolicy<T>,
    ) -> Neighborhood<T> {
        let found = match *policy {
            SearchPolicy::Knn { k } => self.find_k_nearest(query, k),
            SearchPolicy::Radius { radius } => self.find_radius_neighbors(query, radius),
            SearchPolicy::Hybrid { radius, max_nn } => {
                self.find_hybrid_neighbors(query, radius, max_nn)
            }
        };
        Neighborhood::with_self_first(query_index, found, policy.max_neighbors())
    }
}
