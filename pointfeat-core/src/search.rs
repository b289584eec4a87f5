//! Neighbor search policies and per-point neighborhoods

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::real::Real;

/// How neighbors of a query point are selected
///
/// Every policy includes the query point itself as the first neighbor.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SearchPolicy<T> {
    /// The `k` nearest points
    Knn { k: usize },
    /// Every point within `radius`
    Radius { radius: T },
    /// At most `max_nn` nearest points within `radius`
    Hybrid { radius: T, max_nn: usize },
}

impl<T: Real> SearchPolicy<T> {
    pub fn knn(k: usize) -> Self {
        SearchPolicy::Knn { k }
    }

    pub fn radius(radius: T) -> Self {
        SearchPolicy::Radius { radius }
    }

    pub fn hybrid(radius: T, max_nn: usize) -> Self {
        SearchPolicy::Hybrid { radius, max_nn }
    }

    /// Build a policy from the optional `max_nn` / `radius` pair
    ///
    /// Both present selects hybrid search, one of them selects KNN or radius
    /// search. The resulting policy is validated.
    pub fn from_options(max_nn: Option<usize>, radius: Option<T>) -> Result<Self> {
        let policy = match (max_nn, radius) {
            (Some(max_nn), Some(radius)) => SearchPolicy::Hybrid { radius, max_nn },
            (Some(k), None) => SearchPolicy::Knn { k },
            (None, Some(radius)) => SearchPolicy::Radius { radius },
            (None, None) => {
                return Err(Error::InvalidPolicy(
                    "either max_nn or radius must be specified".to_string(),
                ))
            }
        };
        policy.validate()?;
        Ok(policy)
    }

    /// Reject non-positive neighbor counts and radii
    pub fn validate(&self) -> Result<()> {
        let check_k = |k: usize| {
            if k == 0 {
                Err(Error::InvalidPolicy("neighbor count must be positive".to_string()))
            } else {
                Ok(())
            }
        };
        let check_radius = |radius: T| {
            let r = radius.as_f64();
            if r.is_finite() && r > 0.0 {
                Ok(())
            } else {
                Err(Error::InvalidPolicy(format!(
                    "radius must be positive and finite, got {}",
                    r
                )))
            }
        };

        match *self {
            SearchPolicy::Knn { k } => check_k(k),
            SearchPolicy::Radius { radius } => check_radius(radius),
            SearchPolicy::Hybrid { radius, max_nn } => {
                check_k(max_nn)?;
                check_radius(radius)
            }
        }
    }

    /// Upper bound on the neighborhood size, if the policy has one
    pub fn max_neighbors(&self) -> Option<usize> {
        match *self {
            SearchPolicy::Knn { k } => Some(k),
            SearchPolicy::Radius { .. } => None,
            SearchPolicy::Hybrid { max_nn, .. } => Some(max_nn),
        }
    }

    /// Search radius, if the policy has one
    pub fn search_radius(&self) -> Option<T> {
        match *self {
            SearchPolicy::Knn { .. } => None,
            SearchPolicy::Radius { radius } | SearchPolicy::Hybrid { radius, .. } => Some(radius),
        }
    }

    /// Convert to another precision
    pub fn cast<U: Real>(&self) -> SearchPolicy<U> {
        match *self {
            SearchPolicy::Knn { k } => SearchPolicy::Knn { k },
            SearchPolicy::Radius { radius } => SearchPolicy::Radius {
                radius: U::cast_f64(radius.as_f64()),
            },
            SearchPolicy::Hybrid { radius, max_nn } => SearchPolicy::Hybrid {
                radius: U::cast_f64(radius.as_f64()),
                max_nn,
            },
        }
    }
}

/// Neighbors of one query point, ordered by increasing distance
///
/// Slot 0 always holds the query point itself with distance zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Neighborhood<T> {
    pub indices: Vec<usize>,
    pub distances: Vec<T>,
}

impl<T: Real> Neighborhood<T> {
    /// Arrange raw search results so the query point comes first
    ///
    /// `found` must be sorted by distance. Any entry for `query_index` is
    /// removed and re-inserted at the front, then the list is capped to
    /// `limit` entries.
    pub fn with_self_first(
        query_index: usize,
        found: Vec<(usize, T)>,
        limit: Option<usize>,
    ) -> Self {
        let capacity = found.len() + 1;
        let mut indices = Vec::with_capacity(capacity);
        let mut distances = Vec::with_capacity(capacity);
        indices.push(query_index);
        distances.push(T::zero());

        for (index, distance) in found {
            if index != query_index {
                indices.push(index);
                distances.push(distance);
            }
        }

        if let Some(limit) = limit {
            let limit = limit.max(1);
            indices.truncate(limit);
            distances.truncate(limit);
        }

        Self { indices, distances }
    }

    /// Number of neighbors, self included
    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_options() {
        assert_eq!(
            SearchPolicy::from_options(Some(50), Some(0.02)).unwrap(),
            SearchPolicy::Hybrid { radius: 0.02, max_nn: 50 }
        );
        assert_eq!(
            SearchPolicy::<f64>::from_options(Some(100), None).unwrap(),
            SearchPolicy::Knn { k: 100 }
        );
        assert_eq!(
            SearchPolicy::from_options(None, Some(0.01f32)).unwrap(),
            SearchPolicy::Radius { radius: 0.01 }
        );
        assert!(matches!(
            SearchPolicy::<f64>::from_options(None, None),
            Err(Error::InvalidPolicy(_))
        ));
    }

    #[test]
    fn test_validate() {
        assert!(SearchPolicy::<f64>::knn(0).validate().is_err());
        assert!(SearchPolicy::radius(0.0f64).validate().is_err());
        assert!(SearchPolicy::radius(-1.0f64).validate().is_err());
        assert!(SearchPolicy::radius(f64::NAN).validate().is_err());
        assert!(SearchPolicy::hybrid(0.1f32, 0).validate().is_err());
        assert!(SearchPolicy::hybrid(0.1f32, 10).validate().is_ok());
    }

    #[test]
    fn test_policy_from_json() {
        let policy: SearchPolicy<f64> =
            serde_json::from_str(r#"{"type": "hybrid", "radius": 0.02, "max_nn": 50}"#).unwrap();
        assert_eq!(policy, SearchPolicy::hybrid(0.02, 50));
        assert_eq!(policy.max_neighbors(), Some(50));
        assert_eq!(policy.cast::<f32>().search_radius(), Some(0.02f32));
    }

    #[test]
    fn test_with_self_first() {
        // A coincident point sorted ahead of the query point
        let found = vec![(4, 0.0), (2, 0.0), (7, 0.5), (1, 0.9)];
        let neighborhood = Neighborhood::with_self_first(2, found, Some(3));
        assert_eq!(neighborhood.indices, vec![2, 4, 7]);
        assert_eq!(neighborhood.distances, vec![0.0, 0.0, 0.5]);

        // Self missing from the raw results is still added
        let neighborhood = Neighborhood::with_self_first(9, vec![(3, 0.1f32)], None);
        assert_eq!(neighborhood.indices, vec![9, 3]);
    }
}
