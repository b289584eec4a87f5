//! Angular invariants of an oriented point pair

use nalgebra::{Point3, Vector3};
use pointfeat_core::{Real, HISTOGRAM_NUM_BINS};

/// The three angular invariants of a point pair
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PairFeatures<T> {
    /// Rotation of the target normal around the frame's `u` axis, in [-π, π]
    pub alpha: T,
    /// Cosine between the frame's `v` axis and the target normal, in [-1, 1]
    pub phi: T,
    /// Cosine between the source normal and the connecting line, in [-1, 1]
    pub theta: T,
}

/// Compute the Darboux-frame invariants for the pair `(p, n_p)`, `(q, n_q)`
///
/// The source of the frame is the point whose normal makes the smaller angle
/// with the connecting line. Returns `None` for coincident points and for
/// pairs where the source normal is parallel to the connecting line, since
/// the frame is undefined in both cases.
pub fn compute_pair_features<T: Real>(
    p: &Point3<T>,
    normal_p: &Vector3<T>,
    q: &Point3<T>,
    normal_q: &Vector3<T>,
) -> Option<PairFeatures<T>> {
    let delta = q - p;
    let distance = delta.norm();
    if distance <= T::distance_epsilon() {
        return None;
    }
    let mut direction = delta / distance;

    let mut source = *normal_p;
    let mut target = *normal_q;
    let angle_p = source.dot(&direction);
    let angle_q = target.dot(&direction);

    let theta = if angle_p.abs().acos() > angle_q.abs().acos() {
        std::mem::swap(&mut source, &mut target);
        direction = -direction;
        -angle_q
    } else {
        angle_p
    };

    let v = direction.cross(&source);
    let v_norm = v.norm();
    if v_norm <= T::distance_epsilon() {
        return None;
    }
    let v = v / v_norm;
    let w = source.cross(&v);

    Some(PairFeatures {
        alpha: w.dot(&target).atan2(source.dot(&target)),
        phi: v.dot(&target),
        theta,
    })
}

/// Bin `value` into one of `HISTOGRAM_NUM_BINS` equal bins over `[min, max]`
pub fn bin_index<T: Real>(value: T, min: T, max: T) -> usize {
    let ratio = (value - min) / (max - min) * T::from_count(HISTOGRAM_NUM_BINS);
    let ratio = ratio.as_f64();
    if !(ratio > 0.0) {
        return 0;
    }
    (ratio.floor() as usize).min(HISTOGRAM_NUM_BINS - 1)
}

impl<T: Real> PairFeatures<T> {
    /// Bin of each invariant, in `alpha, phi, theta` order
    pub fn bins(&self) -> [usize; 3] {
        let one = T::one();
        [
            bin_index(self.alpha, -T::pi(), T::pi()),
            bin_index(self.phi, -one, one),
            bin_index(self.theta, -one, one),
        ]
    }
}
