use rand::Rng;

use super::{ConfigError, layout::Layout};

/// A deterministic point inside every variable's bounds.
pub(super) fn from_bounds(layout: &Layout) -> Vec<f64> {
    layout
        .variable_bounds
        .iter()
        .map(colloc_core::Bounds::midpoint_guess)
        .collect()
}

/// A point drawn uniformly from every variable's bounds.
///
/// Fails on the first variable with an infinite bound.
pub(super) fn random_within_bounds<R: Rng>(
    layout: &Layout,
    rng: &mut R,
) -> Result<Vec<f64>, ConfigError> {
    layout
        .variable_bounds
        .iter()
        .enumerate()
        .map(|(j, bounds)| {
            if bounds.is_finite() {
                // `upper - lower` overflows for ranges wider than `f64::MAX`.
                let t: f64 = rng.gen_range(0.0..=1.0);
                Ok(bounds.clamp(bounds.lower() * (1.0 - t) + bounds.upper() * t))
            } else {
                Err(ConfigError::InfiniteBounds {
                    variable: layout.variable_name(j).to_owned(),
                })
            }
        })
        .collect()
}
