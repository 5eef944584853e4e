use std::{fmt, str::FromStr};

use colloc_core::Mesh;

/// A collocation family.
///
/// The scheme fixes which grid points carry decision variables, the defect
/// equations that tie neighbouring points together, and the quadrature
/// used for the integral cost.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scheme {
    /// One grid point per mesh point; trapezoidal defects and quadrature.
    Trapezoidal,

    /// Mesh points plus interval midpoints; Hermite interpolation and
    /// Simpson defects, Simpson quadrature.
    #[default]
    HermiteSimpson,
}

impl Scheme {
    /// Returns the name the scheme is selected by.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Trapezoidal => "trapezoidal",
            Self::HermiteSimpson => "hermite-simpson",
        }
    }

    /// Returns `true` if the scheme places a grid point inside each interval.
    #[must_use]
    pub fn has_midpoints(&self) -> bool {
        matches!(self, Self::HermiteSimpson)
    }

    /// Number of grid points for a mesh with `num_mesh_points` points.
    #[must_use]
    pub fn num_points(&self, num_mesh_points: usize) -> usize {
        match self {
            Self::Trapezoidal => num_mesh_points,
            Self::HermiteSimpson => 2 * num_mesh_points - 1,
        }
    }

    /// Grid index of mesh point `i`.
    #[must_use]
    pub fn mesh_index(&self, i: usize) -> usize {
        match self {
            Self::Trapezoidal => i,
            Self::HermiteSimpson => 2 * i,
        }
    }

    /// Normalized times of every grid point.
    #[must_use]
    pub fn grid(&self, mesh: &Mesh) -> Vec<f64> {
        match self {
            Self::Trapezoidal => mesh.points().to_vec(),
            Self::HermiteSimpson => {
                let mut grid = Vec::with_capacity(self.num_points(mesh.num_points()));
                grid.push(0.0);
                for (start, end) in mesh.intervals() {
                    grid.push(0.5 * (start + end));
                    grid.push(end);
                }
                grid
            }
        }
    }

    /// Quadrature weights over the normalized grid.
    ///
    /// The weights sum to one; scaling by the horizon length gives the
    /// integral over time.
    #[must_use]
    pub fn quadrature_weights(&self, mesh: &Mesh) -> Vec<f64> {
        let mut weights = vec![0.0; self.num_points(mesh.num_points())];
        for (i, (start, end)) in mesh.intervals().enumerate() {
            let h = end - start;
            let left = self.mesh_index(i);
            match self {
                Self::Trapezoidal => {
                    weights[left] += 0.5 * h;
                    weights[left + 1] += 0.5 * h;
                }
                Self::HermiteSimpson => {
                    weights[left] += h / 6.0;
                    weights[left + 1] += 4.0 * h / 6.0;
                    weights[left + 2] += h / 6.0;
                }
            }
        }
        weights
    }
}

impl fmt::Display for Scheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Scheme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "trapezoidal" => Ok(Self::Trapezoidal),
            "hermite-simpson" => Ok(Self::HermiteSimpson),
            other => Err(other.to_owned()),
        }
    }
}
