use thiserror::Error;

/// A normalized collocation mesh.
///
/// The mesh is a strictly increasing sequence of fractions in `[0, 1]` with
/// first element `0` and last element `1`. It is denormalized by the initial
/// and final time of a solve. A mesh is replaced wholesale, never edited.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serde-derive",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "Vec<f64>", into = "Vec<f64>")
)]
pub struct Mesh(Vec<f64>);

/// Errors that can occur when constructing a [`Mesh`].
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MeshError {
    #[error("mesh needs at least 2 points, got {count}")]
    TooFewPoints { count: usize },

    #[error("mesh point {index} is not finite")]
    NonFinite { index: usize },

    #[error("mesh must span [0, 1], got [{first}, {last}]")]
    Span { first: f64, last: f64 },

    #[error("mesh points must be strictly increasing, violated at index {index}")]
    NotIncreasing { index: usize },
}

impl Mesh {
    /// Creates a mesh from explicit normalized points.
    ///
    /// # Errors
    ///
    /// Returns an error if there are fewer than two points, a point is not
    /// finite, the points do not start at 0 and end at 1, or they are not
    /// strictly increasing.
    pub fn new(points: Vec<f64>) -> Result<Self, MeshError> {
        if points.len() < 2 {
            return Err(MeshError::TooFewPoints {
                count: points.len(),
            });
        }
        if let Some(index) = points.iter().position(|p| !p.is_finite()) {
            return Err(MeshError::NonFinite { index });
        }

        let first = points[0];
        let last = points[points.len() - 1];
        if first != 0.0 || last != 1.0 {
            return Err(MeshError::Span { first, last });
        }

        if let Some(index) = points.windows(2).position(|w| w[1] <= w[0]) {
            return Err(MeshError::NotIncreasing { index: index + 1 });
        }

        Ok(Self(points))
    }

    /// Creates a uniform mesh of `num_points` points at fractions `i / (n - 1)`.
    ///
    /// # Errors
    ///
    /// Returns an error if `num_points < 2`.
    pub fn uniform(num_points: usize) -> Result<Self, MeshError> {
        if num_points < 2 {
            return Err(MeshError::TooFewPoints { count: num_points });
        }
        #[allow(clippy::cast_precision_loss)]
        let last = (num_points - 1) as f64;
        #[allow(clippy::cast_precision_loss)]
        let points = (0..num_points).map(|i| i as f64 / last).collect();
        Ok(Self(points))
    }

    /// Returns the normalized mesh points.
    #[must_use]
    pub fn points(&self) -> &[f64] {
        &self.0
    }

    #[must_use]
    pub fn num_points(&self) -> usize {
        self.0.len()
    }

    #[must_use]
    pub fn num_intervals(&self) -> usize {
        self.0.len() - 1
    }

    /// Iterates over `(start, end)` pairs of each mesh interval.
    pub fn intervals(&self) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.0.windows(2).map(|w| (w[0], w[1]))
    }
}

impl TryFrom<Vec<f64>> for Mesh {
    type Error = MeshError;

    fn try_from(points: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(points)
    }
}

impl From<Mesh> for Vec<f64> {
    fn from(mesh: Mesh) -> Self {
        mesh.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;

    #[test]
    fn uniform_mesh_has_requested_points() {
        for n in 2..20 {
            let mesh = Mesh::uniform(n).unwrap();
            let points = mesh.points();

            assert_eq!(points.len(), n);
            assert_eq!(points[0], 0.0);
            assert_eq!(points[n - 1], 1.0);
            assert!(points.windows(2).all(|w| w[0] < w[1]));
        }
    }

    #[test]
    fn uniform_mesh_needs_two_points() {
        assert_eq!(
            Mesh::uniform(1),
            Err(MeshError::TooFewPoints { count: 1 })
        );
        assert_eq!(
            Mesh::uniform(0),
            Err(MeshError::TooFewPoints { count: 0 })
        );
    }

    #[test]
    fn explicit_mesh_validation() {
        assert!(Mesh::new(vec![0.0, 0.25, 1.0]).is_ok());
        assert_eq!(
            Mesh::new(vec![0.1, 1.0]),
            Err(MeshError::Span {
                first: 0.1,
                last: 1.0
            })
        );
        assert_eq!(
            Mesh::new(vec![0.0, 0.5, 0.5, 1.0]),
            Err(MeshError::NotIncreasing { index: 2 })
        );
        assert_eq!(
            Mesh::new(vec![0.0, f64::NAN, 1.0]),
            Err(MeshError::NonFinite { index: 1 })
        );
    }

    #[test]
    fn intervals_cover_unit_span() {
        let mesh = Mesh::new(vec![0.0, 0.2, 0.7, 1.0]).unwrap();
        let total: f64 = mesh.intervals().map(|(a, b)| b - a).sum();

        assert_eq!(mesh.num_intervals(), 3);
        assert_relative_eq!(total, 1.0);
    }
}
