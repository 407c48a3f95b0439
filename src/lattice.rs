//! Two-dimensional lattice geometries: Brillouin-zone corners, reciprocal vectors,
//! high-symmetry points and the k-point grids the solvers run on.
use crate::error::{BdgError, Result};
use crate::kpoints::{KPath, frac_to_cartesian, gen_kmesh, gen_kpath, gen_uniform_grid};
use ndarray::{Array1, Array2, arr1, arr2};
use std::f64::consts::PI;

/// Geometry of a two-dimensional Bravais lattice.
pub trait BaseLattice: Send + Sync {
    fn lattice_constant(&self) -> f64;
    /// Corners of the first Brillouin zone, one per row.
    fn bz_corners(&self) -> Array2<f64>;
    /// Reciprocal lattice vectors $\bm b_1,\bm b_2$ as rows.
    fn reciprocal_basis(&self) -> Array2<f64>;
    /// High-symmetry points with their labels, in path order.
    fn high_symmetry_points(&self) -> Vec<(Array1<f64>, &'static str)>;
    /// The two corners spanning the parallelogram used by [`BaseLattice::generate_bz_grid`].
    fn grid_corners(&self) -> (Array1<f64>, Array1<f64>);

    /// Area of the first Brillouin zone, $|\bm b_1\times\bm b_2|$.
    fn bz_area(&self) -> f64 {
        let b = self.reciprocal_basis();
        (b[[0, 0]] * b[[1, 1]] - b[[0, 1]] * b[[1, 0]]).abs()
    }

    /// Real-space unit-cell area, $(2\pi)^2$ over [`BaseLattice::bz_area`].
    fn cell_area(&self) -> f64 {
        (2.0 * PI).powi(2) / self.bz_area()
    }

    /// Uniform `ncols × nrows` grid spanned by [`BaseLattice::grid_corners`] from Γ.
    fn generate_bz_grid(&self, ncols: usize, nrows: usize) -> Result<Array2<f64>> {
        let (c1, c2) = self.grid_corners();
        gen_uniform_grid(ncols, nrows, &c1, &c2, &Array1::<f64>::zeros(2))
    }

    /// Monkhorst-Pack grid over the reciprocal cell (endpoints excluded), Cartesian.
    fn generate_mp_grid(&self, nk1: usize, nk2: usize) -> Result<Array2<f64>> {
        let frac = gen_kmesh(&[nk1, nk2])?;
        frac_to_cartesian(&frac, &self.reciprocal_basis())
    }

    /// Closed path through the high-symmetry points (back to the first one).
    fn generate_high_symmetry_path(&self, number_of_points: usize) -> Result<KPath> {
        let points = self.high_symmetry_points();
        let n = points.len() + 1;
        let mut path = Array2::<f64>::zeros((n, 2));
        let mut labels = Vec::with_capacity(n);
        for (i, (p, l)) in points.iter().chain(points.iter().take(1)).enumerate() {
            path.row_mut(i).assign(p);
            labels.push(*l);
        }
        gen_kpath(&path, &labels, number_of_points)
    }
}

fn check_lattice_constant(a: f64) -> Result<f64> {
    if !a.is_finite() {
        return Err(BdgError::invalid_parameter(
            "lattice_constant",
            "must not be NaN or Infinity",
        ));
    }
    if a <= 0.0 {
        return Err(BdgError::invalid_parameter("lattice_constant", "must be positive"));
    }
    Ok(a)
}

/// Square lattice with constant `a`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SquareLattice {
    a: f64,
}

impl SquareLattice {
    pub fn new(lattice_constant: f64) -> Result<Self> {
        Ok(SquareLattice {
            a: check_lattice_constant(lattice_constant)?,
        })
    }
    pub fn gamma(&self) -> Array1<f64> {
        arr1(&[0.0, 0.0])
    }
    pub fn x_point(&self) -> Array1<f64> {
        arr1(&[PI / self.a, 0.0])
    }
    pub fn m_point(&self) -> Array1<f64> {
        arr1(&[PI / self.a, PI / self.a])
    }
}

impl BaseLattice for SquareLattice {
    fn lattice_constant(&self) -> f64 {
        self.a
    }
    fn bz_corners(&self) -> Array2<f64> {
        arr2(&[[1.0, 1.0], [-1.0, 1.0], [1.0, -1.0], [-1.0, -1.0]]) * (PI / self.a)
    }
    fn reciprocal_basis(&self) -> Array2<f64> {
        arr2(&[[1.0, 0.0], [0.0, 1.0]]) * (2.0 * PI / self.a)
    }
    fn high_symmetry_points(&self) -> Vec<(Array1<f64>, &'static str)> {
        vec![
            (self.gamma(), "\\Gamma"),
            (self.x_point(), "X"),
            (self.m_point(), "M"),
        ]
    }
    fn grid_corners(&self) -> (Array1<f64>, Array1<f64>) {
        let c = self.bz_corners();
        (c.row(0).to_owned(), c.row(1).to_owned())
    }
}

/// Honeycomb (graphene) lattice; the physical carbon lattice has `a = √3` in units of the
/// nearest-neighbour distance.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GrapheneLattice {
    a: f64,
}

impl Default for GrapheneLattice {
    fn default() -> Self {
        GrapheneLattice { a: 3f64.sqrt() }
    }
}

impl GrapheneLattice {
    pub fn new(lattice_constant: f64) -> Result<Self> {
        Ok(GrapheneLattice {
            a: check_lattice_constant(lattice_constant)?,
        })
    }
    pub fn gamma(&self) -> Array1<f64> {
        arr1(&[0.0, 0.0])
    }
    pub fn m_point(&self) -> Array1<f64> {
        arr1(&[PI / self.a, PI / self.a / 3f64.sqrt()])
    }
    pub fn k_point(&self) -> Array1<f64> {
        arr1(&[4.0 * PI / (3.0 * self.a), 0.0])
    }
}

impl BaseLattice for GrapheneLattice {
    fn lattice_constant(&self) -> f64 {
        self.a
    }
    fn bz_corners(&self) -> Array2<f64> {
        let r = 4.0 * PI / (3.0 * self.a);
        let mut corners = Array2::<f64>::zeros((6, 2));
        for (row, i) in [1.0f64, 3.0, 5.0, 7.0, 9.0, 11.0].iter().enumerate() {
            let phi = i * PI / 6.0;
            corners[[row, 0]] = r * phi.sin();
            corners[[row, 1]] = r * phi.cos();
        }
        corners
    }
    fn reciprocal_basis(&self) -> Array2<f64> {
        // a1 = a(1, 0), a2 = a(1/2, √3/2)
        let g = 2.0 * PI / self.a;
        arr2(&[[g, -g / 3f64.sqrt()], [0.0, 2.0 * g / 3f64.sqrt()]])
    }
    fn high_symmetry_points(&self) -> Vec<(Array1<f64>, &'static str)> {
        vec![
            (self.m_point(), "M"),
            (self.gamma(), "\\Gamma"),
            (self.k_point(), "K"),
        ]
    }
    fn grid_corners(&self) -> (Array1<f64>, Array1<f64>) {
        let c = self.bz_corners();
        (c.row(1).to_owned(), c.row(5).to_owned())
    }
}

/// Arbitrary two-dimensional Bravais lattice given by its real-space vectors (rows).
///
/// The zone is represented by the reciprocal parallelogram centred at Γ.
#[derive(Debug, Clone, PartialEq)]
pub struct BravaisLattice {
    vectors: Array2<f64>,
}

impl BravaisLattice {
    pub fn new(vectors: [[f64; 2]; 2]) -> Result<Self> {
        let [a1, a2] = vectors;
        let det = a1[0] * a2[1] - a1[1] * a2[0];
        if !det.is_finite() || det.abs() < 1e-12 {
            return Err(BdgError::invalid_parameter(
                "lattice_vectors",
                "must be finite and linearly independent",
            ));
        }
        Ok(BravaisLattice {
            vectors: arr2(&vectors),
        })
    }
    pub fn vectors(&self) -> &Array2<f64> {
        &self.vectors
    }
}

impl BaseLattice for BravaisLattice {
    fn lattice_constant(&self) -> f64 {
        self.vectors.row(0).dot(&self.vectors.row(0)).sqrt()
    }
    fn bz_corners(&self) -> Array2<f64> {
        let b = self.reciprocal_basis();
        let (b1, b2) = (b.row(0), b.row(1));
        let mut corners = Array2::<f64>::zeros((4, 2));
        for (row, (s1, s2)) in [(1.0, 1.0), (-1.0, 1.0), (-1.0, -1.0), (1.0, -1.0)]
            .iter()
            .enumerate()
        {
            corners
                .row_mut(row)
                .assign(&((&b1 * (*s1 * 0.5)) + &(&b2 * (*s2 * 0.5))));
        }
        corners
    }
    fn reciprocal_basis(&self) -> Array2<f64> {
        // b = 2π (A^{-1})^T
        let a = &self.vectors;
        let det = a[[0, 0]] * a[[1, 1]] - a[[0, 1]] * a[[1, 0]];
        arr2(&[[a[[1, 1]], -a[[1, 0]]], [-a[[0, 1]], a[[0, 0]]]]) * (2.0 * PI / det)
    }
    fn high_symmetry_points(&self) -> Vec<(Array1<f64>, &'static str)> {
        let b = self.reciprocal_basis();
        vec![
            (arr1(&[0.0, 0.0]), "\\Gamma"),
            (b.row(0).to_owned() * 0.5, "X"),
            ((&b.row(0) + &b.row(1)) * 0.5, "M"),
        ]
    }
    fn grid_corners(&self) -> (Array1<f64>, Array1<f64>) {
        let b = self.reciprocal_basis();
        (b.row(0).to_owned(), b.row(1).to_owned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bz_area() {
        let sq = SquareLattice::new(1.0).unwrap();
        assert!((sq.bz_area() - 4.0 * PI * PI).abs() < 1e-12);
        let gr = GrapheneLattice::default();
        // hexagon of circumradius |K|
        let k = 4.0 * PI / (3.0 * gr.lattice_constant());
        assert!((gr.bz_area() - 1.5 * 3f64.sqrt() * k * k).abs() < 1e-10);
    }

    #[test]
    fn test_graphene_k_on_bz_corner() {
        let gr = GrapheneLattice::default();
        let corners = gr.bz_corners();
        let k = gr.k_point();
        let found = corners
            .outer_iter()
            .any(|c| ((c[0] - k[0]).powi(2) + (c[1] - k[1]).powi(2)).sqrt() < 1e-12);
        assert!(found);
    }

    #[test]
    fn test_grid_sizes() {
        let gr = GrapheneLattice::default();
        let grid = gr.generate_bz_grid(10, 12).unwrap();
        assert_eq!(grid.shape(), &[120, 2]);
        let sq = SquareLattice::new(2.0).unwrap();
        let mp = sq.generate_mp_grid(4, 4).unwrap();
        assert_eq!(mp.shape(), &[16, 2]);
        assert!((mp[[1, 1]] - PI / 4.0).abs() < 1e-12);
    }

    #[test]
    fn test_high_symmetry_path_labels() {
        let gr = GrapheneLattice::default();
        let path = gr.generate_high_symmetry_path(1000).unwrap();
        assert_eq!(path.labels, vec!["M", "\\Gamma", "K", "M"]);
        assert_eq!(path.k_node[0], 0.0);
        assert_eq!(path.k_dist[0], 0.0);
        assert_eq!(path.k_vec.nrows(), 1000);
    }

    #[test]
    fn test_invalid_lattice_constant() {
        assert!(matches!(
            SquareLattice::new(0.0),
            Err(BdgError::InvalidParameter { .. })
        ));
        assert!(GrapheneLattice::new(f64::NAN).is_err());
    }
    #[test]
    fn test_bravais_reciprocal_basis() {
        let lat = BravaisLattice::new([[2.0, 0.0], [1.0, 3.0]]).unwrap();
        let b = lat.reciprocal_basis();
        let a = lat.vectors();
        let ab = a.dot(&b.t());
        for i in 0..2 {
            for j in 0..2 {
                let expected = if i == j { 2.0 * PI } else { 0.0 };
                assert!((ab[[i, j]] - expected).abs() < 1e-12);
            }
        }
        assert!((lat.bz_area() - 4.0 * PI * PI / 6.0).abs() < 1e-12);
        assert!(BravaisLattice::new([[1.0, 0.0], [2.0, 0.0]]).is_err());
    }
}
