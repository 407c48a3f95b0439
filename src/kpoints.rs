use crate::error::{BdgError, Result};
use ndarray::{Array1, Array2, ArrayBase, Axis, Data, Ix1, Ix2};

/// Fractional Monkhorst-Pack style mesh, `k_mesh[i]` points along reciprocal vector `i`,
/// endpoint excluded.
pub fn gen_kmesh(k_mesh: &[usize]) -> Result<Array2<f64>> {
    let dim: usize = k_mesh.len();
    if dim == 0 || k_mesh.iter().any(|&n| n == 0) {
        return Err(BdgError::InvalidGrid(format!(
            "every entry of k_mesh must be >= 1, got {:?}",
            k_mesh
        )));
    }
    let nk: usize = k_mesh.iter().product();
    let mut kvec = Array2::<f64>::zeros((nk, dim));
    for (n, mut row) in kvec.outer_iter_mut().enumerate() {
        // 最后一个方向变化最快
        let mut rest = n;
        for r0 in (0..dim).rev() {
            let i = rest % k_mesh[r0];
            rest /= k_mesh[r0];
            row[r0] = i as f64 / k_mesh[r0] as f64;
        }
    }
    Ok(kvec)
}

/// Maps fractional coordinates onto Cartesian ones, `frac · basis` with the reciprocal vectors
/// stored as rows of `basis`.
pub fn frac_to_cartesian<S, T>(frac: &ArrayBase<S, Ix2>, basis: &ArrayBase<T, Ix2>) -> Result<Array2<f64>>
where
    S: Data<Elem = f64>,
    T: Data<Elem = f64>,
{
    if frac.ncols() != basis.nrows() {
        return Err(BdgError::DimensionMismatch {
            context: "frac_to_cartesian: basis rows".to_string(),
            expected: frac.ncols(),
            found: basis.nrows(),
        });
    }
    Ok(frac.dot(basis))
}

/// Uniform `ncols × nrows` grid on the parallelogram spanned by `corner_1` and `corner_2`
/// starting at `origin`, both endpoints included.
///
/// Points are ordered with the `corner_2` coefficient as the outer index:
/// `origin + i/(nrows-1)·corner_2 + j/(ncols-1)·corner_1`.
pub fn gen_uniform_grid<A, B, C>(
    ncols: usize,
    nrows: usize,
    corner_1: &ArrayBase<A, Ix1>,
    corner_2: &ArrayBase<B, Ix1>,
    origin: &ArrayBase<C, Ix1>,
) -> Result<Array2<f64>>
where
    A: Data<Elem = f64>,
    B: Data<Elem = f64>,
    C: Data<Elem = f64>,
{
    if ncols <= 1 || nrows <= 1 {
        return Err(BdgError::InvalidGrid(
            "Number of columns and rows must be greater than 1.".to_string(),
        ));
    }
    if corner_1.iter().all(|x| *x == 0.0) || corner_2.iter().all(|x| *x == 0.0) {
        return Err(BdgError::InvalidGrid(
            "Vectors to the corners cannot be zero.".to_string(),
        ));
    }
    let dim = origin.len();
    if corner_1.len() != dim || corner_2.len() != dim {
        return Err(BdgError::DimensionMismatch {
            context: "gen_uniform_grid: corner vectors".to_string(),
            expected: dim,
            found: corner_1.len().max(corner_2.len()),
        });
    }
    let mut grid = Array2::<f64>::zeros((ncols * nrows, dim));
    for i in 0..nrows {
        let a = i as f64 / (nrows - 1) as f64;
        for j in 0..ncols {
            let b = j as f64 / (ncols - 1) as f64;
            let row = origin.to_owned() + &(corner_2.to_owned() * a) + &(corner_1.to_owned() * b);
            grid.row_mut(i * ncols + j).assign(&row);
        }
    }
    Ok(grid)
}

/// A path through high-symmetry points, sampled for band plots.
#[derive(Debug, Clone)]
pub struct KPath {
    /// Cartesian k-points along the path.
    pub k_vec: Array2<f64>,
    /// Cumulative distance of every point, starting at 0.
    pub k_dist: Array1<f64>,
    /// Cumulative distance of every node.
    pub k_node: Array1<f64>,
    pub labels: Vec<String>,
}

/// Piecewise linear path through `path` (one Cartesian point per row) with `nk` points in total.
#[allow(non_snake_case)]
pub fn gen_kpath<S: Data<Elem = f64>>(path: &ArrayBase<S, Ix2>, labels: &[&str], nk: usize) -> Result<KPath> {
    let n_node: usize = path.len_of(Axis(0));
    if n_node < 2 {
        return Err(BdgError::InvalidGrid(
            "a k-path needs at least two nodes".to_string(),
        ));
    }
    if labels.len() != n_node {
        return Err(BdgError::DimensionMismatch {
            context: "gen_kpath: labels".to_string(),
            expected: n_node,
            found: labels.len(),
        });
    }
    if nk < n_node {
        return Err(BdgError::InvalidGrid(format!(
            "number of points {} is smaller than the number of nodes {}",
            nk, n_node
        )));
    }
    let dim = path.ncols();
    let mut k_node = Array1::<f64>::zeros(n_node);
    for n in 1..n_node {
        let dk = &path.row(n) - &path.row(n - 1);
        k_node[[n]] = k_node[[n - 1]] + dk.dot(&dk).sqrt();
    }
    let mut node_index: Vec<usize> = vec![0];
    for n in 1..n_node - 1 {
        let frac = k_node[[n]] / k_node[[n_node - 1]];
        node_index.push((frac * (nk - 1) as f64).round() as usize);
    }
    node_index.push(nk - 1);
    let mut k_dist = Array1::<f64>::zeros(nk);
    let mut k_vec = Array2::<f64>::zeros((nk, dim));
    k_vec.row_mut(0).assign(&path.row(0));
    for n in 1..n_node {
        let n_i = node_index[n - 1];
        let n_f = node_index[n];
        let kd_i = k_node[[n - 1]];
        let kd_f = k_node[[n]];
        let k_i = path.row(n - 1);
        let k_f = path.row(n);
        if n_f == n_i {
            continue;
        }
        for j in n_i..n_f + 1 {
            let frac: f64 = ((j - n_i) as f64) / ((n_f - n_i) as f64);
            k_dist[[j]] = kd_i + frac * (kd_f - kd_i);
            k_vec
                .row_mut(j)
                .assign(&(&k_i.to_owned() * (1.0 - frac) + &(&k_f.to_owned() * frac)));
        }
    }
    Ok(KPath {
        k_vec,
        k_dist,
        k_node,
        labels: labels.iter().map(|s| s.to_string()).collect(),
    })
}

/// Rejects grids containing NaN or infinite coordinates.
pub fn check_finite<S: Data<Elem = f64>>(k: &ArrayBase<S, Ix2>) -> Result<()> {
    for (index, row) in k.outer_iter().enumerate() {
        if row.iter().any(|x| !x.is_finite()) {
            return Err(BdgError::InvalidKPoint {
                index,
                k: row.to_owned(),
            });
        }
    }
    Ok(())
}

/// `-k` for every row.
#[inline(always)]
pub fn negate(k: &Array2<f64>) -> Array2<f64> {
    k.mapv(|x| -x)
}

/// `q - k` for every row; `q` must have as many components as `k` has columns.
pub fn shift_minus(k: &Array2<f64>, q: &Array1<f64>) -> Result<Array2<f64>> {
    if q.len() != k.ncols() {
        return Err(BdgError::DimensionMismatch {
            context: "pairing momentum q".to_string(),
            expected: k.ncols(),
            found: q.len(),
        });
    }
    let mut out = negate(k);
    for mut row in out.outer_iter_mut() {
        row += q;
    }
    Ok(out)
}

/// Single k-point as a one-row grid.
#[inline(always)]
pub fn as_grid<S: Data<Elem = f64>>(k: &ArrayBase<S, Ix1>) -> Array2<f64> {
    k.to_owned().insert_axis(Axis(0))
}
