use nalgebra::{DMatrix, DVector};

use crate::error::Error;

/// Back-end for the square linear systems assembled at each timestep.
///
/// Implementations must be pure: the same coefficients and right-hand side always give the
/// same solution.
pub trait LinearSolver {
    fn solve(&self, coefficients: DMatrix<f64>, rhs: DVector<f64>) -> Result<DVector<f64>, Error>;
}

/// Dense LU decomposition with partial pivoting.
#[derive(Copy, Clone, Debug, Default)]
pub struct LuSolver;

impl LinearSolver for LuSolver {
    fn solve(&self, coefficients: DMatrix<f64>, rhs: DVector<f64>) -> Result<DVector<f64>, Error> {
        if !coefficients.is_square() || coefficients.nrows() != rhs.len() {
            return Err(Error::divergence(
                None,
                format!(
                    "system shape {}x{} does not match right-hand side of length {}",
                    coefficients.nrows(),
                    coefficients.ncols(),
                    rhs.len()
                ),
            ));
        }

        let solution = coefficients
            .lu()
            .solve(&rhs)
            .ok_or_else(|| Error::divergence(None, "singular matrix"))?;

        if let Some((i, value)) = solution.iter().enumerate().find(|(_, x)| !x.is_finite()) {
            return Err(Error::divergence(
                None,
                format!("non-finite solution component {i}: {value}"),
            ));
        }

        Ok(solution)
    }
}
