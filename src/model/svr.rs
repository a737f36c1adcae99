//! Epsilon support vector regression.
//!
//! Solves the dual
//!
//! ```text
//! min_β  ½ βᵀ(K + 1)β − yᵀβ + ε‖β‖₁    subject to  |βᵢ| ≤ C
//! ```
//!
//! by cyclic coordinate descent. The bias term is absorbed into the kernel
//! (`K + 1`), which removes the equality constraint of the classic
//! formulation and keeps every coordinate update closed-form. The fitted model
//! keeps only the support vectors (`βᵢ ≠ 0`).
//!
//! Single-output only; multi-column targets are rejected with
//! [`ModelError::IncompatibleShape`].

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use super::{check_fit_input, check_predict_input, Predictor, Regressor};
use crate::error::ModelError;

/// RBF kernel width selection.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Gamma {
    /// `1 / (n_features * Var(X))`
    Scale,
    /// `1 / n_features`
    Auto,
    Value(f64),
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum Kernel {
    Rbf(Gamma),
    Linear,
}

/// Kernel with its width resolved against the training data.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub enum FittedKernel {
    Rbf { gamma: f64 },
    Linear,
}

impl FittedKernel {
    fn eval(&self, a: ArrayView1<'_, f64>, b: ArrayView1<'_, f64>) -> f64 {
        match *self {
            FittedKernel::Rbf { gamma } => {
                let sq: f64 = a.iter().zip(b.iter()).map(|(u, v)| (u - v).powi(2)).sum();
                (-gamma * sq).exp()
            }
            FittedKernel::Linear => a.dot(&b),
        }
    }
}

/// Unfitted epsilon-SVR.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Svr {
    /// Box constraint on the dual coefficients.
    pub c: f64,
    /// Half-width of the insensitive tube.
    pub epsilon: f64,
    pub kernel: Kernel,
    /// Stop when no coefficient moves more than this in a full sweep.
    pub tol: f64,
    /// Maximum number of full sweeps over the coefficients.
    pub max_iter: usize,
}

impl Default for Svr {
    fn default() -> Self {
        Self {
            c: 1.0,
            epsilon: 0.1,
            kernel: Kernel::Rbf(Gamma::Scale),
            tol: 1e-3,
            max_iter: 1000,
        }
    }
}

impl Svr {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_epsilon(mut self, epsilon: f64) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn with_kernel(mut self, kernel: Kernel) -> Self {
        self.kernel = kernel;
        self
    }

    fn validate(&self) -> Result<(), ModelError> {
        if !(self.c > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "SVR c must be > 0, got {}",
                self.c
            )));
        }
        if !(self.epsilon >= 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "SVR epsilon must be >= 0, got {}",
                self.epsilon
            )));
        }
        if !(self.tol > 0.0) {
            return Err(ModelError::InvalidParameter(format!(
                "SVR tol must be > 0, got {}",
                self.tol
            )));
        }
        if let Kernel::Rbf(Gamma::Value(g)) = self.kernel {
            if !(g > 0.0) {
                return Err(ModelError::InvalidParameter(format!(
                    "SVR gamma must be > 0, got {g}"
                )));
            }
        }
        Ok(())
    }

    fn resolve_kernel(&self, x: ArrayView2<'_, f64>) -> FittedKernel {
        let f = x.ncols() as f64;
        match self.kernel {
            Kernel::Linear => FittedKernel::Linear,
            Kernel::Rbf(Gamma::Auto) => FittedKernel::Rbf { gamma: 1.0 / f },
            Kernel::Rbf(Gamma::Value(gamma)) => FittedKernel::Rbf { gamma },
            Kernel::Rbf(Gamma::Scale) => {
                let var = x.var(0.0);
                let gamma = if var > 0.0 { 1.0 / (f * var) } else { 1.0 };
                FittedKernel::Rbf { gamma }
            }
        }
    }
}

fn soft_threshold(z: f64, t: f64) -> f64 {
    if z > t {
        z - t
    } else if z < -t {
        z + t
    } else {
        0.0
    }
}

impl Regressor for Svr {
    type Fitted = FittedSvr;

    fn fit(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView2<'_, f64>,
    ) -> Result<Self::Fitted, ModelError> {
        check_fit_input(x, y)?;
        if y.ncols() != 1 {
            return Err(ModelError::IncompatibleShape {
                algorithm: "SVR".to_string(),
                n_outputs: y.ncols(),
            });
        }
        self.validate()?;

        let n = x.nrows();
        let kernel = self.resolve_kernel(x);
        let target = y.column(0);

        let mut q = Array2::<f64>::zeros((n, n));
        for i in 0..n {
            for j in i..n {
                let v = kernel.eval(x.row(i), x.row(j)) + 1.0;
                q[[i, j]] = v;
                q[[j, i]] = v;
            }
        }

        let mut beta = Array1::<f64>::zeros(n);
        let mut q_beta = Array1::<f64>::zeros(n);
        let mut converged = false;
        let mut sweeps = 0;
        while sweeps < self.max_iter {
            sweeps += 1;
            let mut max_delta = 0.0f64;
            for i in 0..n {
                let qii = q[[i, i]];
                if qii <= 0.0 {
                    continue;
                }
                let grad = q_beta[i] - target[i];
                let z = beta[i] - grad / qii;
                let next = soft_threshold(z, self.epsilon / qii).clamp(-self.c, self.c);
                let delta = next - beta[i];
                if delta != 0.0 {
                    beta[i] = next;
                    q_beta.scaled_add(delta, &q.row(i));
                    max_delta = max_delta.max(delta.abs());
                }
            }
            if max_delta < self.tol {
                converged = true;
                break;
            }
        }
        if converged {
            debug!(sweeps, "SVR converged");
        } else {
            warn!(
                max_iter = self.max_iter,
                "SVR reached max_iter without converging"
            );
        }

        let support: Vec<usize> = (0..n).filter(|&i| beta[i] != 0.0).collect();
        Ok(FittedSvr {
            kernel,
            support_vectors: x.select(Axis(0), &support),
            dual_coef: beta.select(Axis(0), &support),
            n_features: x.ncols(),
        })
    }

    fn supports_multi_output(&self) -> bool {
        false
    }
}

/// Fitted SVR: `f(x) = Σ βⱼ (k(svⱼ, x) + 1)`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FittedSvr {
    kernel: FittedKernel,
    support_vectors: Array2<f64>,
    dual_coef: Array1<f64>,
    n_features: usize,
}

impl FittedSvr {
    pub fn n_support(&self) -> usize {
        self.dual_coef.len()
    }

    pub fn kernel(&self) -> FittedKernel {
        self.kernel
    }
}

impl Predictor for FittedSvr {
    fn predict(&self, x: ArrayView2<'_, f64>) -> Result<Array2<f64>, ModelError> {
        check_predict_input(x, self.n_features)?;
        let mut out = Array2::<f64>::zeros((x.nrows(), 1));
        for (i, row) in x.outer_iter().enumerate() {
            out[[i, 0]] = self
                .support_vectors
                .outer_iter()
                .zip(self.dual_coef.iter())
                .map(|(sv, &b)| b * (self.kernel.eval(sv, row) + 1.0))
                .sum();
        }
        Ok(out)
    }

    fn n_features_in(&self) -> usize {
        self.n_features
    }

    fn n_outputs(&self) -> usize {
        1
    }
}
