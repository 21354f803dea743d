//! Linear time-invariant state-space models
//!
//! A [`StateSpace`] owns the four system matrices, an optional sample
//! interval (`None` marks a continuous-time system) and the three named
//! partitions of its ports. External solvers build these from a
//! linearisation; the composition operators in [`crate::compose`] combine
//! them; the analysis operations here evaluate or transform them.
//!
//! Matrices are held as [`SysMatrix`], so every operation behaves
//! identically for dense and compressed-column storage.

use nalgebra::Complex;
use rand::Rng;

use crate::error::{LtiError, LtiResult};
use crate::math::{lu_solve_complex, to_complex, CMat, Mat, SysMatrix};
use crate::variables::{LinearVector, VariableRole};

/// Which side of the system a static gain is composed onto
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GainSide {
    /// Pre-compose: the gain maps new inputs onto the current input port
    Input,
    /// Post-compose: the gain maps the current output port onto new outputs
    Output,
}

/// A static (state-less) linear map with named ports
///
/// Used as an algebraic operand for [`StateSpace::add_gain`].
#[derive(Debug, Clone)]
pub struct Gain {
    k: SysMatrix,
    input_variables: LinearVector,
    output_variables: LinearVector,
}

impl Gain {
    /// Wrap a matrix with single-variable port partitions ("u", "y")
    pub fn new(k: impl Into<SysMatrix>) -> Self {
        let k = k.into();
        let input_variables = LinearVector::single(VariableRole::Input, "u", k.ncols());
        let output_variables = LinearVector::single(VariableRole::Output, "y", k.nrows());
        Self {
            k,
            input_variables,
            output_variables,
        }
    }

    /// Wrap a matrix with explicit port partitions
    pub fn with_variables(
        k: impl Into<SysMatrix>,
        input_variables: LinearVector,
        output_variables: LinearVector,
    ) -> LtiResult<Self> {
        let k = k.into();
        if input_variables.size() != k.ncols() || output_variables.size() != k.nrows() {
            return Err(LtiError::shape(
                "Gain variables",
                (output_variables.size(), input_variables.size()),
                k.shape(),
            ));
        }
        Ok(Self {
            k,
            input_variables,
            output_variables,
        })
    }

    pub fn matrix(&self) -> &SysMatrix {
        &self.k
    }

    pub fn inputs(&self) -> usize {
        self.k.ncols()
    }

    pub fn outputs(&self) -> usize {
        self.k.nrows()
    }

    pub fn input_variables(&self) -> &LinearVector {
        &self.input_variables
    }

    pub fn output_variables(&self) -> &LinearVector {
        &self.output_variables
    }
}

/// LTI system `x' = A x + B u`, `y = C x + D u`
///
/// Discrete systems advance `x(n+1) = A x(n) + B u(n)` with sample
/// interval `dt`.
#[derive(Debug, Clone)]
pub struct StateSpace {
    a: SysMatrix,
    b: SysMatrix,
    c: SysMatrix,
    d: SysMatrix,
    dt: Option<f64>,
    input_variables: LinearVector,
    state_variables: LinearVector,
    output_variables: LinearVector,
}

impl StateSpace {
    /// Build a system from its four matrices
    ///
    /// Shapes are validated (`A` square, `B` rows = states, `C` columns =
    /// states, `D` = outputs x inputs). Ports default to single variables
    /// named "u", "x" and "y"; callers with richer partitions install them
    /// through the `set_*_variables` methods.
    pub fn new(
        a: impl Into<SysMatrix>,
        b: impl Into<SysMatrix>,
        c: impl Into<SysMatrix>,
        d: impl Into<SysMatrix>,
        dt: Option<f64>,
    ) -> LtiResult<Self> {
        let (a, b, c, d) = (a.into(), b.into(), c.into(), d.into());
        let nx = a.nrows();
        if a.ncols() != nx {
            return Err(LtiError::shape("A matrix", (nx, nx), a.shape()));
        }
        if b.nrows() != nx {
            return Err(LtiError::shape("B matrix", (nx, b.ncols()), b.shape()));
        }
        if c.ncols() != nx {
            return Err(LtiError::shape("C matrix", (c.nrows(), nx), c.shape()));
        }
        if d.shape() != (c.nrows(), b.ncols()) {
            return Err(LtiError::shape("D matrix", (c.nrows(), b.ncols()), d.shape()));
        }
        if let Some(dt) = dt {
            if dt <= 0.0 {
                return Err(LtiError::InvalidInput(format!(
                    "sample interval must be positive, got {dt}"
                )));
            }
        }
        let input_variables = LinearVector::single(VariableRole::Input, "u", b.ncols());
        let state_variables = LinearVector::single(VariableRole::State, "x", nx);
        let output_variables = LinearVector::single(VariableRole::Output, "y", c.nrows());
        Ok(Self {
            a,
            b,
            c,
            d,
            dt,
            input_variables,
            state_variables,
            output_variables,
        })
    }

    // ========================
    // Accessors
    // ========================

    /// The four system matrices, storage-agnostic
    pub fn get_mats(&self) -> (&SysMatrix, &SysMatrix, &SysMatrix, &SysMatrix) {
        (&self.a, &self.b, &self.c, &self.d)
    }

    pub fn a(&self) -> &SysMatrix {
        &self.a
    }

    pub fn b(&self) -> &SysMatrix {
        &self.b
    }

    pub fn c(&self) -> &SysMatrix {
        &self.c
    }

    pub fn d(&self) -> &SysMatrix {
        &self.d
    }

    /// Number of scalar inputs
    pub fn inputs(&self) -> usize {
        self.b.ncols()
    }

    /// Number of states
    pub fn states(&self) -> usize {
        self.a.nrows()
    }

    /// Number of scalar outputs
    pub fn outputs(&self) -> usize {
        self.c.nrows()
    }

    /// Sample interval; `None` for a continuous-time system
    pub fn dt(&self) -> Option<f64> {
        self.dt
    }

    pub fn is_discrete(&self) -> bool {
        self.dt.is_some()
    }

    pub fn input_variables(&self) -> &LinearVector {
        &self.input_variables
    }

    pub fn state_variables(&self) -> &LinearVector {
        &self.state_variables
    }

    pub fn output_variables(&self) -> &LinearVector {
        &self.output_variables
    }

    /// Install a named input partition; total width must equal `B` columns
    pub fn set_input_variables(&mut self, vars: LinearVector) -> LtiResult<()> {
        Self::check_partition(&vars, VariableRole::Input, self.inputs(), "input")?;
        self.input_variables = vars;
        Ok(())
    }

    /// Install a named state partition; total width must equal the state count
    pub fn set_state_variables(&mut self, vars: LinearVector) -> LtiResult<()> {
        Self::check_partition(&vars, VariableRole::State, self.states(), "state")?;
        self.state_variables = vars;
        Ok(())
    }

    /// Install a named output partition; total width must equal `C` rows
    pub fn set_output_variables(&mut self, vars: LinearVector) -> LtiResult<()> {
        Self::check_partition(&vars, VariableRole::Output, self.outputs(), "output")?;
        self.output_variables = vars;
        Ok(())
    }

    fn check_partition(
        vars: &LinearVector,
        role: VariableRole,
        expected: usize,
        port: &str,
    ) -> LtiResult<()> {
        if vars.role() != role {
            return Err(LtiError::InvalidInput(format!(
                "{port} partition has role {:?}",
                vars.role()
            )));
        }
        if vars.size() != expected {
            return Err(LtiError::DimensionMismatch {
                context: format!("{port} partition"),
                expected: expected.to_string(),
                found: vars.size().to_string(),
            });
        }
        Ok(())
    }

    // ========================
    // In-place transforms
    // ========================

    /// Rescale inputs, outputs and states, in place
    ///
    /// `B`/`D` columns are multiplied by `input_scale`, `C`/`D` rows by
    /// `output_scale`. The state scaling is a diagonal similarity
    /// transform: row `i` of `A`, `B` is divided and column `i` of `A`,
    /// `C` multiplied by `state_scale[i]`, consistent with a change of
    /// state-variable units.
    pub fn scale(
        &mut self,
        input_scale: &[f64],
        output_scale: &[f64],
        state_scale: &[f64],
    ) -> LtiResult<()> {
        if input_scale.len() != self.inputs()
            || output_scale.len() != self.outputs()
            || state_scale.len() != self.states()
        {
            return Err(LtiError::InvalidInput(format!(
                "scale vector lengths ({}, {}, {}) do not match system ({}, {}, {})",
                input_scale.len(),
                output_scale.len(),
                state_scale.len(),
                self.inputs(),
                self.outputs(),
                self.states()
            )));
        }
        if state_scale.iter().any(|&s| s == 0.0) {
            return Err(LtiError::InvalidInput(
                "state scale must be non-zero".to_string(),
            ));
        }
        let state_inv: Vec<f64> = state_scale.iter().map(|s| 1.0 / s).collect();

        self.b.scale_cols(input_scale);
        self.d.scale_cols(input_scale);
        self.c.scale_rows(output_scale);
        self.d.scale_rows(output_scale);
        self.a.scale_rows(&state_inv);
        self.a.scale_cols(state_scale);
        self.b.scale_rows(&state_inv);
        self.c.scale_cols(state_scale);
        Ok(())
    }

    /// Copying variant of [`scale`](Self::scale)
    pub fn scaled(
        &self,
        input_scale: &[f64],
        output_scale: &[f64],
        state_scale: &[f64],
    ) -> LtiResult<StateSpace> {
        let mut out = self.clone();
        out.scale(input_scale, output_scale, state_scale)?;
        Ok(out)
    }

    /// Compose a static gain onto one side of the system, in place
    ///
    /// `GainSide::Input`: `B <- B K`, `D <- D K`, the gain's input
    /// partition becomes the system's. `GainSide::Output`: `C <- K C`,
    /// `D <- K D`, the gain's output partition becomes the system's.
    pub fn add_gain(&mut self, gain: &Gain, side: GainSide) -> LtiResult<()> {
        match side {
            GainSide::Input => {
                if gain.outputs() != self.inputs() {
                    return Err(LtiError::DimensionMismatch {
                        context: "add_gain at input".to_string(),
                        expected: format!("{} gain rows", self.inputs()),
                        found: format!("{}", gain.outputs()),
                    });
                }
                self.b = self.b.dot(gain.matrix());
                self.d = self.d.dot(gain.matrix());
                self.input_variables = gain.input_variables().transform(VariableRole::Input);
            }
            GainSide::Output => {
                if gain.inputs() != self.outputs() {
                    return Err(LtiError::DimensionMismatch {
                        context: "add_gain at output".to_string(),
                        expected: format!("{} gain columns", self.outputs()),
                        found: format!("{}", gain.inputs()),
                    });
                }
                self.c = gain.matrix().dot(&self.c);
                self.d = gain.matrix().dot(&self.d);
                self.output_variables = gain.output_variables().transform(VariableRole::Output);
            }
        }
        Ok(())
    }

    /// Drop the named input variables, trimming `B`/`D` columns, in place
    ///
    /// Surviving variables keep their relative order and sizes; the input
    /// partition is re-indexed to stay contiguous.
    pub fn remove_inputs(&mut self, names: &[&str]) -> LtiResult<()> {
        let trimmed = self.input_variables.remove(names)?;
        let kept: Vec<usize> = self
            .input_variables
            .iter()
            .filter(|v| !names.contains(&v.name()))
            .flat_map(|v| v.rows_loc())
            .collect();
        self.b = self.b.select_cols(&kept);
        self.d = self.d.select_cols(&kept);
        self.input_variables = trimmed;
        Ok(())
    }

    /// Drop the named output variables, trimming `C`/`D` rows, in place
    pub fn remove_outputs(&mut self, names: &[&str]) -> LtiResult<()> {
        let trimmed = self.output_variables.remove(names)?;
        let kept: Vec<usize> = self
            .output_variables
            .iter()
            .filter(|v| !names.contains(&v.name()))
            .flat_map(|v| v.rows_loc())
            .collect();
        self.c = self.c.select_rows(&kept);
        self.d = self.d.select_rows(&kept);
        self.output_variables = trimmed;
        Ok(())
    }

    /// Convert a discrete-time realisation to continuous time, in place
    ///
    /// Inverse Tustin (bilinear) transform, which preserves the frequency
    /// response under `z = (2 + dt s) / (2 - dt s)`:
    ///
    /// ```text
    /// Ac = 2/dt (Ad - I)(Ad + I)^-1      Bc = 2/sqrt(dt) (Ad + I)^-1 Bd
    /// Cc = 2/sqrt(dt) Cd (Ad + I)^-1     Dc = Dd - Cd (Ad + I)^-1 Bd
    /// ```
    ///
    /// Best-effort analysis tool: an eigenvalue of `Ad` at -1 makes
    /// `Ad + I` singular and eigenvalues near the unit circle (close to the
    /// Nyquist frequency) degrade the mapping accuracy. The result is
    /// stored densely.
    pub fn disc2cont(&mut self) -> LtiResult<()> {
        let dt = self.dt.ok_or_else(|| {
            LtiError::InvalidInput("disc2cont requires a discrete-time system".to_string())
        })?;
        let n = self.states();
        let ad = self.a.to_dense();
        let bd = self.b.to_dense();
        let cd = self.c.to_dense();
        let dd = self.d.to_dense();

        let eye = Mat::identity(n, n);
        let p = &ad + &eye;
        let p_norm = p.abs().column_sum().max();
        let p_inv = crate::math::lu_solve(p, &eye, "disc2cont")?;
        let p_inv_norm = p_inv.abs().column_sum().max();
        if p_norm * p_inv_norm > 1e8 {
            log::warn!(
                "disc2cont: (A + I) is ill-conditioned (est. cond {:.1e}); \
                 eigenvalues near z = -1 make the bilinear transform inaccurate",
                p_norm * p_inv_norm
            );
        }

        let sqrt_dt = dt.sqrt();
        let ac = (&ad - &eye) * &p_inv * (2.0 / dt);
        let bc = &p_inv * &bd * (2.0 / sqrt_dt);
        let cc = &cd * &p_inv * (2.0 / sqrt_dt);
        let dc = &dd - &cd * &p_inv * &bd;

        self.a = ac.into();
        self.b = bc.into();
        self.c = cc.into();
        self.d = dc.into();
        self.dt = None;
        Ok(())
    }

    // ========================
    // Frequency-domain evaluation
    // ========================

    /// Transfer function evaluated at the reduced frequencies `kv`
    ///
    /// Continuous systems: `H(jk) = C (jk I - A)^-1 B + D`. Discrete
    /// systems: `H(z) = C (z I - A)^-1 B + D` with `z = exp(j k dt)`.
    /// Returns one complex (outputs x inputs) matrix per frequency point.
    /// Each point factorises `(z I - A)` and solves against `B`; no
    /// explicit inverse is formed. Sparse systems are densified for the
    /// factorisation, which is the one unavoidable densification in the
    /// crate.
    pub fn freqresp(&self, kv: &[f64]) -> LtiResult<Vec<CMat>> {
        let a = to_complex(&self.a.to_dense());
        let b = to_complex(&self.b.to_dense());
        let c = to_complex(&self.c.to_dense());
        let d = to_complex(&self.d.to_dense());
        let eye = CMat::identity(self.states(), self.states());

        let mut out = Vec::with_capacity(kv.len());
        for &k in kv {
            let z = match self.dt {
                Some(dt) => Complex::new(0.0, k * dt).exp(),
                None => Complex::new(0.0, k),
            };
            let m = &eye * z - &a;
            let x = lu_solve_complex(m, &b, "freqresp")?;
            out.push(&c * &x + &d);
        }
        Ok(out)
    }

    /// Steady-state gain `C (I - A)^-1 B + D` (discrete) or
    /// `D - C A^-1 B` (continuous), i.e. the frequency response at `k = 0`
    ///
    /// This is the quantity stability-derivative extraction consumes.
    pub fn dc_gain(&self) -> LtiResult<Mat> {
        let h = self.freqresp(&[0.0])?;
        Ok(h[0].map(|v| v.re))
    }
}

/// Copying variant of [`StateSpace::disc2cont`]
pub fn disc2cont(sys: &StateSpace) -> LtiResult<StateSpace> {
    let mut out = sys.clone();
    out.disc2cont()?;
    Ok(out)
}

/// Check two systems for numerical equivalence
///
/// Densifies and compares `A`, `B`, `C`, `D` entry-wise and requires
/// matching sample intervals; the error names the worst block and its
/// deviation. Storage representation is deliberately ignored.
pub fn compare_ss(s1: &StateSpace, s2: &StateSpace, tol: f64) -> LtiResult<()> {
    let dt_match = match (s1.dt(), s2.dt()) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= 1e-12 * a.abs().max(b.abs()),
        _ => false,
    };
    if !dt_match {
        return Err(LtiError::TimestepMismatch {
            left: s1.dt(),
            right: s2.dt(),
        });
    }
    let pairs = [
        ("A", s1.a(), s2.a()),
        ("B", s1.b(), s2.b()),
        ("C", s1.c(), s2.c()),
        ("D", s1.d(), s2.d()),
    ];
    for (name, x, y) in pairs {
        if x.shape() != y.shape() {
            return Err(LtiError::shape(&format!("{name} matrix"), x.shape(), y.shape()));
        }
        let err = x.max_abs_diff(y);
        if err > tol {
            return Err(LtiError::InvalidInput(format!(
                "{name} matrices differ by {err:.3e} (tolerance {tol:.1e})"
            )));
        }
    }
    Ok(())
}

/// Generate a random system, spectrally normalised
///
/// Entries are uniform in [0, 1); `A` is rescaled to spectral radius
/// 1/1.1 so discrete systems are stable. Continuous systems additionally
/// get their eigenvalues shifted into the left half-plane. Ports carry
/// the default single-variable partitions.
pub fn random_ss(nx: usize, nu: usize, ny: usize, dt: Option<f64>) -> StateSpace {
    let mut rng = rand::thread_rng();
    let mut a = Mat::from_fn(nx, nx, |_, _| rng.gen::<f64>());
    let rho = a
        .complex_eigenvalues()
        .iter()
        .fold(0.0f64, |acc, ev| acc.max(ev.norm()));
    if rho > 0.0 {
        a /= 1.1 * rho;
    }
    if dt.is_none() {
        a -= Mat::identity(nx, nx) * 1.5;
    }
    let b = Mat::from_fn(nx, nu, |_, _| rng.gen::<f64>());
    let c = Mat::from_fn(ny, nx, |_, _| rng.gen::<f64>());
    let d = Mat::from_fn(ny, nu, |_, _| rng.gen::<f64>());
    StateSpace::new(a, b, c, d, dt).expect("random system dimensions are consistent")
}
