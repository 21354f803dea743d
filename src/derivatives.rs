//! Steady-state stability-derivative extraction
//!
//! Consumes an assembled aeroelastic state-space model whose ports follow
//! the usual linearisation naming (a rigid-body velocity input, an optional
//! control-surface deflection input, an aerodynamic force output), evaluates
//! the transfer function at zero frequency and non-dimensionalises the
//! resulting force/moment gains into stability-derivative coefficients.
//!
//! Channels are addressed strictly by variable name; the control-surface
//! channel is optional and its absence is detected through the
//! [`LtiError::VariableNotFound`] lookup error rather than a pre-check.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{LtiError, LtiResult};
use crate::math::Mat;
use crate::statespace::StateSpace;

/// Reference flight condition and geometry for non-dimensionalisation
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ReferenceGeometry {
    /// Free-stream reference velocity
    pub u_inf: f64,
    /// Reference planform area
    pub s_ref: f64,
    /// Reference span
    pub b_ref: f64,
    /// Reference chord
    pub c_ref: f64,
    /// Free-stream density
    pub rho: f64,
}

impl Default for ReferenceGeometry {
    fn default() -> Self {
        Self {
            u_inf: 1.0,
            s_ref: 1.0,
            b_ref: 1.0,
            c_ref: 1.0,
            rho: 1.225,
        }
    }
}

/// Dimensionalising coefficients derived from the reference geometry
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Coefficients {
    pub force: f64,
    pub moment_lon: f64,
    pub moment_lat: f64,
    pub force_angular_vel: f64,
    pub moment_lon_angular_vel: f64,
}

impl ReferenceGeometry {
    pub fn coefficients(&self) -> Coefficients {
        let q = 0.5 * self.rho * self.u_inf * self.u_inf * self.s_ref;
        Coefficients {
            force: q,
            moment_lon: q * self.c_ref,
            moment_lat: q * self.b_ref,
            force_angular_vel: q * self.c_ref / self.u_inf,
            moment_lon_angular_vel: q * self.c_ref * self.c_ref / self.u_inf,
        }
    }
}

/// Configuration for [`StabilityDerivatives`]
///
/// The channel names default to the linearisation pipeline's conventions.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DerivativeConfig {
    pub geometry: ReferenceGeometry,
    /// Name of the rigid-body velocity input variable (six channels used)
    pub velocity_input: String,
    /// Name of the optional control-surface deflection input variable
    pub control_surface_input: String,
    /// Name of the force/moment output variable (six channels used)
    pub force_output: String,
}

impl Default for DerivativeConfig {
    fn default() -> Self {
        Self {
            geometry: ReferenceGeometry::default(),
            velocity_input: "q_dot".to_string(),
            control_surface_input: "delta".to_string(),
            force_output: "Q".to_string(),
        }
    }
}

/// A labelled matrix of stability derivatives
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DerivativeSet {
    /// Derivative coefficients, outputs by rows, inputs by columns
    pub matrix: Mat,
    pub labels_in: Vec<String>,
    pub labels_out: Vec<String>,
    /// Frame of reference the derivatives are expressed in
    pub frame: String,
}

impl DerivativeSet {
    /// Log the derivative table, one output row per line
    pub fn print(&self) {
        log::info!("{} derivatives", self.frame);
        let header: Vec<String> = self.labels_in.iter().map(|l| format!("{l:>12}")).collect();
        log::info!("{:>6} {}", "der", header.join(" "));
        for (i, label) in self.labels_out.iter().enumerate() {
            let row: Vec<String> = (0..self.matrix.ncols())
                .map(|j| format!("{:12.4e}", self.matrix[(i, j)]))
                .collect();
            log::info!("{label:>6} {}", row.join(" "));
        }
    }

    /// Write the set to a JSON file
    pub fn save_json(&self, path: impl AsRef<Path>) -> LtiResult<()> {
        let file = std::fs::File::create(path)?;
        serde_json::to_writer_pretty(file, self)?;
        Ok(())
    }
}

/// Zero-frequency derivative extraction
pub struct StabilityDerivatives {
    config: DerivativeConfig,
}

impl StabilityDerivatives {
    pub fn new(config: DerivativeConfig) -> Self {
        Self { config }
    }

    /// Compute body-axes force and moment derivatives from the steady-state
    /// transfer function of `sys`
    ///
    /// The six velocity channels (u, v, w, p, q, r) are taken from the
    /// configured velocity input variable; control-surface columns are
    /// appended when the model defines them. Rows are the first six
    /// channels of the configured force output and are scaled to
    /// coefficient form.
    pub fn run(&self, sys: &StateSpace) -> LtiResult<DerivativeSet> {
        let h0 = sys.dc_gain()?;
        let coeffs = self.config.geometry.coefficients();

        let vel = sys
            .input_variables()
            .get_variable_from_name(&self.config.velocity_input)?;
        if vel.size() < 6 {
            return Err(LtiError::DimensionMismatch {
                context: format!("velocity input '{}'", self.config.velocity_input),
                expected: "at least 6 channels".to_string(),
                found: vel.size().to_string(),
            });
        }
        let mut cols: Vec<usize> = vel.rows_loc().take(6).collect();
        let mut labels_in: Vec<String> = ["uA", "vA", "wA", "pA", "qA", "rA"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        // control surfaces are an optional channel; absence is a normal outcome
        match sys
            .input_variables()
            .get_variable_from_name(&self.config.control_surface_input)
        {
            Ok(cs) => {
                for (i, col) in cs.rows_loc().enumerate() {
                    cols.push(col);
                    labels_in.push(format!("delta{}", i + 1));
                }
            }
            Err(LtiError::VariableNotFound(_)) => {
                log::debug!(
                    "no '{}' input in the model, skipping control-surface derivatives",
                    self.config.control_surface_input
                );
            }
            Err(e) => return Err(e),
        }

        let force = sys
            .output_variables()
            .get_variable_from_name(&self.config.force_output)?;
        if force.size() < 6 {
            return Err(LtiError::DimensionMismatch {
                context: format!("force output '{}'", self.config.force_output),
                expected: "at least 6 channels".to_string(),
                found: force.size().to_string(),
            });
        }
        let rows: Vec<usize> = force.rows_loc().take(6).collect();

        let mut matrix = Mat::from_fn(6, cols.len(), |i, j| h0[(rows[i], cols[j])]);
        for j in 0..matrix.ncols() {
            for i in 0..3 {
                matrix[(i, j)] /= coeffs.force;
            }
            matrix[(3, j)] /= coeffs.moment_lat;
            matrix[(4, j)] /= coeffs.moment_lon;
            matrix[(5, j)] /= coeffs.moment_lat;
        }

        let set = DerivativeSet {
            matrix,
            labels_in,
            labels_out: ["C_XA", "C_YA", "C_ZA", "C_LA", "C_MA", "C_NA"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            frame: "body".to_string(),
        };
        set.print();
        Ok(set)
    }
}
