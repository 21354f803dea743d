//! LTI Solver - linear state-space algebra for aeroelastic analysis
//!
//! This library provides the linear-systems core of an aeroelastic
//! analysis toolchain, inspired by SHARPy's linear-assembly layer:
//! - State-space models over dense or sparse (compressed-column) matrices
//! - Named, contiguous partitions of the input/state/output ports
//! - Composition operators: series, parallel join, cross-gain coupling,
//!   static gain insertion, variable removal, rescaling
//! - Analysis operators: frequency response, discrete-to-continuous
//!   conversion, predictor-form elimination, stability derivatives
//!
//! ## Example
//! ```rust
//! use lti_solver::prelude::*;
//! use nalgebra::DMatrix;
//!
//! // wrap a linearised model produced by an external solver
//! let a = DMatrix::from_element(2, 2, 0.1);
//! let b = DMatrix::from_element(2, 3, 1.0);
//! let c = DMatrix::from_element(2, 2, 1.0);
//! let d = DMatrix::zeros(2, 3);
//! let mut sys = StateSpace::new(a, b, c, d, Some(0.1)).unwrap();
//!
//! sys.set_input_variables(
//!     LinearVector::new(VariableRole::Input, [("q_dot", 2), ("delta", 1)]).unwrap(),
//! )
//! .unwrap();
//!
//! // slice channels by name, evaluate the steady-state gain
//! let delta = sys.input_variables().get_variable_from_name("delta").unwrap();
//! assert_eq!(delta.rows_loc(), 2..3);
//! let h0 = sys.dc_gain().unwrap();
//! assert_eq!(h0.shape(), (2, 3));
//! ```

pub mod compose;
pub mod derivatives;
pub mod error;
pub mod math;
pub mod statespace;
pub mod variables;

// Re-export common types
pub mod prelude {
    pub use crate::compose::{couple, join, series, ss_conv};
    pub use crate::derivatives::{
        DerivativeConfig, DerivativeSet, ReferenceGeometry, StabilityDerivatives,
    };
    pub use crate::error::{LtiError, LtiResult};
    pub use crate::math::{csc_from_dense, SysMatrix};
    pub use crate::statespace::{
        compare_ss, disc2cont, random_ss, Gain, GainSide, StateSpace,
    };
    pub use crate::variables::{LinearVector, Variable, VariableRole};
}
