//! Composition operators: algebra over state-space blocks
//!
//! These combine existing systems into new ones without mutating the
//! operands. Port compatibility is validated through the named variable
//! partitions, and the combined partitions are recomputed so downstream
//! consumers can keep addressing channels by name.

use crate::error::{LtiError, LtiResult};
use crate::math::{lu_solve, Mat, SysMatrix};
use crate::statespace::StateSpace;
use crate::variables::{LinearVector, VariableRole};

/// Check that two systems share a sample interval
fn check_dt(s1: &StateSpace, s2: &StateSpace) -> LtiResult<()> {
    let ok = match (s1.dt(), s2.dt()) {
        (None, None) => true,
        (Some(a), Some(b)) => (a - b).abs() <= 1e-12 * a.abs().max(b.abs()),
        _ => false,
    };
    if ok {
        Ok(())
    } else {
        Err(LtiError::TimestepMismatch {
            left: s1.dt(),
            right: s2.dt(),
        })
    }
}

/// Cascade two systems: `upstream`'s output feeds `downstream`'s input
///
/// The connection is validated variable-by-variable: `upstream`'s output
/// partition must agree in names and sizes with `downstream`'s input
/// partition. The combined state vector lists `upstream`'s state variables
/// first, then `downstream`'s — a documented contract, since callers index
/// the combined state by name.
///
/// ```text
/// A = | A1      0  |    B = | B1    |    C = [ D2 C1   C2 ]    D = D2 D1
///     | B2 C1   A2 |        | B2 D1 |
/// ```
pub fn series(upstream: &StateSpace, downstream: &StateSpace) -> LtiResult<StateSpace> {
    check_dt(upstream, downstream)?;
    if upstream.outputs() != downstream.inputs() {
        return Err(LtiError::DimensionMismatch {
            context: "series connection".to_string(),
            expected: format!("{} downstream inputs", upstream.outputs()),
            found: format!("{}", downstream.inputs()),
        });
    }
    if !upstream
        .output_variables()
        .matches(downstream.input_variables())
    {
        return Err(LtiError::InvalidInput(format!(
            "series connection: upstream outputs {:?} do not match downstream inputs {:?}",
            upstream
                .output_variables()
                .iter()
                .map(|v| (v.name(), v.size()))
                .collect::<Vec<_>>(),
            downstream
                .input_variables()
                .iter()
                .map(|v| (v.name(), v.size()))
                .collect::<Vec<_>>(),
        )));
    }

    let (a1, b1, c1, d1) = upstream.get_mats();
    let (a2, b2, c2, d2) = downstream.get_mats();

    let zeros = SysMatrix::zeros(
        upstream.states(),
        downstream.states(),
        a1.is_sparse() && a2.is_sparse(),
    );
    let b2c1 = b2.dot(c1);
    let top = SysMatrix::hstack(&[a1, &zeros]);
    let bottom = SysMatrix::hstack(&[&b2c1, a2]);
    let a = SysMatrix::vstack(&[&top, &bottom]);

    let b2d1 = b2.dot(d1);
    let b = SysMatrix::vstack(&[b1, &b2d1]);

    let d2c1 = d2.dot(c1);
    let c = SysMatrix::hstack(&[&d2c1, c2]);
    let d = d2.dot(d1);

    let mut out = StateSpace::new(a, b, c, d, upstream.dt())?;
    out.set_input_variables(upstream.input_variables().clone())?;
    out.set_state_variables(LinearVector::merge(
        upstream.state_variables(),
        downstream.state_variables(),
    )?)?;
    out.set_output_variables(downstream.output_variables().clone())?;
    Ok(out)
}

/// Parallel combination with a shared input and weighted output sum
///
/// All systems must agree on input width, output width and sample
/// interval. The joined system stacks the subsystem states block-diagonally
/// and sums the weighted outputs:
///
/// ```text
/// A = diag(A1..An)   B = [B1; ..; Bn]   C = [w1 C1 .. wn Cn]   D = sum wi Di
/// ```
///
/// Used to blend alternative convection/downwash models with relative
/// weights. The joined state partition collapses to a single "x" variable
/// because the member partitions describe the same physical port names.
pub fn join(systems: &[&StateSpace], weights: &[f64]) -> LtiResult<StateSpace> {
    if systems.is_empty() {
        return Err(LtiError::InvalidInput("join needs at least one system".to_string()));
    }
    if systems.len() != weights.len() {
        return Err(LtiError::InvalidInput(format!(
            "join got {} systems but {} weights",
            systems.len(),
            weights.len()
        )));
    }
    let first = systems[0];
    for sys in &systems[1..] {
        check_dt(first, sys)?;
        if sys.inputs() != first.inputs() {
            return Err(LtiError::DimensionMismatch {
                context: "join input ports".to_string(),
                expected: format!("{} inputs", first.inputs()),
                found: format!("{}", sys.inputs()),
            });
        }
        if sys.outputs() != first.outputs() {
            return Err(LtiError::DimensionMismatch {
                context: "join output ports".to_string(),
                expected: format!("{} outputs", first.outputs()),
                found: format!("{}", sys.outputs()),
            });
        }
    }

    let a_blocks: Vec<&SysMatrix> = systems.iter().map(|s| s.a()).collect();
    let b_blocks: Vec<&SysMatrix> = systems.iter().map(|s| s.b()).collect();
    let a = SysMatrix::block_diag(&a_blocks);
    let b = SysMatrix::vstack(&b_blocks);

    let c_weighted: Vec<SysMatrix> = systems
        .iter()
        .zip(weights)
        .map(|(s, &w)| s.c().scaled(w))
        .collect();
    let c_refs: Vec<&SysMatrix> = c_weighted.iter().collect();
    let c = SysMatrix::hstack(&c_refs);

    let mut d = systems[0].d().scaled(weights[0]);
    for (s, &w) in systems[1..].iter().zip(&weights[1..]) {
        d = d.add(&s.d().scaled(w));
    }

    let mut out = StateSpace::new(a, b, c, d, first.dt())?;
    out.set_input_variables(first.input_variables().clone())?;
    out.set_output_variables(first.output_variables().clone())?;
    Ok(out)
}

/// Cross-feedback interconnection of two systems through static gains
///
/// `k21` feeds `sys1`'s output into `sys2`'s input and `k12` feeds
/// `sys2`'s output into `sys1`'s input, on top of the retained external
/// signals:
///
/// ```text
/// u1 = u1_ext + K12 y2        u2 = u2_ext + K21 y1
/// ```
///
/// Non-zero feedthrough closes an algebraic loop, resolved with the
/// sensitivity factors `S1 = (I - D1 K12 D2 K21)^-1` and
/// `S2 = (I - D2 K21 D1 K12)^-1`; a singular loop is reported as
/// [`LtiError::SingularMatrix`]. The combined system keeps all external
/// inputs and outputs, `sys1`'s first, and its state vector concatenates
/// `sys1`'s states then `sys2`'s. The result is numerically identical for
/// any dense/sparse mix of the four operands.
pub fn couple(
    sys1: &StateSpace,
    sys2: &StateSpace,
    k12: &SysMatrix,
    k21: &SysMatrix,
) -> LtiResult<StateSpace> {
    check_dt(sys1, sys2)?;
    if k12.shape() != (sys1.inputs(), sys2.outputs()) {
        return Err(LtiError::shape(
            "coupling gain K12",
            (sys1.inputs(), sys2.outputs()),
            k12.shape(),
        ));
    }
    if k21.shape() != (sys2.inputs(), sys1.outputs()) {
        return Err(LtiError::shape(
            "coupling gain K21",
            (sys2.inputs(), sys1.outputs()),
            k21.shape(),
        ));
    }

    let (a1, b1, c1, d1) = sys1.get_mats();
    let (a2, b2, c2, d2) = sys2.get_mats();
    let (ny1, ny2) = (sys1.outputs(), sys2.outputs());

    // feedthrough loop gains
    let d1k12 = d1.dot(k12); // Ny1 x Ny2
    let d2k21 = d2.dot(k21); // Ny2 x Ny1

    let s1 = SysMatrix::from(lu_solve(
        Mat::identity(ny1, ny1) - d1k12.dot(&d2k21).to_dense(),
        &Mat::identity(ny1, ny1),
        "couple feedthrough loop (sys1 side)",
    )?);
    let s2 = SysMatrix::from(lu_solve(
        Mat::identity(ny2, ny2) - d2k21.dot(&d1k12).to_dense(),
        &Mat::identity(ny2, ny2),
        "couple feedthrough loop (sys2 side)",
    )?);

    let b1k12 = b1.dot(k12); // Nx1 x Ny2
    let b2k21 = b2.dot(k21); // Nx2 x Ny1
    let s1d1k12 = s1.dot(&d1k12); // Ny1 x Ny2
    let s2d2k21 = s2.dot(&d2k21); // Ny2 x Ny1

    let a11 = a1.add(&b1k12.dot(&s2d2k21).dot(c1));
    let a12 = b1k12.dot(&s2).dot(c2);
    let a21 = b2k21.dot(&s1).dot(c1);
    let a22 = a2.add(&b2k21.dot(&s1d1k12).dot(c2));
    let a = SysMatrix::vstack(&[
        &SysMatrix::hstack(&[&a11, &a12]),
        &SysMatrix::hstack(&[&a21, &a22]),
    ]);

    let b11 = b1.add(&b1k12.dot(&s2d2k21).dot(d1));
    let b12 = b1k12.dot(&s2).dot(d2);
    let b21 = b2k21.dot(&s1).dot(d1);
    let b22 = b2.add(&b2k21.dot(&s1d1k12).dot(d2));
    let b = SysMatrix::vstack(&[
        &SysMatrix::hstack(&[&b11, &b12]),
        &SysMatrix::hstack(&[&b21, &b22]),
    ]);

    let c11 = s1.dot(c1);
    let c12 = s1d1k12.dot(c2);
    let c21 = s2d2k21.dot(c1);
    let c22 = s2.dot(c2);
    let c = SysMatrix::vstack(&[
        &SysMatrix::hstack(&[&c11, &c12]),
        &SysMatrix::hstack(&[&c21, &c22]),
    ]);

    let d11 = s1.dot(d1);
    let d12 = s1d1k12.dot(d2);
    let d21 = s2d2k21.dot(d1);
    let d22 = s2.dot(d2);
    let d = SysMatrix::vstack(&[
        &SysMatrix::hstack(&[&d11, &d12]),
        &SysMatrix::hstack(&[&d21, &d22]),
    ]);

    let mut out = StateSpace::new(a, b, c, d, sys1.dt())?;
    out.set_input_variables(LinearVector::merge(
        sys1.input_variables(),
        sys2.input_variables(),
    )?)?;
    out.set_state_variables(LinearVector::merge(
        sys1.state_variables(),
        sys2.state_variables(),
    )?)?;
    out.set_output_variables(LinearVector::merge(
        sys1.output_variables(),
        sys2.output_variables(),
    )?)?;
    Ok(out)
}

/// Eliminate the one-step-ahead (predictor) input term of a discrete system
///
/// Rewrites
///
/// ```text
/// x(n+1) = A x(n) + B0 u(n) + B1 u(n+1)
/// y(n)   = C x(n) + D u(n)
/// ```
///
/// through the substitution `h = x - B1 u` into the standard form
/// `(A, B0 + A B1, C, D + C B1)`. Any dense/sparse mix of the operands is
/// accepted and produces the same numbers.
pub fn ss_conv(
    a: &SysMatrix,
    b0: &SysMatrix,
    b1: &SysMatrix,
    c: &SysMatrix,
    d: &SysMatrix,
) -> LtiResult<(SysMatrix, SysMatrix, SysMatrix, SysMatrix)> {
    if b1.shape() != b0.shape() {
        return Err(LtiError::shape("predictor input matrix B1", b0.shape(), b1.shape()));
    }
    if a.ncols() != b0.nrows() || c.ncols() != a.ncols() || d.shape() != (c.nrows(), b0.ncols()) {
        return Err(LtiError::InvalidInput(format!(
            "ss_conv shapes are inconsistent: A {:?}, B0 {:?}, C {:?}, D {:?}",
            a.shape(),
            b0.shape(),
            c.shape(),
            d.shape()
        )));
    }
    let b = b0.add(&a.dot(b1));
    let d_out = d.add(&c.dot(b1));
    Ok((a.clone(), b, c.clone(), d_out))
}
