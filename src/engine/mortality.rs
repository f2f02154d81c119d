use tracing::{debug, warn};

use crate::error::ConifersError;

/// Relative density at which density-dependent mortality begins.
pub const SDI_MORTALITY_THRESHOLD: f64 = 0.60;

/// Slope of the Hann-Wang self-thinning line, `ln(qmd) = x0 + slope * ln(tpa)`.
pub const HANN_WANG_SLOPE: f64 = -0.62305;

/// Iteration cap of the trees-per-acre search.
pub const MAX_SDI_ITERATIONS: usize = 500_000;

/// Convergence tolerance on predicted QMD, inches.
pub const SDI_TOLERANCE: f64 = 1.192_093e-7;

/// Proportion of trees that must die to return the stand to its
/// self-thinning trajectory.
///
/// Returns 0 below the relative density threshold, and 0 when the stand
/// already lies on or under the trajectory. Otherwise binary-searches for
/// the density at which the trajectory predicts the observed QMD. Failure
/// to converge is an error; the caller must then kill every tree.
pub fn calc_sdi_mortality(
    qmd: f64,
    sdi: f64,
    max_sdi: f64,
    x0: f64,
    bhtpa: f64,
) -> Result<f64, ConifersError> {
    calc_sdi_mortality_within(qmd, sdi, max_sdi, x0, bhtpa, MAX_SDI_ITERATIONS)
}

/// [`calc_sdi_mortality`] with an explicit iteration cap.
pub fn calc_sdi_mortality_within(
    qmd: f64,
    sdi: f64,
    max_sdi: f64,
    x0: f64,
    bhtpa: f64,
    max_iterations: usize,
) -> Result<f64, ConifersError> {
    if max_sdi <= 0.0 || sdi / max_sdi < SDI_MORTALITY_THRESHOLD {
        return Ok(0.0);
    }
    if qmd <= 0.0 || bhtpa <= 0.0 {
        return Err(ConifersError::InvalidInputValue(format!(
            "SDI mortality needs positive qmd and tpa, got qmd={qmd} tpa={bhtpa}"
        )));
    }

    let predicted_at = |tpa: f64| (x0 + HANN_WANG_SLOPE * tpa.ln()).exp();
    if predicted_at(bhtpa) >= qmd {
        return Ok(0.0);
    }

    let mut tpa = bhtpa / 2.0;
    let mut step = bhtpa / 4.0;
    for iteration in 0..max_iterations {
        let predicted = predicted_at(tpa);
        if !predicted.is_finite() {
            break;
        }
        if (predicted - qmd).abs() < SDI_TOLERANCE {
            let proportion = (1.0 - tpa / bhtpa).clamp(0.0, 1.0);
            debug!(iteration, tpa, proportion, "SDI mortality converged");
            return Ok(proportion);
        }
        if predicted < qmd {
            tpa -= step;
        } else {
            tpa += step;
        }
        step /= 2.0;
    }

    warn!(qmd, sdi, max_sdi, x0, bhtpa, "SDI mortality search did not converge");
    Err(ConifersError::Mortality(format!(
        "trees-per-acre search did not converge within {max_iterations} iterations"
    )))
}

/// Trajectory origin passing through the current QMD and density.
pub fn calc_init_x0(qmd: f64, bhtpa: f64) -> Result<f64, ConifersError> {
    if qmd <= 0.0 || bhtpa <= 0.0 {
        return Err(ConifersError::InvalidInputValue(format!(
            "x0 needs positive qmd and tpa, got qmd={qmd} tpa={bhtpa}"
        )));
    }
    Ok(qmd.ln() - HANN_WANG_SLOPE * bhtpa.ln())
}

/// Carry the trajectory origin across a cycle.
///
/// Below the threshold the origin is reset to 0. Crossing from below (or
/// from no previous cycle) to above computes a fresh origin. Staying above
/// keeps the existing origin, which must already be positive.
pub fn calc_hann_wang_x0(
    qmd: f64,
    bhtpa: f64,
    last_relative_density: Option<f64>,
    relative_density: f64,
    x0: f64,
) -> Result<f64, ConifersError> {
    if relative_density < SDI_MORTALITY_THRESHOLD {
        return Ok(0.0);
    }
    match last_relative_density {
        Some(last) if last >= SDI_MORTALITY_THRESHOLD => {
            if x0 > 0.0 {
                Ok(x0)
            } else {
                Err(ConifersError::Mortality(format!(
                    "stand stayed above relative density {SDI_MORTALITY_THRESHOLD} \
                     but its trajectory origin is {x0}"
                )))
            }
        }
        _ => calc_init_x0(qmd, bhtpa),
    }
}
