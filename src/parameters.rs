//! Defines the controller parameter data structures

use crate::parameter_error::ParameterError;

/// Priority numbers at or below this value are treated as zero.
pub const ZERO_THRESHOLD: f64 = 1.0e-9;

/// Divisor used instead of a (near) zero priority number.
pub const DIV0_SAFE: f64 = 1.0e-6;

/// Value the Cartesian velocity damping counter is reset to when any constraint turns critical.
pub const START_CNT: f64 = 80.0;

/// Default priority of the main (Cartesian velocity tracking) task.
pub const DEFAULT_PRIORITY_MAIN: u32 = 500;

/// How the damping factor of the pseudo-inverse is determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DampingMethod {
    /// No damping, plain truncated pseudo-inverse.
    None,
    /// Fixed damping factor.
    #[default]
    Constant,
    /// Damping grows as the manipulability measure sqrt(det(J * J^T)) falls below the threshold.
    Manipulability,
    /// Damping grows as the smallest singular value falls below the threshold.
    LeastSingularValue,
}

/// Numeric controls of the damped pseudo-inverse. Every task carries its own copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DampingParams {
    pub method: DampingMethod,

    /// Damping factor used by [`DampingMethod::Constant`]
    pub damping_factor: f64,

    /// Upper bound of the damping for the adaptive methods
    pub lambda_max: f64,

    /// Manipulability or singular value threshold where adaptive damping starts
    pub w_threshold: f64,

    /// Singular values below this are truncated to zero (without numerical filtering)
    pub eps_truncation: f64,

    /// Additional damping of all singular values when numerical filtering is on
    pub eps_damping: f64,

    /// Use numerical filtering instead of truncation of small singular values
    pub numerical_filtering: bool,
}

impl Default for DampingParams {
    fn default() -> Self {
        DampingParams {
            method: DampingMethod::Constant,
            damping_factor: 0.01,
            lambda_max: 0.1,
            w_threshold: 0.005,
            eps_truncation: 0.001,
            eps_damping: 0.003,
            numerical_filtering: false,
        }
    }
}

impl DampingParams {
    /// Damping parameters that produce the plain (Moore-Penrose) pseudo-inverse,
    /// apart from truncating singular values below `eps_truncation`.
    pub fn undamped() -> Self {
        DampingParams {
            method: DampingMethod::None,
            damping_factor: 0.0,
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<(), ParameterError> {
        for (name, val) in [
            ("damping_factor", self.damping_factor),
            ("lambda_max", self.lambda_max),
            ("w_threshold", self.w_threshold),
            ("eps_truncation", self.eps_truncation),
            ("eps_damping", self.eps_damping),
        ] {
            if !val.is_finite() || val < 0.0 {
                return Err(ParameterError::InvalidValue(format!(
                    "'{}' must be finite and non-negative (got {})",
                    name, val
                )));
            }
        }
        if matches!(
            self.method,
            DampingMethod::Manipulability | DampingMethod::LeastSingularValue
        ) && self.w_threshold == 0.0
        {
            return Err(ParameterError::InvalidValue(
                "'w_threshold' must be positive for adaptive damping".to_string(),
            ));
        }
        Ok(())
    }
}

/// Parameters of the twist controller. Immutable for the lifetime of a solver.
#[derive(Debug, Clone, PartialEq)]
pub struct TwistControllerParams {
    /// Degrees of freedom of the chain (columns of the chain Jacobian).
    pub dof: usize,

    /// Damping of the main task and of the particular solution.
    pub damping: DampingParams,

    /// Global weight of the gradient projection (secondary objectives).
    pub k_h: f64,

    /// Priority of the main task. Lower numbers are resolved first.
    pub priority_main: u32,

    /// Counter value the Cartesian velocity damping restarts from on a critical cycle.
    pub damping_start_count: f64,

    /// Constraint priority numbers at or below are replaced by `div0_safe`.
    pub zero_threshold: f64,

    /// Divisor used for (near) zero constraint priority numbers.
    pub div0_safe: f64,

    /// The chain is mounted on an actuated base that takes part in the solution.
    pub base_active: bool,
}

impl TwistControllerParams {
    /// Default parameters for a chain with the given number of joints.
    pub fn new(dof: usize) -> Self {
        TwistControllerParams {
            dof,
            damping: DampingParams::default(),
            k_h: 1.0,
            priority_main: DEFAULT_PRIORITY_MAIN,
            damping_start_count: START_CNT,
            zero_threshold: ZERO_THRESHOLD,
            div0_safe: DIV0_SAFE,
            base_active: false,
        }
    }

    /// Checks the parameters. A controller is never built from parameters that fail here.
    pub fn validate(&self) -> Result<(), ParameterError> {
        if self.dof == 0 {
            return Err(ParameterError::KinematicsConfigurationError(
                "dof must be at least 1".to_string(),
            ));
        }
        self.damping.validate()?;
        if !self.k_h.is_finite() {
            return Err(ParameterError::InvalidValue(format!(
                "'k_h' must be finite (got {})",
                self.k_h
            )));
        }
        if !self.damping_start_count.is_finite() || self.damping_start_count < 1.0 {
            return Err(ParameterError::InvalidValue(format!(
                "'damping_start_count' must be at least 1.0 (got {})",
                self.damping_start_count
            )));
        }
        if !self.zero_threshold.is_finite() || self.zero_threshold < 0.0 {
            return Err(ParameterError::InvalidValue(format!(
                "'zero_threshold' must be finite and non-negative (got {})",
                self.zero_threshold
            )));
        }
        if !self.div0_safe.is_finite() || self.div0_safe <= 0.0 {
            return Err(ParameterError::InvalidValue(format!(
                "'div0_safe' must be positive (got {})",
                self.div0_safe
            )));
        }
        Ok(())
    }

    /// Inverse of a constraint priority number, guarded against division by (near) zero.
    pub fn inverse_priority(&self, priority: f64) -> f64 {
        if priority > self.zero_threshold {
            1.0 / priority
        } else {
            1.0 / self.div0_safe
        }
    }
}
