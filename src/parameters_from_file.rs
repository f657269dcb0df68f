//! Supports reading the twist controller parameters from YAML file (optional)

use std::path::Path;
use serde::Deserialize;

use crate::parameter_error::ParameterError;
use crate::parameters::{DampingMethod, DampingParams, TwistControllerParams};

#[derive(Deserialize, Clone, Copy)]
#[serde(rename_all = "snake_case")]
enum RawDampingMethod {
    None,
    Constant,
    Manipulability,
    LeastSingularValue,
}

impl From<RawDampingMethod> for DampingMethod {
    fn from(raw: RawDampingMethod) -> Self {
        match raw {
            RawDampingMethod::None => DampingMethod::None,
            RawDampingMethod::Constant => DampingMethod::Constant,
            RawDampingMethod::Manipulability => DampingMethod::Manipulability,
            RawDampingMethod::LeastSingularValue => DampingMethod::LeastSingularValue,
        }
    }
}

#[derive(Deserialize)]
struct Root {
    pub dof: Option<usize>,
    #[serde(default)]
    pub damping_method: Option<RawDampingMethod>,
    #[serde(default)]
    pub damping_factor: Option<f64>,
    #[serde(default)]
    pub lambda_max: Option<f64>,
    #[serde(default)]
    pub w_threshold: Option<f64>,
    #[serde(default)]
    pub eps_truncation: Option<f64>,
    #[serde(default)]
    pub eps_damping: Option<f64>,
    #[serde(default)]
    pub numerical_filtering: Option<bool>,
    #[serde(default, alias = "k_H")]
    pub k_h: Option<f64>,
    #[serde(default)]
    pub priority_main: Option<u32>,
    #[serde(default)]
    pub damping_start_count: Option<f64>,
    #[serde(default)]
    pub zero_threshold: Option<f64>,
    #[serde(default)]
    pub div0_safe: Option<f64>,
    #[serde(default)]
    pub base_active: Option<bool>,
}

impl TwistControllerParams {
    /// Read the controller configuration from YAML file. YAML file like this is supported:
    /// ```yaml
    /// dof: 7
    /// damping_method: manipulability   # none, constant, manipulability, least_singular_value
    /// damping_factor: 0.2
    /// lambda_max: 0.1
    /// w_threshold: 0.005
    /// eps_truncation: 0.001
    /// eps_damping: 0.003
    /// numerical_filtering: false
    /// k_H: 1.0
    /// priority_main: 500
    /// damping_start_count: 80.0
    /// base_active: false
    /// ```
    /// Only `dof` is required, everything else falls back to [`TwistControllerParams::new`].
    /// The result is validated.
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self, ParameterError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&contents)
    }

    pub fn from_yaml_str(contents: &str) -> Result<Self, ParameterError> {
        let root: Root = serde_saphyr::from_str(contents)
            .map_err(|e| ParameterError::ParseError(format!("{}", e)))?;

        let dof = root.dof.ok_or_else(|| ParameterError::MissingField("dof".to_string()))?;
        let defaults = TwistControllerParams::new(dof);
        let default_damping = DampingParams::default();

        let params = TwistControllerParams {
            dof,
            damping: DampingParams {
                method: root.damping_method.map(DampingMethod::from).unwrap_or(default_damping.method),
                damping_factor: root.damping_factor.unwrap_or(default_damping.damping_factor),
                lambda_max: root.lambda_max.unwrap_or(default_damping.lambda_max),
                w_threshold: root.w_threshold.unwrap_or(default_damping.w_threshold),
                eps_truncation: root.eps_truncation.unwrap_or(default_damping.eps_truncation),
                eps_damping: root.eps_damping.unwrap_or(default_damping.eps_damping),
                numerical_filtering: root.numerical_filtering.unwrap_or(default_damping.numerical_filtering),
            },
            k_h: root.k_h.unwrap_or(defaults.k_h),
            priority_main: root.priority_main.unwrap_or(defaults.priority_main),
            damping_start_count: root.damping_start_count.unwrap_or(defaults.damping_start_count),
            zero_threshold: root.zero_threshold.unwrap_or(defaults.zero_threshold),
            div0_safe: root.div0_safe.unwrap_or(defaults.div0_safe),
            base_active: root.base_active.unwrap_or(defaults.base_active),
        };
        params.validate()?;
        Ok(params)
    }
}
