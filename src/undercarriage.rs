//! Wheel geometry and control gains of an omnidirectional undercarriage, read from YAML
//!
//! The document has a `defaults` block that is merged into every entry of the `wheels` list
//! (values of the wheel win, `steer_ctrl` is merged field by field). Geometry missing in the
//! file may come from a robot model, and the steering axis positions can be cross-checked
//! against a transform lookup. Any failure here is a configuration error: the controller
//! must not be started with partially parsed wheels.

extern crate nalgebra as na;
use std::path::Path;

use na::Vector3;
use serde::Deserialize;
use tracing::info;

use crate::parameter_error::ParameterError;

/// Geometry of one steerable wheel. Lengths in millimetres, as the undercarriage controller expects.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct WheelGeom {
    pub steer_name: String,
    pub drive_name: String,
    pub wheel_x_pos_mm: f64,
    pub wheel_y_pos_mm: f64,
    pub radius_wheel_mm: f64,
    pub dist_steer_axis_to_drive_wheel_mm: f64,
    pub steer_drive_coupling: f64,
}

/// Drive control limits of one wheel.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct CtrlParams {
    /// Neutral steering position (rad), configured in degrees
    pub wheel_neutral_pos: f64,
    pub max_steer_rate: f64,
    pub max_drive_rate: f64,
}

/// Gains of the steering position controller (virtual spring-damper).
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PosCtrlParams {
    pub spring: f64,
    pub damp: f64,
    pub virt_mass: f64,
    pub d_phi_max: f64,
    pub dd_phi_max: f64,
}

/// Which parameter groups must be present for each wheel.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WheelParamsKind {
    /// Geometry only
    Geom,
    /// Geometry and drive control limits
    DirectCtrl,
    /// Geometry, drive control limits and steering position control
    Ctrl,
}

#[derive(Debug, Clone, PartialEq)]
pub struct WheelParams {
    pub geom: WheelGeom,
    pub ctrl: Option<CtrlParams>,
    pub pos_ctrl: Option<PosCtrlParams>,
}

/// Origin of a joint relative to its parent link, as found in the robot description.
#[derive(Debug, Clone, PartialEq)]
pub struct JointOrigin {
    pub parent_link: String,
    pub position: Vector3<f64>,
}

/// Robot model (e.g. URDF) lookup of joint origins.
pub trait JointOriginLookup {
    fn joint_origin(&self, joint: &str) -> Option<JointOrigin>;
}

/// Transform tree lookup: translation of `source_frame` expressed in `target_frame`.
pub trait TransformLookup {
    fn lookup_translation(&self, target_frame: &str, source_frame: &str) -> Result<Vector3<f64>, String>;
}

const BASE_FRAME: &str = "base_link";

#[derive(Deserialize, Default, Clone)]
struct RawSteerCtrl {
    spring: Option<f64>,
    damp: Option<f64>,
    virt_mass: Option<f64>,
    d_phi_max: Option<f64>,
    dd_phi_max: Option<f64>,
}

impl RawSteerCtrl {
    fn merged(&self, defaults: &RawSteerCtrl) -> RawSteerCtrl {
        RawSteerCtrl {
            spring: self.spring.or(defaults.spring),
            damp: self.damp.or(defaults.damp),
            virt_mass: self.virt_mass.or(defaults.virt_mass),
            d_phi_max: self.d_phi_max.or(defaults.d_phi_max),
            dd_phi_max: self.dd_phi_max.or(defaults.dd_phi_max),
        }
    }
}

#[derive(Deserialize, Default, Clone)]
struct RawWheel {
    steer: Option<String>,
    drive: Option<String>,
    steer_drive_coupling: Option<f64>,
    x_pos: Option<f64>,
    y_pos: Option<f64>,
    wheel_radius: Option<f64>,
    wheel_offset: Option<f64>,
    steer_neutral_position: Option<f64>,
    max_steer_rate: Option<f64>,
    max_drive_rate: Option<f64>,
    steer_ctrl: Option<RawSteerCtrl>,
}

impl RawWheel {
    /// Wheel values take precedence, nested structures are merged recursively.
    fn merged(&self, defaults: &RawWheel) -> RawWheel {
        let steer_ctrl = match (&self.steer_ctrl, &defaults.steer_ctrl) {
            (Some(own), Some(def)) => Some(own.merged(def)),
            (own, def) => own.clone().or_else(|| def.clone()),
        };
        RawWheel {
            steer: self.steer.clone().or_else(|| defaults.steer.clone()),
            drive: self.drive.clone().or_else(|| defaults.drive.clone()),
            steer_drive_coupling: self.steer_drive_coupling.or(defaults.steer_drive_coupling),
            x_pos: self.x_pos.or(defaults.x_pos),
            y_pos: self.y_pos.or(defaults.y_pos),
            wheel_radius: self.wheel_radius.or(defaults.wheel_radius),
            wheel_offset: self.wheel_offset.or(defaults.wheel_offset),
            steer_neutral_position: self.steer_neutral_position.or(defaults.steer_neutral_position),
            max_steer_rate: self.max_steer_rate.or(defaults.max_steer_rate),
            max_drive_rate: self.max_drive_rate.or(defaults.max_drive_rate),
            steer_ctrl,
        }
    }
}

#[derive(Deserialize)]
struct Root {
    #[serde(default)]
    defaults: RawWheel,
    wheels: Option<Vec<RawWheel>>,
}

/// Reads the wheel parameters from a YAML file, see [`parse_wheel_params`].
pub fn parse_wheel_params_file<P: AsRef<Path>>(
    path: P,
    kind: WheelParamsKind,
    model: Option<&dyn JointOriginLookup>,
    transforms: Option<&dyn TransformLookup>,
) -> Result<Vec<WheelParams>, ParameterError> {
    let contents = std::fs::read_to_string(path)?;
    parse_wheel_params(&contents, kind, model, transforms)
}

/// Parses the wheel parameters. YAML like this is supported:
/// ```yaml
/// defaults:
///   wheel_radius: 0.080
///   wheel_offset: 0.030
///   max_steer_rate: 12.0
///   max_drive_rate: 20.0
///   steer_ctrl: { spring: 10.0, damp: 2.5, virt_mass: 0.1, d_phi_max: 12.0, dd_phi_max: 100.0 }
/// wheels:
///   - steer: fl_caster_rotation_joint
///     drive: fl_caster_r_wheel_joint
///     x_pos: 0.24
///     y_pos: 0.205
///     steer_neutral_position: -45.0   # degrees
/// ```
/// `x_pos`/`y_pos` are taken from the wheel itself, the other values may come from `defaults`.
/// Without `x_pos`, `y_pos` or `wheel_radius` the origin of the steering joint in `model` is used,
/// without `wheel_offset` the horizontal distance of the drive joint origin.
pub fn parse_wheel_params(
    yaml: &str,
    kind: WheelParamsKind,
    model: Option<&dyn JointOriginLookup>,
    transforms: Option<&dyn TransformLookup>,
) -> Result<Vec<WheelParams>, ParameterError> {
    let root: Root = serde_saphyr::from_str(yaml)
        .map_err(|e| ParameterError::ParseError(format!("{}", e)))?;
    let wheels = root.wheels.ok_or_else(|| ParameterError::MissingField("wheels".to_string()))?;
    if wheels.is_empty() {
        return Err(ParameterError::InvalidValue("list of wheels is empty".to_string()));
    }

    wheels
        .iter()
        .enumerate()
        .map(|(index, wheel)| {
            let merged = wheel.merged(&root.defaults);
            let geom = parse_wheel_geom(index, wheel, &merged, model, transforms)?;
            let ctrl = match kind {
                WheelParamsKind::Geom => None,
                WheelParamsKind::DirectCtrl | WheelParamsKind::Ctrl => Some(parse_ctrl_params(&merged)),
            };
            let pos_ctrl = match kind {
                WheelParamsKind::Ctrl => Some(parse_pos_ctrl_params(&merged)?),
                _ => None,
            };
            Ok(WheelParams { geom, ctrl, pos_ctrl })
        })
        .collect()
}

fn parse_ctrl_params(merged: &RawWheel) -> CtrlParams {
    CtrlParams {
        wheel_neutral_pos: merged.steer_neutral_position.unwrap_or(0.0).to_radians(),
        max_steer_rate: merged.max_steer_rate.unwrap_or(0.0),
        max_drive_rate: merged.max_drive_rate.unwrap_or(0.0),
    }
}

fn parse_pos_ctrl_params(merged: &RawWheel) -> Result<PosCtrlParams, ParameterError> {
    let steer = merged
        .steer_ctrl
        .as_ref()
        .ok_or_else(|| ParameterError::MissingField("steer_ctrl".to_string()))?;
    let required = |value: Option<f64>, name: &str| {
        value.ok_or_else(|| ParameterError::MissingField(format!("steer_ctrl.{}", name)))
    };
    Ok(PosCtrlParams {
        spring: required(steer.spring, "spring")?,
        damp: required(steer.damp, "damp")?,
        virt_mass: required(steer.virt_mass, "virt_mass")?,
        d_phi_max: required(steer.d_phi_max, "d_phi_max")?,
        dd_phi_max: required(steer.dd_phi_max, "dd_phi_max")?,
    })
}

fn parse_wheel_geom(
    index: usize,
    wheel: &RawWheel,
    merged: &RawWheel,
    model: Option<&dyn JointOriginLookup>,
    transforms: Option<&dyn TransformLookup>,
) -> Result<WheelGeom, ParameterError> {
    let steer_name = merged.steer.clone().unwrap_or_default();
    let drive_name = merged.drive.clone().unwrap_or_default();
    let label = if steer_name.is_empty() { format!("#{}", index) } else { steer_name.clone() };

    let lookup_joint = |name: &str| match model {
        Some(model) if !name.is_empty() => model.joint_origin(name),
        _ => None,
    };
    let steer_joint = lookup_joint(&steer_name);
    let joint_position = steer_joint.as_ref().map(|j| j.position);

    let missing = |field: &str| ParameterError::MissingField(format!("{} (wheel {})", field, label));
    let mut x = wheel.x_pos.or(joint_position.map(|p| p.x)).ok_or_else(|| missing("x_pos"))?;
    let mut y = wheel.y_pos.or(joint_position.map(|p| p.y)).ok_or_else(|| missing("y_pos"))?;
    let radius = merged.wheel_radius.or(joint_position.map(|p| p.z)).ok_or_else(|| missing("wheel_radius"))?;

    if let Some(transforms) = transforms {
        let frame = steer_joint
            .as_ref()
            .map(|j| j.parent_link.clone())
            .unwrap_or_else(|| steer_name.clone());
        let translation = transforms
            .lookup_translation(&frame, BASE_FRAME)
            .map_err(|e| ParameterError::TransformLookup(format!("{} -> {}: {}", frame, BASE_FRAME, e)))?;
        info!(steer_name = %steer_name, x = translation.x, y = translation.y, z = translation.z, "steering axis from transform");
        x = translation.x;
        y = translation.y;
    }

    if radius == 0.0 {
        return Err(ParameterError::WheelRadiusZero(label.clone()));
    }

    let offset = match merged.wheel_offset {
        Some(offset) => offset,
        None => lookup_joint(&drive_name)
            .map(|j| j.position.x.hypot(j.position.y))
            .ok_or_else(|| missing("wheel_offset"))?,
    };

    Ok(WheelGeom {
        steer_name,
        drive_name,
        wheel_x_pos_mm: x * 1000.0,
        wheel_y_pos_mm: y * 1000.0,
        radius_wheel_mm: (radius * 1000.0).abs(),
        dist_steer_axis_to_drive_wheel_mm: offset * 1000.0,
        steer_drive_coupling: merged.steer_drive_coupling.unwrap_or(0.0),
    })
}
