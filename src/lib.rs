//! Stack-of-tasks twist controller for kinematically redundant manipulators
//!
//! Once per control cycle the controller turns a commanded Cartesian velocity (twist) into a
//! joint velocity command that
//!
//! - tracks the twist as well as the chain allows (damped pseudo-inverse of the chain Jacobian),
//! - resolves additional tasks in strict priority order by recursive null-space projection,
//! - blends in avoidance behaviour of constraints (joint limits and similar) as they approach
//!   criticality, using the Gradient Projection Method while a constraint is in danger and
//!   a dedicated task once it turns critical.
//!
//! # Features
//!
//! - Damped pseudo-inverse by SVD with constant, manipulability based or least singular value
//!   based damping, optional numerical filtering.
//! - Constraints are trait objects with a NORMAL / DANGER / CRITICAL state machine. They are
//!   evaluated against the joint state predicted one cycle ahead.
//! - The commanded twist is damped heavily on a critical cycle and recovers over the
//!   following cycles, so the avoidance task is not fought by the main task.
//! - Kinematic extension hook for an actuated base.
//! - Controller parameters and undercarriage wheel parameters from YAML files (feature
//!   `allow_filesystem`, on by default).
//!
//! ## Example
//!
//! ```
//! use nalgebra::DMatrix;
//! use rs_twist_controller::joint_limit_avoidance::{JointLimitAvoidance, JointLimitParams};
//! use rs_twist_controller::kinematic_traits::{JointStates, Twist};
//! use rs_twist_controller::parameters::TwistControllerParams;
//! use rs_twist_controller::twist_controller::TwistController;
//!
//! let mut controller = TwistController::new(TwistControllerParams::new(7)).unwrap();
//! controller.add_constraint(Box::new(JointLimitAvoidance::new(JointLimitParams::new(3, -2.0, 2.0), 7)));
//!
//! let jacobian = DMatrix::from_fn(6, 7, |r, c| if r == c || c == 6 { 1.0 } else { 0.0 });
//! let q_dot = controller.cycle(&Twist::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0), &JointStates::zeros(7), &jacobian);
//! assert_eq!(q_dot.len(), 7);
//! ```

pub mod parameters;

pub mod parameter_error;

#[cfg(feature = "allow_filesystem")]
pub mod parameters_from_file;

#[cfg(feature = "allow_filesystem")]
pub mod undercarriage;

#[path = "utils/utils.rs"]
pub mod utils;
pub mod kinematic_traits;

pub mod pseudo_inverse;

pub mod constraints;

pub mod joint_limit_avoidance;

pub mod task_stack;

pub mod constraint_solver;

pub mod stack_of_tasks;

pub mod kinematic_extension;

pub mod twist_controller;

#[cfg(test)]
mod tests;
