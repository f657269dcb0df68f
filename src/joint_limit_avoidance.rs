//! Joint limit avoidance constraint for a single joint of the chain.

extern crate nalgebra as na;
use na::{DMatrix, DVector};
use tracing::{trace, warn};

use crate::constraints::{Constraint, ConstraintSeverity, ConstraintState};
use crate::kinematic_traits::{JointArrayVel, JointStates};
use crate::parameters::DampingParams;
use crate::task_stack::Task;

/// Smallest distance to a limit used in the cost gradient, keeps it finite at the limit.
const LIMIT_DISTANCE_GUARD: f64 = 1.0e-6;

/// Configuration of a [`JointLimitAvoidance`] constraint.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JointLimitParams {
    /// Index of the joint in the chain.
    pub joint: usize,
    pub limit_min: f64,
    pub limit_max: f64,

    /// Distance (rad) to the nearest limit below which the constraint is in danger.
    pub activation_threshold: f64,

    /// Distance (rad) to the nearest limit below which the constraint is critical.
    pub critical_threshold: f64,

    /// Priority number for the gradient weighting.
    pub priority: f64,

    pub activation_gain: f64,

    /// Priority rank of the task created while critical.
    pub task_priority: u32,

    /// Joint velocity bound used to size the self-motion.
    pub max_velocity: f64,
}

impl JointLimitParams {
    pub fn new(joint: usize, limit_min: f64, limit_max: f64) -> Self {
        JointLimitParams {
            joint,
            limit_min,
            limit_max,
            activation_threshold: 0.2,
            critical_threshold: 0.05,
            priority: 1.0,
            activation_gain: 1.0,
            task_priority: 10,
            max_velocity: 1.0,
        }
    }
}

/// Keeps one joint away from its limits. Blends in a gradient of the joint-range cost
/// `H = (max - min)^2 / (4 (max - q)(q - min))` while in danger and becomes a task
/// moving the joint toward the centre of its range when critical.
#[derive(Debug, Clone)]
pub struct JointLimitAvoidance {
    params: JointLimitParams,
    dof: usize,
    damping: DampingParams,
    state: ConstraintState,
    position: f64,
    partial_values: DVector<f64>,
}

impl JointLimitAvoidance {
    pub fn new(params: JointLimitParams, dof: usize) -> Self {
        JointLimitAvoidance {
            params,
            dof,
            damping: DampingParams::default(),
            state: ConstraintState::default(),
            position: 0.5 * (params.limit_min + params.limit_max),
            partial_values: DVector::zeros(dof),
        }
    }

    pub fn with_damping(mut self, damping: DampingParams) -> Self {
        self.damping = damping;
        self
    }

    pub fn params(&self) -> &JointLimitParams {
        &self.params
    }

    fn severity_at(&self, q: f64) -> ConstraintSeverity {
        let distance = (self.params.limit_max - q).min(q - self.params.limit_min);
        if distance <= self.params.critical_threshold {
            ConstraintSeverity::Critical
        } else if distance <= self.params.activation_threshold {
            ConstraintSeverity::Danger
        } else {
            ConstraintSeverity::Normal
        }
    }

    /// Derivative of the joint-range cost at `q`.
    fn cost_gradient(&self, q: f64) -> f64 {
        let (min, max) = (self.params.limit_min, self.params.limit_max);
        let range = max - min;
        let to_max = (max - q).max(LIMIT_DISTANCE_GUARD);
        let to_min = (q - min).max(LIMIT_DISTANCE_GUARD);
        range * range * (2.0 * q - max - min) / (4.0 * to_max * to_max * to_min * to_min)
    }
}

impl Constraint for JointLimitAvoidance {
    fn task_id(&self) -> String {
        format!("JointLimitAvoidance_{}", self.params.joint)
    }

    fn update(&mut self, joint_states: &JointStates, predicted: &JointArrayVel, _jacobian: &DMatrix<f64>) {
        let joint = self.params.joint;
        let (Some(&q), Some(&q_predicted)) = (joint_states.current_q.get(joint), predicted.q.get(joint)) else {
            warn!(joint, dof = joint_states.dof(), "joint index outside of the chain, constraint ignored");
            self.state.set_state(ConstraintSeverity::Normal);
            return;
        };
        self.position = q;
        self.state.set_state(self.severity_at(q_predicted));

        self.partial_values = DVector::zeros(self.dof);
        if joint < self.dof {
            self.partial_values[joint] = -self.cost_gradient(q);
        }
        trace!(joint, q, q_predicted, state = %self.state.current(), "joint limit avoidance updated");
    }

    fn state(&self) -> ConstraintState {
        self.state
    }

    fn priority_as_num(&self) -> f64 {
        self.params.priority
    }

    fn activation_gain(&self) -> f64 {
        self.params.activation_gain
    }

    fn partial_values(&self) -> DVector<f64> {
        self.partial_values.clone()
    }

    /// Largest factor in `[0, 1]` keeping `particular + k * homogeneous` within the joint
    /// velocity bound on every joint.
    fn self_motion_magnitude(&self, particular: &DVector<f64>, homogeneous: &DVector<f64>) -> f64 {
        let bound = self.params.max_velocity.abs();
        let mut k_max: f64 = 1.0;
        for (&p, &h) in particular.iter().zip(homogeneous.iter()) {
            if h.abs() <= f64::EPSILON {
                continue;
            }
            let upper = ((bound - p) / h).max((-bound - p) / h);
            k_max = k_max.min(upper);
        }
        k_max.clamp(0.0, 1.0)
    }

    /// Unit velocity on the joint toward the centre of its range.
    fn create_task(&self) -> Task {
        let centre = 0.5 * (self.params.limit_min + self.params.limit_max);
        let direction = if self.position < centre { 1.0 } else { -1.0 };
        let mut jacobian = DMatrix::zeros(1, self.dof);
        if self.params.joint < self.dof {
            jacobian[(0, self.params.joint)] = 1.0;
        }
        Task::new(self.params.task_priority, self.task_id(), jacobian, DVector::from_element(1, direction))
            .with_damping(self.damping)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn states(q: &[f64]) -> (JointStates, JointArrayVel) {
        let js = JointStates::at_rest(q);
        let predicted = JointArrayVel {
            q: js.current_q.clone(),
            q_dot: DVector::zeros(q.len()),
        };
        (js, predicted)
    }

    #[test]
    fn test_severity_by_distance() {
        let mut jla = JointLimitAvoidance::new(JointLimitParams::new(1, -1.0, 1.0), 3);
        let jacobian = DMatrix::zeros(6, 3);

        let (js, predicted) = states(&[0.0, 0.0, 0.0]);
        jla.update(&js, &predicted, &jacobian);
        assert_eq!(jla.state().current(), ConstraintSeverity::Normal);

        let (js, predicted) = states(&[0.0, 0.9, 0.0]);
        jla.update(&js, &predicted, &jacobian);
        assert_eq!(jla.state().current(), ConstraintSeverity::Danger);
        assert!(jla.state().is_transition());

        let (js, predicted) = states(&[0.0, -0.97, 0.0]);
        jla.update(&js, &predicted, &jacobian);
        assert_eq!(jla.state().current(), ConstraintSeverity::Critical);
        assert_eq!(jla.state().previous(), ConstraintSeverity::Danger);
    }

    #[test]
    fn test_gradient_points_away_from_limit() {
        let mut jla = JointLimitAvoidance::new(JointLimitParams::new(0, -1.0, 1.0), 2);
        let (js, predicted) = states(&[0.9, 0.0]);
        jla.update(&js, &predicted, &DMatrix::zeros(6, 2));
        let partial = jla.partial_values();
        assert!(partial[0] < 0.0);
        assert_eq!(partial[1], 0.0);

        let (js, predicted) = states(&[-0.9, 0.0]);
        jla.update(&js, &predicted, &DMatrix::zeros(6, 2));
        assert!(jla.partial_values()[0] > 0.0);
    }

    #[test]
    fn test_gradient_finite_beyond_limit() {
        let mut jla = JointLimitAvoidance::new(JointLimitParams::new(0, -1.0, 1.0), 1);
        let (js, predicted) = states(&[1.5]);
        jla.update(&js, &predicted, &DMatrix::zeros(6, 1));
        assert!(jla.partial_values()[0].is_finite());
        assert_eq!(jla.state().current(), ConstraintSeverity::Critical);
    }

    #[test]
    fn test_task_moves_toward_centre() {
        let mut jla = JointLimitAvoidance::new(JointLimitParams::new(2, 0.0, 2.0), 3);
        let (js, predicted) = states(&[0.0, 0.0, 1.98]);
        jla.update(&js, &predicted, &DMatrix::zeros(6, 3));
        let task = jla.create_task();
        assert_eq!(task.id, "JointLimitAvoidance_2");
        assert_eq!(task.priority, 10);
        assert_eq!(task.jacobian[(0, 2)], 1.0);
        assert_eq!(task.jacobian[(0, 0)], 0.0);
        assert_eq!(task.task[0], -1.0);
    }

    #[test]
    fn test_velocity_bound_magnitude() {
        let jla = JointLimitAvoidance::new(JointLimitParams::new(0, -1.0, 1.0), 2);
        let particular = DVector::from_vec(vec![0.5, 0.0]);

        // 0.5 + k * 1.0 <= 1.0
        let homogeneous = DVector::from_vec(vec![1.0, 0.0]);
        assert!((jla.self_motion_magnitude(&particular, &homogeneous) - 0.5).abs() < 1e-12);

        // Moving away from the bound does not limit
        let homogeneous = DVector::from_vec(vec![-0.1, 0.0]);
        assert_eq!(jla.self_motion_magnitude(&particular, &homogeneous), 1.0);

        assert_eq!(jla.self_motion_magnitude(&particular, &DVector::zeros(2)), 1.0);
    }
}
