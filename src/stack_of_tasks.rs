//! Priority based solver for several tasks with additional gradient projection.
//!
//! Every cycle the commanded Cartesian velocity becomes the main task. Constraints that are
//! critical enter the stack as tasks of their own, constraints in danger contribute a
//! priority weighted gradient that is projected into the null space left over after all
//! active tasks are resolved.

extern crate nalgebra as na;
use std::time::Instant;

use na::{DMatrix, DVector};
use tracing::{debug, trace, warn};

use crate::constraint_solver::ConstraintSolver;
use crate::constraints::{Constraint, ConstraintSet, ConstraintSeverity};
use crate::kinematic_traits::{JointArrayVel, JointStates, Twist};
use crate::parameter_error::ParameterError;
use crate::parameters::TwistControllerParams;
use crate::pseudo_inverse::{PInvBySvd, PseudoInverseCalculator};
use crate::task_stack::{Task, TaskStack};
use crate::utils::twist_to_dvector;

/// Id of the Cartesian velocity tracking task.
pub const MAIN_TASK_ID: &str = "Main task";

pub struct StackOfTasksSolver<P: PseudoInverseCalculator = PInvBySvd> {
    params: TwistControllerParams,
    pinv_calc: P,
    jacobian_data: DMatrix<f64>,
    constraints: ConstraintSet,
    task_stack: TaskStack,
    last_time: Instant,
    in_cart_vel_damping: f64,
    global_constraint_state: ConstraintSeverity,
}

impl StackOfTasksSolver<PInvBySvd> {
    /// Creates the solver. Fails if the parameters are not valid.
    pub fn new(params: TwistControllerParams) -> Result<Self, ParameterError> {
        Self::with_calculator(params, PInvBySvd)
    }
}

impl<P: PseudoInverseCalculator> StackOfTasksSolver<P> {
    pub fn with_calculator(params: TwistControllerParams, pinv_calc: P) -> Result<Self, ParameterError> {
        params.validate()?;
        let jacobian_data = DMatrix::zeros(6, params.dof);
        Ok(StackOfTasksSolver {
            params,
            pinv_calc,
            jacobian_data,
            constraints: ConstraintSet::new(),
            task_stack: TaskStack::new(),
            last_time: Instant::now(),
            in_cart_vel_damping: 1.0,
            global_constraint_state: ConstraintSeverity::Normal,
        })
    }

    pub fn params(&self) -> &TwistControllerParams {
        &self.params
    }

    pub fn jacobian_data(&self) -> &DMatrix<f64> {
        &self.jacobian_data
    }

    pub fn constraints(&self) -> &ConstraintSet {
        &self.constraints
    }

    pub fn task_stack(&self) -> &TaskStack {
        &self.task_stack
    }

    /// Highest severity over all constraints in the last cycle.
    pub fn global_constraint_state(&self) -> ConstraintSeverity {
        self.global_constraint_state
    }

    /// Divisor (squared) applied to the commanded Cartesian velocity. Always >= 1.0.
    pub fn cart_velocity_damping(&self) -> f64 {
        self.in_cart_vel_damping
    }

    /// Adds or replaces (same task id) a constraint. Takes effect from the next cycle.
    pub fn add_constraint(&mut self, constraint: Box<dyn Constraint>) {
        if let Some(old) = self.constraints.insert(constraint) {
            self.task_stack.remove_task(&old.task_id());
        }
    }

    /// Removes the constraint together with its task in the stack.
    pub fn remove_constraint(&mut self, task_id: &str) -> Option<Box<dyn Constraint>> {
        let removed = self.constraints.remove(task_id)?;
        self.task_stack.remove_task(task_id);
        Some(removed)
    }

    /// Replaces the whole constraint set. Tasks of the previous constraints are dropped.
    pub fn set_constraints(&mut self, constraints: ConstraintSet) {
        self.constraints = constraints;
        self.task_stack.retain(|t| t.id == MAIN_TASK_ID);
    }

    pub fn clear_constraints(&mut self) {
        self.set_constraints(ConstraintSet::new());
    }

    /// Solves one cycle with an explicit reading of the monotonic clock.
    /// A Jacobian without one row per twist component yields a zero command and leaves
    /// the solver state (clock, damping counter, constraints, tasks) untouched.
    pub fn solve_at(&mut self, cart_velocities: &Twist, joint_states: &JointStates, now: Instant) -> DVector<f64> {
        let dof = self.jacobian_data.ncols();
        if self.jacobian_data.nrows() != cart_velocities.len() {
            warn!(
                rows = self.jacobian_data.nrows(),
                cols = dof,
                "Jacobian does not match the twist, zero joint velocities commanded"
            );
            return DVector::zeros(dof);
        }
        self.global_constraint_state = ConstraintSeverity::Normal;

        let jacobian_pinv = self.pinv_calc.calculate(&self.params.damping, &self.jacobian_data);
        let projector = DMatrix::identity(dof, dof) - &jacobian_pinv * &self.jacobian_data;
        let particular_solution: DVector<f64> = &jacobian_pinv * cart_velocities;

        let cycle = now.saturating_duration_since(self.last_time).as_secs_f64();
        self.last_time = now;
        let predicted = predict_joint_states(joint_states, &particular_solution, cycle);

        // First pass: update the constraint states, sum up the inverse priorities of those in danger.
        let mut inv_sum_of_prios = 0.0;
        for constraint in self.constraints.iter_mut() {
            constraint.update(joint_states, &predicted, &self.jacobian_data);
            if constraint.state().current() == ConstraintSeverity::Danger {
                inv_sum_of_prios += self.params.inverse_priority(constraint.priority_as_num());
            }
        }

        // Second pass: reconcile the task stack and sum up the gradients.
        let mut sum_of_gradient = DVector::zeros(dof);
        for constraint in self.constraints.iter() {
            let severity = process_state(
                constraint,
                &self.params,
                &projector,
                &particular_solution,
                inv_sum_of_prios,
                &mut sum_of_gradient,
                &mut self.task_stack,
            );
            self.global_constraint_state = self.global_constraint_state.max(severity);
        }
        sum_of_gradient *= self.params.k_h;

        self.in_cart_vel_damping = if self.global_constraint_state == ConstraintSeverity::Critical {
            self.params.damping_start_count
        } else {
            (self.in_cart_vel_damping - 1.0).max(1.0)
        };

        let scaled_cart_velocities = cart_velocities / self.in_cart_vel_damping.powi(2);
        let main_task = Task::new(
            self.params.priority_main,
            MAIN_TASK_ID,
            self.jacobian_data.clone(),
            twist_to_dvector(&scaled_cart_velocities),
        )
        .with_damping(self.params.damping);
        self.task_stack.add_task(main_task);
        self.task_stack.activate_task(MAIN_TASK_ID);

        debug!(
            damping = self.in_cart_vel_damping,
            global_state = %self.global_constraint_state,
            cycle,
            "task output"
        );

        let (q_i, projector_i) = self.resolve_stack(dof);
        q_i + projector_i * sum_of_gradient
    }

    /// Resolves the active tasks in priority order. Each task only acts in the null space
    /// left by the tasks before it.
    fn resolve_stack(&self, dof: usize) -> (DVector<f64>, DMatrix<f64>) {
        let mut q_i = DVector::zeros(dof);
        let mut projector_i = DMatrix::identity(dof, dof);

        for task in self.task_stack.active_tasks() {
            if task.jacobian.ncols() != dof || task.jacobian.nrows() != task.task.len() {
                warn!(
                    id = %task.id,
                    rows = task.jacobian.nrows(),
                    cols = task.jacobian.ncols(),
                    target = task.task.len(),
                    dof,
                    "task dimensions do not match the chain, skipped"
                );
                continue;
            }
            trace!(id = %task.id, priority = task.priority, "resolving task");
            let j_temp = &task.jacobian * &projector_i;
            let j_temp_inv = self.pinv_calc.calculate(&task.damping, &j_temp);
            let correction = &j_temp_inv * (&task.task - &task.jacobian * &q_i);
            q_i += correction;
            projector_i -= &j_temp_inv * &j_temp;
        }
        (q_i, projector_i)
    }
}

impl<P: PseudoInverseCalculator> ConstraintSolver for StackOfTasksSolver<P> {
    fn set_jacobian_data(&mut self, jacobian: DMatrix<f64>) {
        self.jacobian_data = jacobian;
    }

    fn solve(&mut self, cart_velocities: &Twist, joint_states: &JointStates) -> DVector<f64> {
        self.solve_at(cart_velocities, joint_states, Instant::now())
    }
}

/// Joint state expected after `cycle` seconds when moving with the particular solution.
fn predict_joint_states(joint_states: &JointStates, particular_solution: &DVector<f64>, cycle: f64) -> JointArrayVel {
    let mut predicted = JointArrayVel {
        q: joint_states.current_q.clone(),
        q_dot: DVector::zeros(joint_states.current_q.len()),
    };
    for (i, &velocity) in particular_solution.iter().enumerate().take(predicted.q.len()) {
        predicted.q[i] += velocity * cycle;
        predicted.q_dot[i] = velocity;
    }
    predicted
}

/// Applies the severity state of one constraint to the task stack and the gradient sum.
/// Returns the current severity.
fn process_state(
    constraint: &dyn Constraint,
    params: &TwistControllerParams,
    projector: &DMatrix<f64>,
    particular_solution: &DVector<f64>,
    inv_sum_of_prios: f64,
    sum_of_gradient: &mut DVector<f64>,
    task_stack: &mut TaskStack,
) -> ConstraintSeverity {
    let state = constraint.state();
    let current = state.current();
    let task_id = constraint.task_id();

    let partial_values = constraint.partial_values();
    let activation_gain = constraint.activation_gain();
    let homogeneous_solution = if partial_values.len() == projector.ncols() {
        projector * &partial_values
    } else {
        DVector::zeros(projector.nrows())
    };
    let magnitude = constraint.self_motion_magnitude(particular_solution, &homogeneous_solution);

    match current {
        ConstraintSeverity::Critical => {
            let mut task = constraint.create_task();
            task.task *= activation_gain * magnitude.abs();
            task_stack.add_task(task);
            if state.is_transition() {
                task_stack.activate_task(&task_id);
            }
        }
        ConstraintSeverity::Danger => {
            if state.is_transition() {
                task_stack.deactivate_task(&task_id);
            }
            if inv_sum_of_prios > 0.0 && partial_values.len() == sum_of_gradient.len() {
                let gpm_weighting = params.inverse_priority(constraint.priority_as_num()) / inv_sum_of_prios;
                *sum_of_gradient += gpm_weighting * activation_gain * magnitude * partial_values;
            }
        }
        ConstraintSeverity::Normal => {
            if state.is_transition() {
                task_stack.deactivate_task(&task_id);
            }
        }
    }
    trace!(id = %task_id, state = %current, transition = state.is_transition(), magnitude, "constraint processed");
    current
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::DampingParams;
    use std::time::Duration;

    fn identity_solver() -> StackOfTasksSolver {
        let mut params = TwistControllerParams::new(6);
        params.damping = DampingParams::undamped();
        let mut solver = StackOfTasksSolver::new(params).expect("valid parameters");
        solver.set_jacobian_data(DMatrix::identity(6, 6));
        solver
    }

    #[test]
    fn test_invalid_params_rejected() {
        assert!(StackOfTasksSolver::new(TwistControllerParams::new(0)).is_err());
    }

    #[test]
    fn test_main_task_present_once() {
        let mut solver = identity_solver();
        let js = JointStates::zeros(6);
        let start = Instant::now();
        for i in 0..3 {
            solver.solve_at(&Twist::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0), &js, start + Duration::from_millis(10 * i));
        }
        assert_eq!(solver.task_stack().len(), 1);
        let main = solver.task_stack().get(MAIN_TASK_ID).expect("main task");
        assert!(main.is_active);
        assert_eq!(main.priority, solver.params().priority_main);
    }

    #[test]
    fn test_wrong_jacobian_shape_gives_zero_command() {
        let mut solver = identity_solver();
        let js = JointStates::zeros(6);
        let start = Instant::now();
        solver.solve_at(&Twist::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0), &js, start);

        solver.set_jacobian_data(DMatrix::identity(3, 3));
        let q_dot = solver.solve_at(&Twist::new(0.1, 0.2, 0.3, 0.0, 0.0, 0.0), &JointStates::zeros(3), start + Duration::from_millis(10));
        assert_eq!(q_dot, DVector::zeros(3));
        assert_eq!(solver.cart_velocity_damping(), 1.0);
        assert_eq!(solver.task_stack().len(), 1);

        // Back to a valid chain: solving resumes
        solver.set_jacobian_data(DMatrix::identity(6, 6));
        let q_dot = solver.solve_at(&Twist::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0), &js, start + Duration::from_millis(20));
        assert!((q_dot[0] - 0.1).abs() < 1e-9);
    }

    #[test]
    fn test_prediction_uses_particular_solution() {
        let js = JointStates::at_rest(&[1.0, 2.0]);
        let particular = DVector::from_vec(vec![0.5, -1.0]);
        let predicted = predict_joint_states(&js, &particular, 0.1);
        assert!((predicted.q[0] - 1.05).abs() < 1e-12);
        assert!((predicted.q[1] - 1.9).abs() < 1e-12);
        assert_eq!(predicted.q_dot, particular);
    }

    #[test]
    fn test_clock_going_backwards_predicts_no_motion() {
        let mut solver = identity_solver();
        let js = JointStates::zeros(6);
        let now = Instant::now();
        solver.solve_at(&Twist::zeros(), &js, now + Duration::from_secs(1));
        // Earlier than the previous reading: elapsed time saturates at zero
        let q_dot = solver.solve_at(&Twist::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0), &js, now);
        assert!(q_dot.iter().all(|v| v.is_finite()));
        assert!((q_dot[0] - 1.0).abs() < 1e-9);
    }
}
