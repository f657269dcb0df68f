//! Control loop glue: kinematic extension, stack-of-tasks solver, extension side effects.

extern crate nalgebra as na;
use na::{DMatrix, DVector};
use tracing::info;

use crate::constraint_solver::ConstraintSolver;
use crate::constraints::Constraint;
use crate::kinematic_extension::KinematicExtension;
use crate::kinematic_traits::{JointStates, Twist};
use crate::parameter_error::ParameterError;
use crate::parameters::TwistControllerParams;
use crate::stack_of_tasks::StackOfTasksSolver;

pub struct TwistController {
    extension: KinematicExtension,
    solver: StackOfTasksSolver,
}

impl TwistController {
    /// Validates the parameters and builds the extension and the solver.
    pub fn new(params: TwistControllerParams) -> Result<Self, ParameterError> {
        let extension = KinematicExtension::from_params(&params);
        let solver = StackOfTasksSolver::new(params)?;
        info!(
            dof = solver.params().dof,
            base_active = solver.params().base_active,
            "twist controller initialized"
        );
        Ok(TwistController { extension, solver })
    }

    pub fn add_constraint(&mut self, constraint: Box<dyn Constraint>) {
        self.solver.add_constraint(constraint);
    }

    /// One control cycle: adjusts the chain Jacobian, solves, hands the result to the extension.
    pub fn cycle(&mut self, cart_velocities: &Twist, joint_states: &JointStates, jacobian_chain: &DMatrix<f64>) -> DVector<f64> {
        let jacobian = self.extension.adjust_jacobian(jacobian_chain);
        self.solver.set_jacobian_data(jacobian);
        let q_dot = self.solver.solve(cart_velocities, joint_states);
        self.extension.process_result_extension(&q_dot);
        q_dot
    }

    pub fn solver(&self) -> &StackOfTasksSolver {
        &self.solver
    }

    pub fn solver_mut(&mut self) -> &mut StackOfTasksSolver {
        &mut self.solver
    }

    pub fn extension(&self) -> &KinematicExtension {
        &self.extension
    }
}
