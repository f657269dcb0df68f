//! Common interface of the differential inverse kinematics solvers.

extern crate nalgebra as na;
use na::{DMatrix, DVector};
use tracing::warn;

use crate::kinematic_traits::{JointStates, Twist};
use crate::parameters::TwistControllerParams;
use crate::pseudo_inverse::{PInvBySvd, PseudoInverseCalculator};

/// Maps a commanded Cartesian velocity to a joint velocity command, once per control cycle.
pub trait ConstraintSolver {
    /// Jacobian of the chain (possibly adjusted by a kinematic extension) for the next cycle.
    fn set_jacobian_data(&mut self, jacobian: DMatrix<f64>);

    fn solve(&mut self, cart_velocities: &Twist, joint_states: &JointStates) -> DVector<f64>;
}

/// Plain damped pseudo-inverse solution `J^+ * v` without any constraints.
pub struct UnconstraintSolver<P: PseudoInverseCalculator = PInvBySvd> {
    params: TwistControllerParams,
    pinv_calc: P,
    jacobian_data: DMatrix<f64>,
}

impl UnconstraintSolver<PInvBySvd> {
    pub fn new(params: TwistControllerParams) -> Self {
        Self::with_calculator(params, PInvBySvd)
    }
}

impl<P: PseudoInverseCalculator> UnconstraintSolver<P> {
    pub fn with_calculator(params: TwistControllerParams, pinv_calc: P) -> Self {
        let jacobian_data = DMatrix::zeros(6, params.dof);
        UnconstraintSolver { params, pinv_calc, jacobian_data }
    }
}

impl<P: PseudoInverseCalculator> ConstraintSolver for UnconstraintSolver<P> {
    fn set_jacobian_data(&mut self, jacobian: DMatrix<f64>) {
        self.jacobian_data = jacobian;
    }

    fn solve(&mut self, cart_velocities: &Twist, _joint_states: &JointStates) -> DVector<f64> {
        if self.jacobian_data.nrows() != cart_velocities.len() {
            warn!(rows = self.jacobian_data.nrows(), "Jacobian does not match the twist, zero joint velocities commanded");
            return DVector::zeros(self.jacobian_data.ncols());
        }
        let pinv = self.pinv_calc.calculate(&self.params.damping, &self.jacobian_data);
        pinv * cart_velocities
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parameters::DampingParams;

    #[test]
    fn test_redundant_chain_tracks_twist() {
        let mut params = TwistControllerParams::new(7);
        params.damping = DampingParams::undamped();
        let mut solver = UnconstraintSolver::new(params);

        let mut jacobian = DMatrix::zeros(6, 7);
        for i in 0..6 {
            jacobian[(i, i)] = 1.0;
        }
        jacobian[(0, 6)] = 1.0;
        solver.set_jacobian_data(jacobian.clone());

        let twist = Twist::new(0.2, -0.1, 0.0, 0.0, 0.05, 0.0);
        let q_dot = solver.solve(&twist, &JointStates::zeros(7));
        assert_eq!(q_dot.len(), 7);
        let achieved = &jacobian * &q_dot;
        for i in 0..6 {
            assert!((achieved[i] - twist[i]).abs() < 1e-9);
        }
        // Minimum norm: the redundant joint shares the x motion with joint 0
        assert!((q_dot[0] - q_dot[6]).abs() < 1e-9);
    }

    #[test]
    fn test_wrong_jacobian_shape_gives_zero_command() {
        let mut solver = UnconstraintSolver::new(TwistControllerParams::new(4));
        solver.set_jacobian_data(DMatrix::identity(4, 4));
        let q_dot = solver.solve(&Twist::new(1.0, 0.0, 0.0, 0.0, 0.0, 0.0), &JointStates::zeros(4));
        assert_eq!(q_dot, DVector::zeros(4));
    }
}
