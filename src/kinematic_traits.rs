//! Joint state and velocity types shared by the solvers and constraints

extern crate nalgebra as na;
use na::{DMatrix, DVector, Vector6};

/// Cartesian velocity (twist) of the tracked frame: linear x, y, z followed by angular x, y, z.
/// ```
/// use rs_twist_controller::kinematic_traits::Twist;
///
/// // 0.1 m/s along x, no rotation
/// let twist = Twist::new(0.1, 0.0, 0.0, 0.0, 0.0, 0.0);
/// assert_eq!(twist[0], 0.1);
/// ```
pub type Twist = Vector6<f64>;

/// Jacobian with one column per joint. The main task uses 6 rows, constraint tasks
/// have as many rows as their task vector.
pub type Jacobian = DMatrix<f64>;

/// Joint positions and velocities of the chain, as estimated by the caller.
/// All vectors have the same length (degrees of freedom of the chain).
#[derive(Debug, Clone, PartialEq)]
pub struct JointStates {
    pub current_q: DVector<f64>,
    pub last_q: DVector<f64>,
    pub current_q_dot: DVector<f64>,
    pub last_q_dot: DVector<f64>,
}

impl JointStates {
    /// Joint states of a chain at rest at the given positions.
    pub fn at_rest(positions: &[f64]) -> Self {
        let q = DVector::from_column_slice(positions);
        let zero = DVector::zeros(positions.len());
        JointStates {
            current_q: q.clone(),
            last_q: q,
            current_q_dot: zero.clone(),
            last_q_dot: zero,
        }
    }

    /// All joints at zero position, not moving.
    pub fn zeros(dof: usize) -> Self {
        Self::at_rest(&vec![0.0; dof])
    }

    /// Number of joints.
    pub fn dof(&self) -> usize {
        self.current_q.len()
    }

    /// Shifts the current values into `last_*` and stores the new readings.
    pub fn advance(&mut self, q: DVector<f64>, q_dot: DVector<f64>) {
        self.last_q = std::mem::replace(&mut self.current_q, q);
        self.last_q_dot = std::mem::replace(&mut self.current_q_dot, q_dot);
    }
}

/// Joint positions together with joint velocities. The solver uses it for the
/// look-ahead state handed to the constraints.
#[derive(Debug, Clone, PartialEq)]
pub struct JointArrayVel {
    pub q: DVector<f64>,
    pub q_dot: DVector<f64>,
}

impl JointArrayVel {
    pub fn zeros(dof: usize) -> Self {
        JointArrayVel {
            q: DVector::zeros(dof),
            q_dot: DVector::zeros(dof),
        }
    }
}
