//! Extension of the kinematic chain with additional degrees of freedom, e.g. an actuated base.
//!
//! The surrounding control loop calls [`KinematicExtension::adjust_jacobian`] once per cycle
//! before solving and [`KinematicExtension::process_result_extension`] once after.

extern crate nalgebra as na;
use na::{DMatrix, DVector, Vector6};
use tracing::debug;

use crate::parameters::TwistControllerParams;

/// Actuated base carrying the chain. The chain Jacobian is used as is; when the solution
/// carries six entries past the chain joints they are taken as the base twist.
#[derive(Debug, Clone, PartialEq)]
pub struct BaseActiveExtension {
    dof: usize,
    last_base_velocity: Option<Vector6<f64>>,
}

impl BaseActiveExtension {
    pub fn new(dof: usize) -> Self {
        BaseActiveExtension { dof, last_base_velocity: None }
    }

    /// Base twist extracted from the last processed solution, if it had one.
    pub fn last_base_velocity(&self) -> Option<&Vector6<f64>> {
        self.last_base_velocity.as_ref()
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
pub enum KinematicExtension {
    #[default]
    None,
    BaseActive(BaseActiveExtension),
}

impl KinematicExtension {
    /// Selects the extension once from the configuration.
    pub fn from_params(params: &TwistControllerParams) -> Self {
        if params.base_active {
            KinematicExtension::BaseActive(BaseActiveExtension::new(params.dof))
        } else {
            KinematicExtension::None
        }
    }

    pub fn adjust_jacobian(&self, jacobian_chain: &DMatrix<f64>) -> DMatrix<f64> {
        match self {
            KinematicExtension::None => jacobian_chain.clone(),
            KinematicExtension::BaseActive(_) => jacobian_chain.clone(),
        }
    }

    pub fn process_result_extension(&mut self, q_dot_ik: &DVector<f64>) {
        match self {
            KinematicExtension::None => {}
            KinematicExtension::BaseActive(base) => {
                base.last_base_velocity = if q_dot_ik.len() >= base.dof + 6 {
                    let twist = Vector6::from_iterator(q_dot_ik.iter().skip(base.dof).take(6).cloned());
                    debug!(
                        linear_x = twist[0], linear_y = twist[1], linear_z = twist[2],
                        angular_x = twist[3], angular_y = twist[4], angular_z = twist[5],
                        "base velocity"
                    );
                    Some(twist)
                } else {
                    None
                };
            }
        }
    }

    /// Base twist of the last cycle, `None` for the plain chain.
    pub fn last_base_velocity(&self) -> Option<&Vector6<f64>> {
        match self {
            KinematicExtension::None => None,
            KinematicExtension::BaseActive(base) => base.last_base_velocity(),
        }
    }
}
