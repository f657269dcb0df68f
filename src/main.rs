use std::path::PathBuf;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Parser;
use nalgebra::{DMatrix, DVector};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use rs_twist_controller::joint_limit_avoidance::{JointLimitAvoidance, JointLimitParams};
use rs_twist_controller::kinematic_traits::{JointStates, Twist};
use rs_twist_controller::parameters::TwistControllerParams;
use rs_twist_controller::twist_controller::TwistController;
use rs_twist_controller::utils::{dump_joint_velocities, dump_task_stack, dump_vector};

const DOF: usize = 7;

#[derive(Parser)]
#[command(name = "sot_demo")]
#[command(about = "Drives a redundant 7 joint chain into a joint limit and shows the avoidance")]
struct Cmd {
    /// Controller parameters (YAML). Defaults are used if not given.
    #[arg(long)]
    config: Option<PathBuf>,

    #[arg(long, default_value_t = 200)]
    cycles: usize,

    /// Cycle time in milliseconds
    #[arg(long, default_value_t = 10)]
    period_ms: u64,
}

/// Jacobian of the demo chain: joints 0..6 map onto the twist axes, the last joint
/// moves along x as well.
fn chain_jacobian() -> DMatrix<f64> {
    DMatrix::from_fn(6, DOF, |r, c| if r == c || (r == 0 && c == DOF - 1) { 1.0 } else { 0.0 })
}

fn main() -> Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    let cmd = Cmd::parse();
    let params = match &cmd.config {
        Some(path) => TwistControllerParams::from_yaml_file(path)
            .with_context(|| format!("Failed to load parameters from {}", path.display()))?,
        None => TwistControllerParams::new(DOF),
    };
    if params.dof != DOF {
        bail!("The demo chain has {} joints, configuration is for {}", DOF, params.dof);
    }

    let mut controller = TwistController::new(params).context("Invalid controller parameters")?;
    let mut limit = JointLimitParams::new(DOF - 1, -0.5, 0.5);
    limit.max_velocity = 0.5;
    controller.add_constraint(Box::new(JointLimitAvoidance::new(limit, DOF)));

    let jacobian = chain_jacobian();
    let twist = Twist::new(0.2, 0.0, 0.0, 0.0, 0.0, 0.05);
    let period = Duration::from_millis(cmd.period_ms);
    let dt = period.as_secs_f64();

    let mut joint_states = JointStates::zeros(DOF);
    for cycle in 0..cmd.cycles {
        let q_dot = controller.cycle(&twist, &joint_states, &jacobian);
        let q: DVector<f64> = &joint_states.current_q + &q_dot * dt;
        joint_states.advance(q, q_dot.clone());

        if cycle % 20 == 0 {
            info!(
                cycle,
                state = %controller.solver().global_constraint_state(),
                damping = controller.solver().cart_velocity_damping(),
                "cycle"
            );
            dump_vector("q", &joint_states.current_q);
            dump_joint_velocities(&q_dot);
        }
        std::thread::sleep(period);
    }

    println!("Task stack after {} cycles:", cmd.cycles);
    dump_task_stack(controller.solver().task_stack());
    dump_vector("achieved twist", &(&jacobian * &joint_states.current_q_dot));
    Ok(())
}
