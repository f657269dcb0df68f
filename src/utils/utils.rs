//! Helper functions

extern crate nalgebra as na;
use na::{DMatrix, DVector};

use crate::kinematic_traits::Twist;
use crate::task_stack::TaskStack;

/// Twist as a dynamically sized vector, the form task targets are stored in.
pub fn twist_to_dvector(twist: &Twist) -> DVector<f64> {
    DVector::from_column_slice(twist.as_slice())
}

/// Print vector values on one line.
pub fn dump_vector(label: &str, v: &DVector<f64>) {
    let mut row_str = String::new();
    for value in v.iter() {
        row_str.push_str(&format!("{:8.4} ", value));
    }
    println!("{}: [{}]", label, row_str.trim_end());
}

/// Print joint velocities converting rad/s to deg/s.
pub fn dump_joint_velocities(q_dot: &DVector<f64>) {
    let mut row_str = String::new();
    for value in q_dot.iter() {
        row_str.push_str(&format!("{:7.2} ", value.to_degrees()));
    }
    println!("[{}] deg/s", row_str.trim_end());
}

/// Print tasks in the order they are resolved, inactive ones marked.
pub fn dump_task_stack(stack: &TaskStack) {
    if stack.is_empty() {
        println!("No tasks");
    }
    for task in stack.iter() {
        println!(
            "{:>4} {:<28} {} target: {:?}",
            task.priority,
            task.id,
            if task.is_active { "active  " } else { "inactive" },
            task.task.as_slice()
        );
    }
}

/// Selection Jacobian: one row per listed joint with 1.0 in that joint's column.
pub fn selection_jacobian(joints: &[usize], dof: usize) -> DMatrix<f64> {
    let mut jacobian = DMatrix::zeros(joints.len(), dof);
    for (row, &joint) in joints.iter().enumerate() {
        if joint < dof {
            jacobian[(row, joint)] = 1.0;
        }
    }
    jacobian
}

/// Panics with both vectors printed if they differ by more than `tolerance` in any entry.
pub fn assert_vector_eq(actual: &DVector<f64>, expected: &DVector<f64>, tolerance: f64) {
    if actual.len() != expected.len() {
        panic!("Vectors have different lengths: {} vs {}", actual.len(), expected.len());
    }
    for (i, (a, e)) in actual.iter().zip(expected.iter()).enumerate() {
        if (a - e).abs() > tolerance || !a.is_finite() {
            dump_vector("actual", actual);
            dump_vector("expected", expected);
            panic!("Vectors differ at [{}]: {} vs {}", i, a, e);
        }
    }
}
