//! Constraint interface, severity state machine and the ordered constraint set

extern crate nalgebra as na;
use std::cmp::Ordering;
use std::fmt;

use na::{DMatrix, DVector};

use crate::kinematic_traits::{JointArrayVel, JointStates};
use crate::task_stack::Task;

/// How close a constraint is to requiring corrective action.
/// The order `Normal < Danger < Critical` is used for max-reduction over all constraints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum ConstraintSeverity {
    #[default]
    Normal,
    Danger,
    Critical,
}

impl fmt::Display for ConstraintSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ConstraintSeverity::Normal => "NORMAL",
            ConstraintSeverity::Danger => "DANGER",
            ConstraintSeverity::Critical => "CRITICAL",
        };
        f.write_str(name)
    }
}

/// Current and previous severity of a constraint. Owned by the constraint and shifted
/// exactly once per cycle from its `update`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ConstraintState {
    current: ConstraintSeverity,
    previous: ConstraintSeverity,
}

impl ConstraintState {
    pub fn new(current: ConstraintSeverity, previous: ConstraintSeverity) -> Self {
        ConstraintState { current, previous }
    }

    /// Moves the current severity into the previous one and stores the new severity.
    pub fn set_state(&mut self, next: ConstraintSeverity) {
        self.previous = self.current;
        self.current = next;
    }

    pub fn current(&self) -> ConstraintSeverity {
        self.current
    }

    pub fn previous(&self) -> ConstraintSeverity {
        self.previous
    }

    pub fn is_transition(&self) -> bool {
        self.current != self.previous
    }
}

/// A secondary objective (joint limit avoidance and alike) evaluated every cycle.
///
/// The solver calls [`Constraint::update`] exactly once per cycle and only reads the
/// constraint afterwards. How the severity is derived from the joint state is up to
/// the implementation.
pub trait Constraint {
    /// Id of the task this constraint creates while critical. Unique within a constraint set.
    fn task_id(&self) -> String;

    /// Evaluates the constraint for the current and the predicted joint state and
    /// shifts its severity state.
    fn update(&mut self, joint_states: &JointStates, predicted: &JointArrayVel, jacobian: &DMatrix<f64>);

    fn state(&self) -> ConstraintState;

    /// Priority as a number. Used as divisor for the gradient weighting, may be zero.
    fn priority_as_num(&self) -> f64;

    fn activation_gain(&self) -> f64;

    /// Unscaled self-motion direction (gradient of the constraint cost), one entry per joint.
    fn partial_values(&self) -> DVector<f64>;

    /// Scalar weight of the self-motion given the particular solution and
    /// the homogeneous solution (partial values projected into the null space).
    fn self_motion_magnitude(&self, particular: &DVector<f64>, homogeneous: &DVector<f64>) -> f64;

    /// Task representing this constraint in the stack of tasks.
    fn create_task(&self) -> Task;
}

struct Entry {
    priority: f64,
    task_id: String,
    constraint: Box<dyn Constraint>,
}

impl Entry {
    fn key_cmp(&self, priority: f64, task_id: &str) -> Ordering {
        self.priority
            .total_cmp(&priority)
            .then_with(|| self.task_id.as_str().cmp(task_id))
    }
}

/// Constraints ordered by (priority number, task id). The order is fixed at insertion
/// so that the gradient weighting is reproducible from cycle to cycle.
#[derive(Default)]
pub struct ConstraintSet {
    entries: Vec<Entry>,
}

impl ConstraintSet {
    pub fn new() -> Self {
        ConstraintSet { entries: Vec::new() }
    }

    /// Inserts the constraint at its ordered position. A constraint with the same task id
    /// is replaced and returned.
    pub fn insert(&mut self, constraint: Box<dyn Constraint>) -> Option<Box<dyn Constraint>> {
        let task_id = constraint.task_id();
        let replaced = self.remove(&task_id);
        let priority = constraint.priority_as_num();
        let slot = self
            .entries
            .partition_point(|e| e.key_cmp(priority, &task_id) == Ordering::Less);
        self.entries.insert(slot, Entry { priority, task_id, constraint });
        replaced
    }

    pub fn remove(&mut self, task_id: &str) -> Option<Box<dyn Constraint>> {
        let index = self.entries.iter().position(|e| e.task_id == task_id)?;
        Some(self.entries.remove(index).constraint)
    }

    pub fn iter(&self) -> impl Iterator<Item = &dyn Constraint> {
        self.entries.iter().map(|e| e.constraint.as_ref())
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Box<dyn Constraint>> {
        self.entries.iter_mut().map(|e| &mut e.constraint)
    }

    pub fn task_ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.task_id.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl FromIterator<Box<dyn Constraint>> for ConstraintSet {
    fn from_iter<I: IntoIterator<Item = Box<dyn Constraint>>>(iter: I) -> Self {
        let mut set = ConstraintSet::new();
        for constraint in iter {
            set.insert(constraint);
        }
        set
    }
}

impl fmt::Debug for ConstraintSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.entries.iter().map(|e| (&e.task_id, e.priority)))
            .finish()
    }
}
