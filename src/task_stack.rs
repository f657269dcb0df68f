//! Priority ordered stack of tasks resolved by the stack-of-tasks solver

extern crate nalgebra as na;
use na::{DMatrix, DVector};
use tracing::trace;

use crate::parameters::DampingParams;

/// A (Jacobian, target velocity) pair the solver must satisfy as well as possible without
/// disturbing tasks of higher priority. Lower priority numbers are resolved first.
#[derive(Debug, Clone, PartialEq)]
pub struct Task {
    /// Unique id, also used as the display name in logs.
    pub id: String,

    /// Priority rank, lower numbers are more important.
    pub priority: u32,

    /// Task Jacobian, one column per joint.
    pub jacobian: DMatrix<f64>,

    /// Target velocity in the task space, length equals the Jacobian rows.
    pub task: DVector<f64>,

    /// Damping used when this task's projected Jacobian is inverted.
    pub damping: DampingParams,

    pub is_active: bool,
}

impl Task {
    /// New active task with default damping.
    pub fn new(priority: u32, id: impl Into<String>, jacobian: DMatrix<f64>, task: DVector<f64>) -> Self {
        Task {
            id: id.into(),
            priority,
            jacobian,
            task,
            damping: DampingParams::default(),
            is_active: true,
        }
    }

    pub fn with_damping(mut self, damping: DampingParams) -> Self {
        self.damping = damping;
        self
    }
}

/// Tasks ordered by priority. Tasks with equal priority keep insertion order.
#[derive(Debug, Clone, Default)]
pub struct TaskStack {
    tasks: Vec<Task>,
}

impl TaskStack {
    pub fn new() -> Self {
        TaskStack { tasks: Vec::new() }
    }

    /// Adds the task in its priority slot. If a task with the same id is already present,
    /// its Jacobian, target and damping are refreshed in place; slot and active flag stay.
    pub fn add_task(&mut self, task: Task) {
        if let Some(existing) = self.tasks.iter_mut().find(|t| t.id == task.id) {
            existing.jacobian = task.jacobian;
            existing.task = task.task;
            existing.damping = task.damping;
            return;
        }
        let slot = self
            .tasks
            .iter()
            .position(|t| task.priority < t.priority)
            .unwrap_or(self.tasks.len());
        trace!(id = %task.id, priority = task.priority, slot, "task added");
        self.tasks.insert(slot, task);
    }

    /// Returns true if the task is known.
    pub fn activate_task(&mut self, id: &str) -> bool {
        self.set_active(id, true)
    }

    /// Returns true if the task is known. Unknown ids are ignored.
    pub fn deactivate_task(&mut self, id: &str) -> bool {
        self.set_active(id, false)
    }

    fn set_active(&mut self, id: &str, active: bool) -> bool {
        match self.tasks.iter_mut().find(|t| t.id == id) {
            Some(task) => {
                task.is_active = active;
                true
            }
            None => false,
        }
    }

    pub fn activate_all_tasks(&mut self) {
        self.tasks.iter_mut().for_each(|t| t.is_active = true);
    }

    pub fn deactivate_all_tasks(&mut self) {
        self.tasks.iter_mut().for_each(|t| t.is_active = false);
    }

    /// Activates the first task (highest priority), leaves the others as they are.
    pub fn activate_highest_prio_task(&mut self) {
        if let Some(first) = self.tasks.first_mut() {
            first.is_active = true;
        }
    }

    pub fn remove_task(&mut self, id: &str) -> Option<Task> {
        let index = self.tasks.iter().position(|t| t.id == id)?;
        Some(self.tasks.remove(index))
    }

    /// Removes all tasks except those for which `keep` returns true.
    pub fn retain(&mut self, keep: impl FnMut(&Task) -> bool) {
        self.tasks.retain(keep);
    }

    pub fn clear_all_tasks(&mut self) {
        self.tasks.clear();
    }

    pub fn get(&self, id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    /// Active tasks in ascending priority number (most important first).
    pub fn active_tasks(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter().filter(|t| t.is_active)
    }

    /// All tasks in priority order, active or not.
    pub fn iter(&self) -> impl Iterator<Item = &Task> {
        self.tasks.iter()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }
}
