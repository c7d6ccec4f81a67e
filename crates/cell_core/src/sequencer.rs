//! Queue of timed charge/discharge/idle operations.
//!
//! Tasks run strictly in queued order, one at a time. Elapsed time is
//! measured against the simulation clock passed in by the caller.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{CoreError, OperatingMode};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum TaskKind {
    /// Constant-current charge up to a constant-voltage setpoint.
    ConstantCurrentConstantVoltage { current_a: f64, cv_voltage_v: f64 },
    /// Constant-current discharge down to a cut-off voltage.
    ConstantCurrentDischarge { current_a: f64, cutoff_voltage_v: f64 },
    Idle,
}

impl TaskKind {
    pub fn label(&self) -> &'static str {
        match self {
            Self::ConstantCurrentConstantVoltage { .. } => "CC_CV",
            Self::ConstantCurrentDischarge { .. } => "CC_CD",
            Self::Idle => "IDLE",
        }
    }

    pub fn mode(&self) -> OperatingMode {
        match self {
            Self::ConstantCurrentConstantVoltage { .. } => OperatingMode::Charging,
            Self::ConstantCurrentDischarge { .. } => OperatingMode::Discharging,
            Self::Idle => OperatingMode::Idle,
        }
    }
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ConstantCurrentConstantVoltage {
                current_a,
                cv_voltage_v,
            } => write!(f, "CC_CV {current_a:.1} A -> {cv_voltage_v:.2} V"),
            Self::ConstantCurrentDischarge {
                current_a,
                cutoff_voltage_v,
            } => write!(f, "CC_CD {current_a:.1} A -> {cutoff_voltage_v:.2} V"),
            Self::Idle => f.write_str("IDLE"),
        }
    }
}

/// A queued operation. Only constructible with a positive, finite duration.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Task {
    kind: TaskKind,
    duration_s: f64,
    completed: bool,
}

impl Task {
    pub fn new(kind: TaskKind, duration_s: f64) -> Result<Self, CoreError> {
        if !duration_s.is_finite() || duration_s <= 0.0 {
            return Err(CoreError::InvalidTaskDuration(duration_s));
        }
        Ok(Self {
            kind,
            duration_s,
            completed: false,
        })
    }

    pub fn kind(&self) -> &TaskKind {
        &self.kind
    }

    pub fn duration_s(&self) -> f64 {
        self.duration_s
    }

    /// Monotonic: once set, only [`TaskSequencer::clear`] removes it.
    pub fn is_completed(&self) -> bool {
        self.completed
    }
}

impl fmt::Display for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}s)", self.kind, self.duration_s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub enum SequencerPhase {
    /// Empty queue, or a queue that has not been started.
    Idle,
    Running { step_index: usize, elapsed_s: f64 },
    /// Every task has completed and the run index is back at 0.
    Completed,
}

/// What one call to [`TaskSequencer::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Advanced { completed: usize, next: usize },
    Finished { completed: usize },
}

/// The operation the tick updater applies this tick.
#[derive(Debug, Clone, PartialEq)]
pub struct ActiveOperation {
    pub kind: TaskKind,
    pub duration_s: f64,
    /// `None` for the implicit idle of an empty or exhausted queue.
    pub step_index: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct TaskSequencer {
    tasks: Vec<Task>,
    step_index: usize,
    task_started_at: Option<f64>,
}

impl TaskSequencer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn step_index(&self) -> usize {
        self.step_index
    }

    pub fn task_started_at(&self) -> Option<f64> {
        self.task_started_at
    }

    /// Validate and append. Returns the new task's queue index; the queue is
    /// untouched on error.
    pub fn enqueue(&mut self, kind: TaskKind, duration_s: f64) -> Result<usize, CoreError> {
        let task = Task::new(kind, duration_s)?;
        self.tasks.push(task);
        Ok(self.tasks.len() - 1)
    }

    /// Drop every task and reset indices, regardless of run state.
    pub fn clear(&mut self) {
        self.tasks.clear();
        self.step_index = 0;
        self.task_started_at = None;
    }

    /// Start the task at the current index if none is active. Returns `true`
    /// when a task was started.
    pub fn begin(&mut self, now_s: f64) -> bool {
        if self.tasks.is_empty() || self.task_started_at.is_some() {
            return false;
        }
        self.task_started_at = Some(now_s);
        true
    }

    /// Complete the active task once its duration has elapsed.
    pub fn advance(&mut self, now_s: f64) -> Option<StepOutcome> {
        let started = self.task_started_at?;
        let task = self.tasks.get_mut(self.step_index)?;
        if now_s - started < task.duration_s {
            return None;
        }
        task.completed = true;
        let completed = self.step_index;
        self.step_index += 1;

        if self.step_index >= self.tasks.len() {
            self.step_index = 0;
            self.task_started_at = None;
            Some(StepOutcome::Finished { completed })
        } else {
            self.task_started_at = Some(now_s);
            Some(StepOutcome::Advanced {
                completed,
                next: self.step_index,
            })
        }
    }

    /// The task at the current index, or an idle operation of
    /// `default_idle_s` when the queue is empty.
    pub fn active_operation(&self, default_idle_s: f64) -> ActiveOperation {
        match self.tasks.get(self.step_index) {
            Some(task) => ActiveOperation {
                kind: task.kind.clone(),
                duration_s: task.duration_s,
                step_index: Some(self.step_index),
            },
            None => ActiveOperation {
                kind: TaskKind::Idle,
                duration_s: default_idle_s,
                step_index: None,
            },
        }
    }

    pub fn phase(&self, now_s: f64) -> SequencerPhase {
        match self.task_started_at {
            Some(started) => SequencerPhase::Running {
                step_index: self.step_index,
                elapsed_s: now_s - started,
            },
            None if !self.tasks.is_empty() && self.tasks.iter().all(Task::is_completed) => {
                SequencerPhase::Completed
            }
            None => SequencerPhase::Idle,
        }
    }
}
