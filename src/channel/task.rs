use core::fmt;

/// Why a scheduled task is being invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// The task reached its scheduled time.
    Run,
    /// The event loop is going away; the task must only clean up.
    Canceled,
}

/// A unit of work enqueued onto a channel's event loop.
///
/// The name is diagnostic only; it shows up in scheduling traces.
pub struct Task {
    name: &'static str,
    thunk: Box<dyn FnOnce(TaskStatus)>,
}

impl Task {
    pub fn new(name: &'static str, thunk: impl FnOnce(TaskStatus) + 'static) -> Self {
        Self {
            name,
            thunk: Box::new(thunk),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Consume the task and run it.
    pub fn run(self, status: TaskStatus) {
        (self.thunk)(status);
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task").field("name", &self.name).finish()
    }
}
