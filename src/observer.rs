//! Step observer trait for monitoring simulation progress.

/// Hooks called by the cloth, particle and shape-matching steppers.
///
/// All methods have default no-op implementations, so an observer only
/// implements what it cares about (profiling, debug drawing, tests).
pub trait StepObserver {
    /// Called after forces have been integrated into velocities and positions.
    fn on_integrate(&mut self) {}

    /// Called after each constraint projection pass.
    fn on_constraint_iteration(&mut self, _iteration: usize) {}

    /// Called when a step is fully complete.
    fn on_step_complete(&mut self) {}
}

/// Observer that does nothing. Use when no observation is needed.
pub struct NoOpStepObserver;

impl StepObserver for NoOpStepObserver {}

/// Observer that forwards every hook to `log::trace!` and counts steps.
#[derive(Debug, Default)]
pub struct LoggingObserver {
    pub steps: usize,
}

impl StepObserver for LoggingObserver {
    fn on_integrate(&mut self) {
        log::trace!("step {}: integrated", self.steps);
    }

    fn on_constraint_iteration(&mut self, iteration: usize) {
        log::trace!("step {}: constraint pass {}", self.steps, iteration);
    }

    fn on_step_complete(&mut self) {
        log::trace!("step {}: complete", self.steps);
        self.steps += 1;
    }
}
