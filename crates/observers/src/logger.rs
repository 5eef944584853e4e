use colloc_core::Observer;
use log::{Level, log};

use crate::traits::{HasInfeasibility, HasIteration, HasObjective};

/// Logs a line for every observed event and never intervenes.
///
/// Lines go to the `colloc::progress` target at [`Level::Info`] unless
/// another level is chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressLogger {
    level: Level,
    events: usize,
    best_objective: Option<f64>,
}

impl Default for ProgressLogger {
    fn default() -> Self {
        Self::new()
    }
}

impl ProgressLogger {
    #[must_use]
    pub fn new() -> Self {
        Self {
            level: Level::Info,
            events: 0,
            best_objective: None,
        }
    }

    #[must_use]
    pub fn with_level(self, level: Level) -> Self {
        Self { level, ..self }
    }

    /// Number of events observed so far.
    #[must_use]
    pub fn events(&self) -> usize {
        self.events
    }

    /// Lowest finite objective observed so far.
    #[must_use]
    pub fn best_objective(&self) -> Option<f64> {
        self.best_objective
    }
}

impl<E, A> Observer<E, A> for ProgressLogger
where
    E: HasIteration + HasObjective + HasInfeasibility,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        self.events += 1;

        let objective = event.objective();
        if objective.is_finite() && self.best_objective.is_none_or(|best| objective < best) {
            self.best_objective = Some(objective);
        }

        log!(
            target: "colloc::progress",
            self.level,
            "iteration {:>4}: objective = {objective:.9e}, infeasibility = {:.3e}",
            event.iteration(),
            event.infeasibility()
        );
        None
    }
}

/// Allows `&mut ProgressLogger` to be passed to solvers that take an observer
/// by value, so the counters can be read after the solve completes.
impl<E, A> Observer<E, A> for &mut ProgressLogger
where
    E: HasIteration + HasObjective + HasInfeasibility,
{
    fn observe(&mut self, event: &E) -> Option<A> {
        <ProgressLogger as Observer<E, A>>::observe(self, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use approx::assert_relative_eq;
    use colloc_solvers::nlp::auglag;

    fn event(iteration: usize, x: &[f64], objective: f64) -> auglag::Event<'_> {
        auglag::Event {
            iteration,
            x,
            objective,
            infeasibility: 0.0,
            optimality: 0.0,
            penalty: 10.0,
        }
    }

    #[test]
    fn tracks_events_without_acting() {
        let mut logger = ProgressLogger::new().with_level(Level::Debug);
        let x = [0.0];

        for (i, objective) in [3.0, 1.5, f64::NAN, 2.0].into_iter().enumerate() {
            let action: Option<auglag::Action> = logger.observe(&event(i + 1, &x, objective));
            assert!(action.is_none());
        }

        assert_eq!(logger.events(), 4);
        assert_relative_eq!(logger.best_objective().unwrap(), 1.5);
    }
}
