use std::future::Future;
use std::time::Duration;

/// Result of racing an operation against a deadline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RaceOutcome<T> {
    Completed(T),
    TimedOut,
}

impl<T> RaceOutcome<T> {
    pub fn timed_out(&self) -> bool {
        matches!(self, RaceOutcome::TimedOut)
    }
}

/// Run `op` with a hard time budget. The losing branch is dropped, so a
/// timed-out operation is cancelled rather than left running.
pub async fn with_deadline<F: Future>(op: F, budget: Duration) -> RaceOutcome<F::Output> {
    tokio::select! {
        value = op => RaceOutcome::Completed(value),
        _ = tokio::time::sleep(budget) => RaceOutcome::TimedOut,
    }
}
