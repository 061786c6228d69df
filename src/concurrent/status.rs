//! Progress reporting for the training manager.
use std::fmt;

/// Receives progress of a [ConcurrentTrainingManager][1] run.
///
/// Purely observational: a reporter can not influence scheduling.
/// [1]: ../struct.ConcurrentTrainingManager.html
pub trait IStatusReportable: Send + Sync + fmt::Debug {
    /// `completed` of `total` jobs have finished (done, failed or cancelled).
    fn report(&self, total: usize, completed: usize, message: &str);
}

#[derive(Debug, Copy, Clone, Default)]
/// Forwards progress to the `log` facade at info level.
pub struct LogStatus;

impl IStatusReportable for LogStatus {
    fn report(&self, total: usize, completed: usize, message: &str) {
        info!("[{}/{}] {}", completed, total, message);
    }
}
