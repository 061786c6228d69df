//! Provides the error type shared by networks, solvers and the training manager.
use std::sync::PoisonError;
use std::time::Duration;
use thiserror::Error;

/// Result type used throughout flatnet.
pub type Result<T> = ::std::result::Result<T, Error>;

#[derive(Debug, Error)]
/// Errors raised by the training core.
pub enum Error {
    /// The input vector handed to a network does not match its input layer.
    #[error("input size mismatch: network expects {expected} values, got {actual}")]
    InputSizeMismatch {
        /// Size of the input layer.
        expected: usize,
        /// Length of the supplied input.
        actual: usize,
    },

    /// The output buffer handed to a network does not match its output layer.
    #[error("output size mismatch: network produces {expected} values, buffer holds {actual}")]
    OutputSizeMismatch {
        /// Size of the output layer.
        expected: usize,
        /// Length of the supplied buffer.
        actual: usize,
    },

    /// A training set does not fit the network it should train.
    #[error("dataset mismatch: {what} is {network} for the network but {dataset} for the dataset")]
    DatasetMismatch {
        /// Which dimension disagrees (`input` or `ideal`).
        what: &'static str,
        /// The network's size for that dimension.
        network: usize,
        /// The dataset's size for that dimension.
        dataset: usize,
    },

    /// Training was requested on a set without records.
    #[error("training set is empty")]
    EmptyTrainingSet,

    /// A record index outside of `0..count` was requested.
    #[error("record {index} out of range for training set of {count} records")]
    RecordOutOfRange {
        /// Requested index.
        index: usize,
        /// Number of records in the set.
        count: usize,
    },

    /// A training set provider failed to produce a record.
    #[error("training data: {0}")]
    Data(String),

    /// The network description can not be turned into a flat network.
    #[error("invalid topology: {0}")]
    InvalidTopology(String),

    /// A configuration value is out of its valid range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// A paused training state does not fit the network it should resume.
    #[error("resume state holds {actual} values per buffer, network has {expected} weights")]
    ResumeShapeMismatch {
        /// Weight count of the network.
        expected: usize,
        /// Length found in the paused state.
        actual: usize,
    },

    /// A gradient worker returned an error.
    #[error("gradient worker {index} failed: {source}")]
    Worker {
        /// Index of the worker (and of its partition).
        index: usize,
        /// The error raised inside the worker.
        #[source]
        source: Box<Error>,
    },

    /// A gradient worker panicked during its pass.
    #[error("gradient worker {index} panicked: {message}")]
    WorkerPanicked {
        /// Index of the worker.
        index: usize,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// Gradient workers did not reach the barrier in time.
    #[error("gradient workers did not finish within {waited:?}")]
    WorkerTimeout {
        /// The configured worker timeout.
        waited: Duration,
    },

    /// The solver lost one of its workers and can not iterate anymore.
    #[error("solver has been terminated")]
    Terminated,

    /// A training job returned an error.
    #[error("training job '{job}' failed: {source}")]
    JobFailed {
        /// Name of the job.
        job: String,
        /// The error raised by the job.
        #[source]
        source: Box<Error>,
    },

    /// A training job panicked on its performer.
    #[error("training job '{job}' panicked: {message}")]
    JobPanicked {
        /// Name of the job.
        job: String,
        /// Panic payload, if it was a string.
        message: String,
    },

    /// A worker, performer or dispatcher thread could not be spawned.
    #[error("failed to spawn thread: {0}")]
    Spawn(#[source] ::std::io::Error),

    /// The manager was asked to run without any performer.
    #[error("no performers available")]
    NoPerformers,

    /// A lock guarding shared state was poisoned.
    #[error("lock poisoned: {0}")]
    LockPoisoned(String),
}

impl<T> From<PoisonError<T>> for Error {
    fn from(err: PoisonError<T>) -> Self {
        Error::LockPoisoned(err.to_string())
    }
}

/// Turns a panic payload into a printable message.
pub(crate) fn panic_message(payload: &(dyn ::std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[test]
    fn worker_error_names_the_cause() {
        let err = Error::Worker { index: 2, source: Box::new(Error::RecordOutOfRange { index: 9, count: 4 }) };
        let text = err.to_string();
        assert!(text.contains("worker 2"));
        assert!(text.contains("record 9"));
    }

    #[test]
    fn poisoned_lock_converts() {
        let lock = ::std::sync::Arc::new(Mutex::new(0));
        let cloned = lock.clone();
        let _ = ::std::thread::spawn(move || {
            let _guard = cloned.lock().unwrap();
            panic!("poison");
        })
        .join();
        let err: Error = lock.lock().unwrap_err().into();
        assert!(matches!(err, Error::LockPoisoned(_)));
    }

    #[test]
    fn panic_payloads_are_readable() {
        let payload: Box<dyn ::std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(payload.as_ref()), "boom");
        let payload: Box<dyn ::std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(payload.as_ref()), "bang");
        let payload: Box<dyn ::std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(payload.as_ref()), "non-string panic payload");
    }
}
