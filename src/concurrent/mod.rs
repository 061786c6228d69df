//! Provides the manager that runs many training jobs across the available hardware.
//!
//! Where a [Solver][solver] spreads one training run over several threads, the
//! [ConcurrentTrainingManager][manager] runs many independent training runs (one candidate
//! network each, e.g. in a hyperparameter sweep) side by side. Jobs are queued in order and any
//! idle [performer][performer] picks the next one; jobs finish in whatever order they finish.
//!
//! The manager is an ordinary value; create as many as you need.
//!
//! [solver]: ../solver/struct.Solver.html
//! [manager]: ./struct.ConcurrentTrainingManager.html
//! [performer]: ./performer/trait.IPerformer.html

pub use self::job::{ITrainingJob, TrainingJob, TrainingOutcome};
pub use self::performer::{CpuPerformer, DeviceInfo, DevicePerformer, IDeviceProvider, IPerformer, PerformerContext, PerformerKind};
pub use self::status::{IStatusReportable, LogStatus};

pub mod job;
pub mod performer;
pub mod status;

use std::collections::VecDeque;
use std::panic::{self, AssertUnwindSafe};
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};
use crate::error::{panic_message, Error, Result};
use crate::util::core_count;

#[derive(Debug, Clone)]
/// Configuration for a [ConcurrentTrainingManager][1].
/// [1]: ./struct.ConcurrentTrainingManager.html
pub struct ManagerConfig {
    /// Give every core a performer of its own, instead of one performer using all cores.
    ///
    /// Default: true
    pub split_cores: bool,
    /// Use this many cores instead of the detected number.
    ///
    /// Default: None
    pub force_core_count: Option<usize>,
    /// Stop dispatching after the first failed job and report its error.
    ///
    /// If disabled, failures are only counted in the [RunSummary][1].
    /// [1]: ./struct.RunSummary.html
    ///
    /// Default: true
    pub fail_fast: bool,
}

impl Default for ManagerConfig {
    fn default() -> ManagerConfig {
        ManagerConfig {
            split_cores: true,
            force_core_count: None,
            fail_fast: true,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
/// Identifies a job added to a manager.
pub struct JobId(usize);

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// Lifecycle of a job.
pub enum JobStatus {
    /// Waiting for a performer.
    Queued,
    /// Handed to a performer, not started yet.
    Assigned,
    /// Running on a performer.
    Running,
    /// Finished successfully.
    Done,
    /// Returned an error or panicked.
    Failed,
    /// Dropped from the queue by a stop request or an earlier failure.
    Cancelled,
}

#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
/// Counts of one dispatch run.
pub struct RunSummary {
    /// Jobs that finished successfully.
    pub completed: usize,
    /// Jobs that failed.
    pub failed: usize,
    /// Jobs that were never started.
    pub cancelled: usize,
}

#[derive(Debug)]
struct JobSlot {
    name: String,
    job: Option<Box<dyn ITrainingJob>>,
    status: JobStatus,
}

#[derive(Debug)]
struct State {
    performers: Vec<Arc<dyn IPerformer>>,
    ready: Vec<bool>,
    jobs: Vec<JobSlot>,
    queue: VecDeque<usize>,
    first_error: Option<Error>,
    stop: bool,
    summary: RunSummary,
}

impl State {
    fn finished(&self) -> usize {
        self.jobs.iter()
            .filter(|slot| match slot.status {
                JobStatus::Done | JobStatus::Failed | JobStatus::Cancelled => true,
                _ => false,
            })
            .count()
    }
}

#[derive(Debug)]
struct Shared {
    state: Mutex<State>,
    wake: Condvar,
}

impl Shared {
    /// Blocks until some performer is ready and returns its index.
    ///
    /// Every wake rescans all performers.
    fn wait_for_free_performer<'a>(&'a self, mut state: MutexGuard<'a, State>) -> Result<(MutexGuard<'a, State>, usize)> {
        loop {
            if let Some(index) = state.ready.iter().position(|ready| *ready) {
                return Ok((state, index));
            }
            state = self.wake.wait(state)?;
        }
    }

    fn wait_for_all_ready<'a>(&'a self, mut state: MutexGuard<'a, State>) -> Result<MutexGuard<'a, State>> {
        while !state.ready.iter().all(|ready| *ready) {
            state = self.wake.wait(state)?;
        }
        Ok(state)
    }
}

#[derive(Debug, Clone)]
/// Asks a running dispatch to stop.
///
/// Jobs that already run are finished, queued jobs are cancelled.
pub struct StopHandle {
    shared: Arc<Shared>,
}

impl StopHandle {
    /// Request the stop and wake the dispatcher.
    pub fn stop(&self) -> Result<()> {
        self.shared.state.lock()?.stop = true;
        self.shared.wake.notify_all();
        Ok(())
    }
}

#[derive(Debug)]
/// Queues training jobs and dispatches them to performers.
pub struct ConcurrentTrainingManager {
    config: ManagerConfig,
    shared: Arc<Shared>,
    device_provider: Option<Box<dyn IDeviceProvider>>,
    status: Option<Arc<dyn IStatusReportable>>,
    background: Option<JoinHandle<Result<RunSummary>>>,
}

impl ConcurrentTrainingManager {
    /// Create a manager without performers.
    pub fn new(config: ManagerConfig) -> ConcurrentTrainingManager {
        ConcurrentTrainingManager {
            config: config,
            shared: Arc::new(Shared {
                state: Mutex::new(State {
                    performers: Vec::new(),
                    ready: Vec::new(),
                    jobs: Vec::new(),
                    queue: VecDeque::new(),
                    first_error: None,
                    stop: false,
                    summary: RunSummary::default(),
                }),
                wake: Condvar::new(),
            }),
            device_provider: None,
            status: None,
            background: None,
        }
    }

    /// Create a manager and [detect its performers][1] as configured.
    /// [1]: #method.detect_performers
    pub fn from_config(config: ManagerConfig) -> Result<ConcurrentTrainingManager> {
        let mut manager = ConcurrentTrainingManager::new(config.clone());
        manager.detect_performers(config.split_cores, config.force_core_count)?;
        Ok(manager)
    }

    /// Use `provider` to find accelerator devices during [detection][1].
    /// [1]: #method.detect_performers
    pub fn with_device_provider(mut self, provider: Box<dyn IDeviceProvider>) -> ConcurrentTrainingManager {
        self.device_provider = Some(provider);
        self
    }

    /// Send progress reports to `status`.
    pub fn with_status(mut self, status: Arc<dyn IStatusReportable>) -> ConcurrentTrainingManager {
        self.status = Some(status);
        self
    }

    /// Add one performer per device of the device provider and, unless a device claims the
    /// CPU, CPU performers: one per core if `split_cores`, otherwise a single one using all
    /// cores. `force_core_count` overrides the detected number of cores.
    ///
    /// Returns the number of performers added.
    pub fn detect_performers(&mut self, split_cores: bool, force_core_count: Option<usize>) -> Result<usize> {
        if force_core_count == Some(0) {
            return Err(Error::InvalidConfig("force_core_count must be at least 1".to_owned()));
        }
        let cores = force_core_count.unwrap_or_else(core_count);
        let devices = match self.device_provider {
            Some(ref provider) => provider.devices(),
            None => Vec::new(),
        };
        let cpu_claimed = devices.iter().any(|device| device.is_cpu);

        let mut state = self.shared.state.lock()?;
        let before = state.performers.len();
        for device in devices {
            let index = state.performers.len();
            info!("Detected device performer {}: {}", index, device.name);
            push_performer(&mut state, Arc::new(DevicePerformer::new(index, device, cores)));
        }
        if !cpu_claimed {
            let (count, threads) = if split_cores { (cores, 1) } else { (1, cores) };
            for _ in 0..count {
                let index = state.performers.len();
                push_performer(&mut state, Arc::new(CpuPerformer::new(index, threads)));
            }
            info!("Using {} CPU performers with {} threads each", count, threads);
        }
        Ok(state.performers.len() - before)
    }

    /// Add a performer.
    pub fn add_performer(&mut self, performer: Arc<dyn IPerformer>) -> Result<()> {
        let mut state = self.shared.state.lock()?;
        push_performer(&mut state, performer);
        drop(state);
        self.shared.wake.notify_all();
        Ok(())
    }

    /// Number of performers.
    pub fn performer_count(&self) -> Result<usize> {
        Ok(self.shared.state.lock()?.performers.len())
    }

    /// Queue a job. Jobs are handed to performers in the order they were added.
    pub fn add_job(&mut self, job: Box<dyn ITrainingJob>) -> Result<JobId> {
        let mut state = self.shared.state.lock()?;
        let index = state.jobs.len();
        debug!("Queueing job '{}'", job.name());
        state.jobs.push(JobSlot { name: job.name().to_owned(), job: Some(job), status: JobStatus::Queued });
        state.queue.push_back(index);
        Ok(JobId(index))
    }

    /// Current status of a job, `None` for an unknown id.
    pub fn job_status(&self, id: JobId) -> Result<Option<JobStatus>> {
        Ok(self.shared.state.lock()?.jobs.get(id.0).map(|slot| slot.status))
    }

    /// A handle to stop a dispatch from another thread.
    pub fn stop_handle(&self) -> StopHandle {
        StopHandle { shared: self.shared.clone() }
    }

    /// Dispatch all queued jobs on the calling thread and wait for them.
    ///
    /// Returns once every performer is idle again. With `fail_fast`, the first job failure
    /// ends dispatching and is returned as the error.
    pub fn run(&mut self) -> Result<RunSummary> {
        dispatch(&self.shared, self.config.fail_fast, self.status.clone())
    }

    /// Dispatch on a background thread. Use [join][1] to wait for the result.
    /// [1]: #method.join
    pub fn start(&mut self) -> Result<()> {
        if self.background.is_some() {
            return Err(Error::InvalidConfig("dispatcher is already running".to_owned()));
        }
        let shared = self.shared.clone();
        let fail_fast = self.config.fail_fast;
        let status = self.status.clone();
        let handle = thread::Builder::new()
            .name("training-dispatcher".to_owned())
            .spawn(move || dispatch(&shared, fail_fast, status))
            .map_err(Error::Spawn)?;
        self.background = Some(handle);
        Ok(())
    }

    /// Wait for the background dispatch started by [start][1].
    /// [1]: #method.start
    pub fn join(&mut self) -> Result<RunSummary> {
        let handle = self.background.take()
            .ok_or_else(|| Error::InvalidConfig("no dispatcher was started".to_owned()))?;
        match handle.join() {
            Ok(result) => result,
            Err(payload) => Err(Error::JobPanicked { job: "dispatcher".to_owned(), message: panic_message(payload.as_ref()) }),
        }
    }
}

fn push_performer(state: &mut State, performer: Arc<dyn IPerformer>) {
    state.performers.push(performer);
    state.ready.push(true);
}

fn dispatch(shared: &Arc<Shared>, fail_fast: bool, status: Option<Arc<dyn IStatusReportable>>) -> Result<RunSummary> {
    let mut state = shared.state.lock()?;
    if state.performers.is_empty() {
        return Err(Error::NoPerformers);
    }
    state.first_error = None;
    state.summary = RunSummary::default();
    info!("Dispatching {} jobs to {} performers", state.queue.len(), state.performers.len());

    while !state.queue.is_empty() {
        let (guard, performer) = shared.wait_for_free_performer(state)?;
        state = guard;
        if state.stop || (fail_fast && state.first_error.is_some()) {
            break;
        }
        let index = match state.queue.pop_front() {
            Some(index) => index,
            None => break,
        };
        let job = match state.jobs[index].job.take() {
            Some(job) => job,
            None => continue,
        };
        state.jobs[index].status = JobStatus::Assigned;
        state.ready[performer] = false;
        let executor = state.performers[performer].clone();
        debug!("Assigning job '{}' to {}", state.jobs[index].name, executor.name());
        drop(state);

        let worker_shared = shared.clone();
        let worker_status = status.clone();
        let spawned = thread::Builder::new()
            .name(format!("performer-{}", performer))
            .spawn(move || perform(&worker_shared, worker_status, executor, performer, index, job));
        state = shared.state.lock()?;
        if let Err(err) = spawned {
            state.ready[performer] = true;
            state.jobs[index].status = JobStatus::Failed;
            state.summary.failed += 1;
            error!("Could not start performer thread: {}", err);
            cancel_queued(&mut state);
            drop(shared.wait_for_all_ready(state)?);
            return Err(Error::Spawn(err));
        }
    }

    cancel_queued(&mut state);
    let mut state = shared.wait_for_all_ready(state)?;
    state.stop = false;
    let summary = state.summary;
    info!("Dispatch finished: {} done, {} failed, {} cancelled", summary.completed, summary.failed, summary.cancelled);
    if fail_fast {
        if let Some(err) = state.first_error.take() {
            return Err(err);
        }
    }
    Ok(summary)
}

fn cancel_queued(state: &mut State) {
    while let Some(index) = state.queue.pop_front() {
        state.jobs[index].status = JobStatus::Cancelled;
        state.jobs[index].job = None;
        state.summary.cancelled += 1;
        debug!("Cancelled job '{}'", state.jobs[index].name);
    }
}

// Runs on the performer thread of one assignment.
fn perform(shared: &Shared,
           status: Option<Arc<dyn IStatusReportable>>,
           performer: Arc<dyn IPerformer>,
           performer_index: usize,
           job_index: usize,
           mut job: Box<dyn ITrainingJob>) {
    if let Ok(mut state) = shared.state.lock() {
        state.jobs[job_index].status = JobStatus::Running;
    }

    let name = job.name().to_owned();
    let result = match panic::catch_unwind(AssertUnwindSafe(|| performer.perform(job.as_mut()))) {
        Ok(Ok(())) => Ok(()),
        Ok(Err(err)) => Err(Error::JobFailed { job: name.clone(), source: Box::new(err) }),
        Err(payload) => Err(Error::JobPanicked { job: name.clone(), message: panic_message(payload.as_ref()) }),
    };
    drop(job);

    let mut state = match shared.state.lock() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    };
    let message = match result {
        Ok(()) => {
            state.jobs[job_index].status = JobStatus::Done;
            state.summary.completed += 1;
            format!("job '{}' done", name)
        }
        Err(err) => {
            error!("{}", err);
            let message = format!("job '{}' failed: {}", name, err);
            state.jobs[job_index].status = JobStatus::Failed;
            state.summary.failed += 1;
            if state.first_error.is_none() {
                state.first_error = Some(err);
            }
            message
        }
    };
    let (total, finished) = (state.jobs.len(), state.finished());
    drop(state);

    // the performer stays busy until its report went out, so a dispatch never ends before it
    if let Some(status) = status {
        if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(|| status.report(total, finished, &message))) {
            error!("Status report for job '{}' panicked: {}", name, panic_message(payload.as_ref()));
        }
    }

    let mut state = match shared.state.lock() {
        Ok(state) => state,
        Err(poisoned) => poisoned.into_inner(),
    };
    state.ready[performer_index] = true;
    drop(state);
    shared.wake.notify_all();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Devices(Vec<DeviceInfo>);

    impl IDeviceProvider for Devices {
        fn devices(&self) -> Vec<DeviceInfo> {
            self.0.clone()
        }
    }

    #[test]
    fn split_cores_adds_one_performer_per_core() {
        let mut manager = ConcurrentTrainingManager::new(ManagerConfig::default());
        assert_eq!(manager.detect_performers(true, Some(3)).unwrap(), 3);
        let mut single = ConcurrentTrainingManager::new(ManagerConfig::default());
        assert_eq!(single.detect_performers(false, Some(3)).unwrap(), 1);
        assert!(single.detect_performers(false, Some(0)).is_err());
    }

    #[test]
    fn cpu_device_claims_the_cpu() {
        let devices = Devices(vec![
            DeviceInfo { name: "gpu".to_owned(), is_cpu: false },
            DeviceInfo { name: "host".to_owned(), is_cpu: true },
        ]);
        let mut manager = ConcurrentTrainingManager::new(ManagerConfig::default()).with_device_provider(Box::new(devices));
        assert_eq!(manager.detect_performers(true, Some(4)).unwrap(), 2);
    }

    #[test]
    fn no_devices_falls_back_to_cpu() {
        let mut manager = ConcurrentTrainingManager::new(ManagerConfig::default())
            .with_device_provider(Box::new(Devices(Vec::new())));
        assert_eq!(manager.detect_performers(true, Some(2)).unwrap(), 2);
    }

    #[test]
    fn run_without_performers_fails() {
        let mut manager = ConcurrentTrainingManager::new(ManagerConfig::default());
        assert!(matches!(manager.run(), Err(Error::NoPerformers)));
    }
}
