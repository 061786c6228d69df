extern crate crossbeam_channel;
extern crate flatnet;

#[cfg(test)]
mod concurrent_specs {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use crossbeam_channel::{bounded, Receiver, Sender};
    use flatnet::activation::ActivationType;
    use flatnet::concurrent::*;
    use flatnet::data::MemoryTrainingSet;
    use flatnet::error::{Error, Result};
    use flatnet::network::{FlatNetwork, NetworkConfig};
    use flatnet::solver::SolverConfig;
    use flatnet::solvers::Resilient;

    #[derive(Debug)]
    struct NoopJob {
        name: String,
        runs: Arc<AtomicUsize>,
    }

    impl ITrainingJob for NoopJob {
        fn name(&self) -> &str {
            &self.name
        }

        fn perform(&mut self, _context: &PerformerContext) -> Result<()> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingJob;

    impl ITrainingJob for FailingJob {
        fn name(&self) -> &str {
            "failing"
        }

        fn perform(&mut self, _context: &PerformerContext) -> Result<()> {
            Err(Error::Data("nothing to learn".to_owned()))
        }
    }

    #[derive(Debug)]
    struct PanickingJob;

    impl ITrainingJob for PanickingJob {
        fn name(&self) -> &str {
            "panicking"
        }

        fn perform(&mut self, _context: &PerformerContext) -> Result<()> {
            panic!("job blew up")
        }
    }

    // signals when it starts, then waits until released
    #[derive(Debug)]
    struct GatedJob {
        started: Sender<()>,
        release: Receiver<()>,
    }

    impl ITrainingJob for GatedJob {
        fn name(&self) -> &str {
            "gated"
        }

        fn perform(&mut self, _context: &PerformerContext) -> Result<()> {
            let _ = self.started.send(());
            let _ = self.release.recv();
            Ok(())
        }
    }

    #[derive(Debug, Default)]
    struct CountingStatus {
        reports: AtomicUsize,
        last_completed: AtomicUsize,
    }

    impl IStatusReportable for CountingStatus {
        fn report(&self, _total: usize, completed: usize, _message: &str) {
            self.reports.fetch_add(1, Ordering::SeqCst);
            self.last_completed.fetch_max(completed, Ordering::SeqCst);
        }
    }

    #[derive(Debug)]
    struct StoppingStatus(StopHandle);

    impl IStatusReportable for StoppingStatus {
        fn report(&self, _total: usize, _completed: usize, _message: &str) {
            self.0.stop().unwrap();
        }
    }

    #[derive(Debug)]
    struct PanickingStatus;

    impl IStatusReportable for PanickingStatus {
        fn report(&self, _total: usize, _completed: usize, _message: &str) {
            panic!("status sink blew up");
        }
    }

    fn manager(cores: usize, fail_fast: bool) -> ConcurrentTrainingManager {
        let config = ManagerConfig { split_cores: true, force_core_count: Some(cores), fail_fast: fail_fast };
        ConcurrentTrainingManager::from_config(config).unwrap()
    }

    fn noop(name: &str, runs: &Arc<AtomicUsize>) -> Box<dyn ITrainingJob> {
        Box::new(NoopJob { name: name.to_owned(), runs: runs.clone() })
    }

    #[test]
    fn all_jobs_finish_on_two_performers() {
        let mut manager = manager(2, true);
        assert_eq!(manager.performer_count().unwrap(), 2);
        let runs = Arc::new(AtomicUsize::new(0));
        let ids = (0..5).map(|i| manager.add_job(noop(&format!("noop-{}", i), &runs)).unwrap()).collect::<Vec<_>>();

        let summary = manager.run().unwrap();
        assert_eq!(summary, RunSummary { completed: 5, failed: 0, cancelled: 0 });
        assert_eq!(runs.load(Ordering::SeqCst), 5);
        for id in ids {
            assert_eq!(manager.job_status(id).unwrap(), Some(JobStatus::Done));
        }
    }

    #[test]
    fn first_failure_stops_dispatching() {
        let mut manager = manager(1, true);
        let runs = Arc::new(AtomicUsize::new(0));
        let first = manager.add_job(noop("first", &runs)).unwrap();
        let failing = manager.add_job(Box::new(FailingJob)).unwrap();
        let later = manager.add_job(noop("later", &runs)).unwrap();

        match manager.run() {
            Err(Error::JobFailed { job, source }) => {
                assert_eq!(job, "failing");
                assert!(matches!(*source, Error::Data(_)));
            }
            other => panic!("expected the job failure, got {:?}", other),
        }
        assert_eq!(manager.job_status(first).unwrap(), Some(JobStatus::Done));
        assert_eq!(manager.job_status(failing).unwrap(), Some(JobStatus::Failed));
        assert_eq!(manager.job_status(later).unwrap(), Some(JobStatus::Cancelled));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn failures_are_counted_without_fail_fast() {
        let mut manager = manager(2, false);
        let runs = Arc::new(AtomicUsize::new(0));
        manager.add_job(noop("a", &runs)).unwrap();
        manager.add_job(Box::new(FailingJob)).unwrap();
        manager.add_job(Box::new(PanickingJob)).unwrap();
        manager.add_job(noop("b", &runs)).unwrap();

        let summary = manager.run().unwrap();
        assert_eq!(summary, RunSummary { completed: 2, failed: 2, cancelled: 0 });
    }

    #[test]
    fn panicking_jobs_are_reported() {
        let mut manager = manager(1, true);
        manager.add_job(Box::new(PanickingJob)).unwrap();
        match manager.run() {
            Err(Error::JobPanicked { job, message }) => {
                assert_eq!(job, "panicking");
                assert_eq!(message, "job blew up");
            }
            other => panic!("expected the job panic, got {:?}", other),
        }
    }

    #[test]
    fn stop_cancels_queued_jobs() {
        let mut manager = manager(1, true);
        let (started_tx, started_rx) = bounded(1);
        let (release_tx, release_rx) = bounded(1);
        let gated = manager.add_job(Box::new(GatedJob { started: started_tx, release: release_rx })).unwrap();
        let runs = Arc::new(AtomicUsize::new(0));
        let queued = (0..4).map(|i| manager.add_job(noop(&format!("queued-{}", i), &runs)).unwrap()).collect::<Vec<_>>();

        manager.start().unwrap();
        started_rx.recv().unwrap();
        manager.stop_handle().stop().unwrap();
        release_tx.send(()).unwrap();

        let summary = manager.join().unwrap();
        assert_eq!(summary, RunSummary { completed: 1, failed: 0, cancelled: 4 });
        assert_eq!(manager.job_status(gated).unwrap(), Some(JobStatus::Done));
        for id in queued {
            assert_eq!(manager.job_status(id).unwrap(), Some(JobStatus::Cancelled));
        }
        assert_eq!(runs.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn status_is_reported_per_job() {
        let status = Arc::new(CountingStatus::default());
        let mut manager = manager(2, true).with_status(status.clone());
        let runs = Arc::new(AtomicUsize::new(0));
        for i in 0..3 {
            manager.add_job(noop(&format!("job-{}", i), &runs)).unwrap();
        }
        manager.run().unwrap();
        assert_eq!(status.reports.load(Ordering::SeqCst), 3);
        assert_eq!(status.last_completed.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn status_sinks_may_use_the_manager() {
        let manager = manager(1, true);
        let stop = manager.stop_handle();
        let mut manager = manager.with_status(Arc::new(StoppingStatus(stop)));
        let runs = Arc::new(AtomicUsize::new(0));
        let ids = (0..3).map(|i| manager.add_job(noop(&format!("job-{}", i), &runs)).unwrap()).collect::<Vec<_>>();

        let summary = manager.run().unwrap();
        assert_eq!(summary, RunSummary { completed: 1, failed: 0, cancelled: 2 });
        assert_eq!(manager.job_status(ids[0]).unwrap(), Some(JobStatus::Done));
        assert_eq!(manager.job_status(ids[2]).unwrap(), Some(JobStatus::Cancelled));
    }

    #[test]
    fn panicking_status_sinks_do_not_stall_dispatch() {
        let mut manager = manager(2, true).with_status(Arc::new(PanickingStatus));
        let runs = Arc::new(AtomicUsize::new(0));
        for i in 0..4 {
            manager.add_job(noop(&format!("job-{}", i), &runs)).unwrap();
        }
        let summary = manager.run().unwrap();
        assert_eq!(summary, RunSummary { completed: 4, failed: 0, cancelled: 0 });
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn training_jobs_publish_their_outcome() {
        let mut manager = manager(2, true);
        let data = MemoryTrainingSet::from_slices(
            &[vec![0f64, 0f64], vec![0f64, 1f64], vec![1f64, 0f64], vec![1f64, 1f64]],
            &[vec![0f64], vec![1f64], vec![1f64], vec![0f64]],
        ).unwrap();
        let cfg = NetworkConfig::feedforward("xor", &[2, 3, 1], ActivationType::Sigmoid);
        let weights = vec![0.25f64, -0.42f64, 0.11f64, -0.37f64, 0.48f64, -0.16f64,
                           0.31f64, 0.29f64, -0.45f64, 0.21f64, -0.33f64, 0.44f64, 0.07f64];

        let mut outcomes = Vec::new();
        for i in 0..3 {
            let network = FlatNetwork::with_weights(&cfg, weights.clone()).unwrap();
            let job = TrainingJob::new(&format!("xor-{}", i), network, Box::new(data.clone()),
                                       Resilient::default(), &SolverConfig::default(), 500, 0.01f64);
            outcomes.push(job.outcome());
            manager.add_job(Box::new(job)).unwrap();
        }
        let summary = manager.run().unwrap();
        assert_eq!(summary.completed, 3);

        for outcome in outcomes {
            let outcome = outcome.read().unwrap();
            let outcome = outcome.as_ref().unwrap();
            assert!(outcome.converged);
            assert!(outcome.error <= 0.01f64);
            assert!(outcome.iterations <= 500);
            assert_eq!(outcome.network.name, "xor");
        }
    }

    #[test]
    fn device_performers_take_jobs() {
        #[derive(Debug)]
        struct OneDevice;

        impl IDeviceProvider for OneDevice {
            fn devices(&self) -> Vec<DeviceInfo> {
                vec![DeviceInfo { name: "accelerator".to_owned(), is_cpu: false }]
            }
        }

        let mut manager = ConcurrentTrainingManager::new(ManagerConfig::default())
            .with_device_provider(Box::new(OneDevice));
        assert_eq!(manager.detect_performers(false, Some(2)).unwrap(), 2);
        let runs = Arc::new(AtomicUsize::new(0));
        for i in 0..4 {
            manager.add_job(noop(&format!("device-{}", i), &runs)).unwrap();
        }
        assert_eq!(manager.run().unwrap().completed, 4);
        assert_eq!(runs.load(Ordering::SeqCst), 4);
    }
}
