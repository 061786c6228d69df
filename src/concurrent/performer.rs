//! Provides the execution contexts training jobs run on.
//!
//! A performer is one place a [job][job] can run: a CPU thread budget, or an accelerator
//! device. Performers do not own threads themselves; the manager runs every assignment on a
//! thread of its own and only asks the performer to carry the job out there.
//!
//! [job]: ../job/trait.ITrainingJob.html
use std::fmt;
use crate::concurrent::job::ITrainingJob;
use crate::error::Result;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
/// The kind of hardware behind a performer.
pub enum PerformerKind {
    /// Host CPU cores.
    Cpu,
    /// An accelerator device.
    Device,
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// Description of an accelerator device, as reported by an [IDeviceProvider][1].
/// [1]: ./trait.IDeviceProvider.html
pub struct DeviceInfo {
    /// Human readable name of the device.
    pub name: String,
    /// Whether the device runs on the host CPU. Such a device claims the CPU, so no CPU
    /// performers are added next to it.
    pub is_cpu: bool,
}

/// Lists the accelerator devices available to the manager.
pub trait IDeviceProvider: Send + Sync + fmt::Debug {
    /// The devices that should get a performer each.
    fn devices(&self) -> Vec<DeviceInfo>;
}

#[derive(Debug, Clone, PartialEq, Eq)]
/// What a job learns about the performer it runs on.
pub struct PerformerContext {
    /// Index of the performer in the manager.
    pub index: usize,
    /// Kind of the performer.
    pub kind: PerformerKind,
    /// The device, for device performers.
    pub device: Option<DeviceInfo>,
    /// Number of threads the job may use.
    pub threads: usize,
}

/// An execution context for training jobs.
pub trait IPerformer: Send + Sync + fmt::Debug {
    /// Description handed to every job this performer runs.
    fn context(&self) -> &PerformerContext;

    /// Carry out `job`. Called on the thread the manager started for the assignment.
    fn perform(&self, job: &mut dyn ITrainingJob) -> Result<()> {
        job.perform(self.context())
    }

    /// Name used in log output.
    fn name(&self) -> String {
        let context = self.context();
        match context.device {
            Some(ref device) => format!("device performer {} ({})", context.index, device.name),
            None => format!("cpu performer {}", context.index),
        }
    }
}

#[derive(Debug, Clone)]
/// Runs jobs on host CPU threads.
pub struct CpuPerformer {
    context: PerformerContext,
}

impl CpuPerformer {
    /// Create a performer that offers `threads` threads to its jobs.
    pub fn new(index: usize, threads: usize) -> CpuPerformer {
        CpuPerformer {
            context: PerformerContext {
                index: index,
                kind: PerformerKind::Cpu,
                device: None,
                threads: threads.max(1),
            },
        }
    }
}

impl IPerformer for CpuPerformer {
    fn context(&self) -> &PerformerContext {
        &self.context
    }
}

#[derive(Debug, Clone)]
/// Runs jobs on an accelerator device.
///
/// The job receives the device in its [PerformerContext][1] and decides how to use it.
/// [1]: ./struct.PerformerContext.html
pub struct DevicePerformer {
    context: PerformerContext,
}

impl DevicePerformer {
    /// Create a performer for `device`. A CPU device offers `cpu_threads` threads, any other
    /// device a single host thread driving it.
    pub fn new(index: usize, device: DeviceInfo, cpu_threads: usize) -> DevicePerformer {
        let threads = if device.is_cpu { cpu_threads.max(1) } else { 1 };
        DevicePerformer {
            context: PerformerContext {
                index: index,
                kind: PerformerKind::Device,
                device: Some(device),
                threads: threads,
            },
        }
    }
}

impl IPerformer for DevicePerformer {
    fn context(&self) -> &PerformerContext {
        &self.context
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cpu_performer_offers_at_least_one_thread() {
        assert_eq!(CpuPerformer::new(0, 0).context().threads, 1);
        assert_eq!(CpuPerformer::new(1, 4).context().threads, 4);
    }

    #[test]
    fn only_cpu_devices_get_host_threads() {
        let gpu = DevicePerformer::new(0, DeviceInfo { name: "gpu".to_owned(), is_cpu: false }, 8);
        let cpu = DevicePerformer::new(1, DeviceInfo { name: "host".to_owned(), is_cpu: true }, 8);
        assert_eq!(gpu.context().threads, 1);
        assert_eq!(cpu.context().threads, 8);
        assert_eq!(gpu.name(), "device performer 0 (gpu)");
    }
}
