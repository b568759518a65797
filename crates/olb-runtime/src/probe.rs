//! OS-level liveness and resource probing for child processes.

use std::sync::Mutex;

use olb_core::ResourceUsage;
use sysinfo::{Pid, ProcessStatus, ProcessesToUpdate, System};

/// One liveness/resource observation of a pid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProcessSample {
    /// Present in the process table and not a zombie.
    pub alive: bool,
    pub usage: Option<ResourceUsage>,
}

/// Samples processes through a long-lived `System` so CPU usage is measured
/// between consecutive polls.
#[derive(Debug)]
pub struct ProcessProbe {
    system: Mutex<System>,
}

impl ProcessProbe {
    pub fn new() -> Self {
        Self {
            system: Mutex::new(System::new()),
        }
    }

    pub fn sample(&self, pid: u32) -> ProcessSample {
        let Ok(mut system) = self.system.lock() else {
            return ProcessSample {
                alive: false,
                usage: None,
            };
        };
        let pid = Pid::from_u32(pid);
        system.refresh_processes(ProcessesToUpdate::Some(&[pid]), true);

        system.process(pid).map_or(
            ProcessSample {
                alive: false,
                usage: None,
            },
            |process| ProcessSample {
                alive: !matches!(process.status(), ProcessStatus::Zombie | ProcessStatus::Dead),
                usage: Some(ResourceUsage {
                    cpu_percent: process.cpu_usage(),
                    memory_bytes: process.memory(),
                }),
            },
        )
    }
}

impl Default for ProcessProbe {
    fn default() -> Self {
        Self::new()
    }
}
