//! Top-level system container and admission surface.
//!
//! `System` wires the owned subsystems (immutable config, memory manager,
//! scheduler) together at startup around one shared tick clock. Nothing
//! here is lazily constructed: creation either
//! yields a fully initialized system or a `ConfigError` with no state left
//! behind.
//!
//! The shell talks to the core exclusively through this type: admission
//! calls, generation toggles, and read-only query snapshots.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::AtomicU64;
use std::sync::Arc;

use thiserror::Error;

use crate::config::{Config, ConfigError};
use crate::memory::MemoryManager;
use crate::process::instruction::{Instruction, Operand};
use crate::process::Process;
use crate::report::{
    render_process_list, CpuUtilization, MemorySummary, ProcessEntry, ProcessRow, ProcessSmi,
    ProcessView, VmStat,
};
use crate::sched::Scheduler;

/// Smallest accepted per-process memory size, in bytes.
pub const MIN_PROCESS_MEMORY: u32 = 64;
/// Largest accepted per-process memory size, in bytes.
pub const MAX_PROCESS_MEMORY: u32 = 65536;
/// Scripted processes carry between 1 and this many instructions.
pub const MAX_SCRIPT_INSTRUCTIONS: usize = 50;

/// Rejection of a process-creation request. No core state is touched when
/// one of these is returned.
#[derive(Debug, Error)]
pub enum AdmissionError {
    #[error("invalid process name")]
    InvalidName,

    #[error("invalid memory allocation: {0} bytes")]
    InvalidMemorySize(u32),

    #[error("a script must contain between 1 and 50 instructions, got {0}")]
    BadScriptLength(usize),
}

pub struct System {
    config: Arc<Config>,
    memory: Arc<MemoryManager>,
    scheduler: Arc<Scheduler>,
    report_path: PathBuf,
}

impl System {
    /// Validates the config and builds the memory manager and scheduler.
    pub fn new(
        config: Config,
        journal_path: impl AsRef<Path>,
        report_path: impl Into<PathBuf>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;

        let config = Arc::new(config);
        let clock = Arc::new(AtomicU64::new(0));
        let memory = Arc::new(MemoryManager::new(&config, journal_path, Arc::clone(&clock))?);
        let scheduler = Arc::new(Scheduler::new(
            Arc::clone(&config),
            Arc::clone(&memory),
            clock,
        ));

        Ok(Self {
            config,
            memory,
            scheduler,
            report_path: report_path.into(),
        })
    }

    /// Starts the background tick thread.
    pub fn start(&self) {
        self.scheduler.spawn_worker();
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn memory(&self) -> &MemoryManager {
        &self.memory
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// Admits a process with the 5-instruction starter script (declare,
    /// then increment/print pairs).
    pub fn create_manual(&self, name: &str, memory_size: u32) -> Result<u32, AdmissionError> {
        let instructions = vec![
            Instruction::Declare {
                var: "x".to_string(),
                value: 0,
            },
            Instruction::Add {
                dst: "x".to_string(),
                lhs: Operand::Var("x".to_string()),
                rhs: Operand::Literal(1),
            },
            Instruction::Print(Some("x = +x".to_string())),
            Instruction::Add {
                dst: "x".to_string(),
                lhs: Operand::Var("x".to_string()),
                rhs: Operand::Literal(1),
            },
            Instruction::Print(Some("x = +x".to_string())),
        ];
        self.create_scripted(name, memory_size, instructions)
    }

    /// Admits a process running a caller-supplied instruction list.
    pub fn create_scripted(
        &self,
        name: &str,
        memory_size: u32,
        instructions: Vec<Instruction>,
    ) -> Result<u32, AdmissionError> {
        if name.is_empty() {
            return Err(AdmissionError::InvalidName);
        }
        if !valid_memory_size(memory_size) {
            return Err(AdmissionError::InvalidMemorySize(memory_size));
        }
        if instructions.is_empty() || instructions.len() > MAX_SCRIPT_INSTRUCTIONS {
            return Err(AdmissionError::BadScriptLength(instructions.len()));
        }

        let pid = self.scheduler.allocate_pid();
        let process = Process::new(pid, name.to_string(), instructions, memory_size);
        self.memory.allocate(pid, u64::from(memory_size));
        self.scheduler.push_ready(process);
        Ok(pid)
    }

    pub fn scheduler_start(&self) {
        self.scheduler.set_generating(true);
    }

    pub fn scheduler_stop(&self) {
        self.scheduler.set_generating(false);
    }

    /// Names and states of every process, in ready/running/sleeping/
    /// finished order.
    pub fn list(&self) -> Vec<ProcessEntry> {
        let st = self.scheduler.lock_state();
        let mut entries = Vec::new();

        for process in &st.ready {
            entries.push(entry(process));
        }
        for process in st.cores.iter().flatten() {
            entries.push(entry(process));
        }
        for process in &st.sleeping {
            entries.push(entry(process));
        }
        for process in &st.finished {
            entries.push(entry(process));
        }
        entries
    }

    /// Core occupancy at this instant. A core stalled on a page fault is
    /// not utilized.
    pub fn utilization(&self) -> CpuUtilization {
        let st = self.scheduler.lock_state();
        let used = st
            .cores
            .iter()
            .flatten()
            .filter(|process| !process.waiting_on_fault)
            .count() as u32;
        let total = self.config.num_cpu;
        CpuUtilization {
            used,
            available: total - used,
            percent: f64::from(used) / f64::from(total) * 100.0,
        }
    }

    pub fn memory_summary(&self) -> MemorySummary {
        MemorySummary {
            total: self.memory.total_memory(),
            used: self.memory.used_memory(),
            free: self.memory.free_memory(),
        }
    }

    /// PCB view by name; search order ready, sleeping, running, finished.
    pub fn attach(&self, name: &str) -> Option<ProcessView> {
        let st = self.scheduler.lock_state();

        st.ready
            .iter()
            .find(|p| p.name == name)
            .or_else(|| st.sleeping.iter().find(|p| p.name == name))
            .or_else(|| st.cores.iter().flatten().find(|p| p.name == name))
            .or_else(|| st.finished.iter().find(|p| p.name == name))
            .map(ProcessView::from_process)
    }

    pub fn process_smi(&self) -> ProcessSmi {
        let utilization = self.utilization();
        let memory = self.memory_summary();

        let st = self.scheduler.lock_state();
        let mut rows = Vec::new();
        for process in st
            .ready
            .iter()
            .chain(st.cores.iter().flatten())
            .chain(st.sleeping.iter())
            .chain(st.finished.iter())
        {
            rows.push(ProcessRow {
                pid: process.pid,
                name: process.name.clone(),
                vm_size: u64::from(process.memory_size),
                rss: self.memory.process_rss(process.pid),
            });
        }

        ProcessSmi {
            utilization,
            memory,
            rows,
        }
    }

    pub fn vmstat(&self) -> VmStat {
        VmStat {
            memory: self.memory_summary(),
            idle_ticks: self.scheduler.total_idle_ticks(),
            active_ticks: self.scheduler.total_active_ticks(),
            paged_in: self.memory.paged_in(),
            paged_out: self.memory.paged_out(),
        }
    }

    /// Writes the utilization report file and returns its path.
    pub fn report_util(&self) -> io::Result<PathBuf> {
        let utilization = self.utilization();
        let entries = self.list();

        let mut contents = format!("CPU Utilization: {:.2}%\n", utilization.percent);
        contents.push_str(&render_process_list(&entries));

        fs::write(&self.report_path, contents)?;
        Ok(self.report_path.clone())
    }
}

fn entry(process: &Process) -> ProcessEntry {
    ProcessEntry {
        name: process.name.clone(),
        state: process.state,
    }
}

/// Memory sizes must be powers of two in `[64, 65536]`.
pub fn valid_memory_size(size: u32) -> bool {
    (MIN_PROCESS_MEMORY..=MAX_PROCESS_MEMORY).contains(&size) && size.is_power_of_two()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_size_bounds() {
        assert!(valid_memory_size(64));
        assert!(valid_memory_size(1024));
        assert!(valid_memory_size(65536));

        assert!(!valid_memory_size(32));
        assert!(!valid_memory_size(96));
        assert!(!valid_memory_size(131072));
        assert!(!valid_memory_size(0));
    }
}
