//! Read-only reporting snapshots and their text rendering.
//!
//! Every struct here is a copy taken under the relevant lock and handed to
//! the shell (or the report file writer) after the lock is released, so
//! rendering never blocks the tick loop. Formatting mirrors the console
//! surfaces: `screen -ls`, `process-smi`, `vmstat`, and the attach view.

use crate::process::{Process, ProcessState, Violation};

/// One line of the process list: name plus lifecycle state.
#[derive(Debug, Clone)]
pub struct ProcessEntry {
    pub name: String,
    pub state: ProcessState,
}

/// Core occupancy at the moment of the query.
///
/// A core whose process is stalled on a page fault counts as NOT utilized;
/// the same rule is applied everywhere utilization is shown.
#[derive(Debug, Clone, Copy)]
pub struct CpuUtilization {
    pub used: u32,
    pub available: u32,
    pub percent: f64,
}

#[derive(Debug, Clone, Copy)]
pub struct MemorySummary {
    pub total: u64,
    pub used: u64,
    pub free: u64,
}

/// Per-process memory row for `process-smi`.
#[derive(Debug, Clone)]
pub struct ProcessRow {
    pub pid: u32,
    pub name: String,
    /// Declared address space in bytes.
    pub vm_size: u64,
    /// Bytes currently backed by frames.
    pub rss: u64,
}

pub struct ProcessSmi {
    pub utilization: CpuUtilization,
    pub memory: MemorySummary,
    pub rows: Vec<ProcessRow>,
}

pub struct VmStat {
    pub memory: MemorySummary,
    pub idle_ticks: u64,
    pub active_ticks: u64,
    pub paged_in: u64,
    pub paged_out: u64,
}

/// Detailed PCB view returned by `attach`.
pub struct ProcessView {
    pub pid: u32,
    pub name: String,
    pub state: ProcessState,
    pub current_instruction: usize,
    pub total_instructions: usize,
    pub variables: Vec<(String, u16)>,
    /// Last ten exec-log lines, most recent first.
    pub recent_log: Vec<String>,
    /// Most recent FAULT line, present when the process violated.
    pub fault_line: Option<String>,
    /// The user-facing shutdown report for a violated process.
    pub violation_message: Option<String>,
}

impl ProcessView {
    pub fn from_process(process: &Process) -> Self {
        let violation_message = process
            .violation
            .as_ref()
            .map(|violation| violation_message(&process.name, violation));

        Self {
            pid: process.pid,
            name: process.name.clone(),
            state: process.state,
            current_instruction: process.current_instruction,
            total_instructions: process.total_instructions(),
            variables: process
                .variables
                .iter()
                .map(|(name, value)| (name.clone(), *value))
                .collect(),
            recent_log: process.exec_log.iter().rev().take(10).cloned().collect(),
            fault_line: process.last_fault().map(str::to_string),
            violation_message,
        }
    }

    /// Prints the attach view, matching the in-screen `process-smi` output.
    pub fn print(&self) {
        println!("PID: {}", self.pid);
        println!("State: {}", self.state);
        println!(
            "Instruction: {}/{}",
            self.current_instruction, self.total_instructions
        );

        println!("\nVariables:");
        for (name, value) in &self.variables {
            println!("  {name} = {value}");
        }

        println!("\nExecution log:");
        for line in &self.recent_log {
            println!("  {line}");
        }

        if let Some(message) = &self.violation_message {
            println!("\nViolation:");
            if let Some(fault) = &self.fault_line {
                println!("  {fault}");
            }
            println!("  {message}");
        }
    }
}

impl ProcessSmi {
    pub fn print(&self) {
        println!("PROCESS-SMI");
        println!("-----------");
        println!(
            "CPU Utilization: {:.2}% ({} used, {} available)\n",
            self.utilization.percent, self.utilization.used, self.utilization.available
        );

        println!("Memory Summary:");
        println!("  Total: {}", format_bytes(self.memory.total));
        println!("  Used : {}", format_bytes(self.memory.used));
        println!("  Free : {}\n", format_bytes(self.memory.free));

        println!(
            "{:<6}{:<20}{:<14}{:<14}",
            "PID", "NAME", "VM-SIZE", "RSS"
        );
        println!("{}", "-".repeat(54));
        for row in &self.rows {
            println!(
                "{:<6}{:<20}{:<14}{:<14}",
                row.pid,
                row.name,
                format_bytes(row.vm_size),
                format_bytes(row.rss)
            );
        }
        println!();
    }
}

impl VmStat {
    pub fn total_ticks(&self) -> u64 {
        self.idle_ticks + self.active_ticks
    }

    pub fn print(&self) {
        println!("VMSTAT");
        println!("------");
        println!(
            "Total memory    : {} bytes ({})",
            self.memory.total,
            format_bytes(self.memory.total)
        );
        println!(
            "Used memory     : {} bytes ({})",
            self.memory.used,
            format_bytes(self.memory.used)
        );
        println!(
            "Free memory     : {} bytes ({})\n",
            self.memory.free,
            format_bytes(self.memory.free)
        );

        println!("Idle cpu ticks  : {}", self.idle_ticks);
        println!("Active cpu ticks: {}", self.active_ticks);
        println!("Total cpu ticks : {}\n", self.total_ticks());

        println!("Num paged in    : {}", self.paged_in);
        println!("Num paged out   : {}\n", self.paged_out);
    }
}

/// The user-visible line for a process terminated by a memory violation.
pub fn violation_message(name: &str, violation: &Violation) -> String {
    format!(
        "Process {} shut down due to memory access violation error that occurred at {}. {} invalid.",
        name, violation.wall_clock, violation.addr_token
    )
}

/// `name [STATE]` lines, one per process, in list order.
pub fn render_process_list(entries: &[ProcessEntry]) -> String {
    let mut out = String::new();
    for entry in entries {
        out.push_str(&format!("{} [{}]\n", entry.name, entry.state));
    }
    out
}

/// Human-readable byte count at two decimals (B/KB/MB/GB).
pub fn format_bytes(bytes: u64) -> String {
    const KB: f64 = 1024.0;
    const MB: f64 = KB * 1024.0;
    const GB: f64 = MB * 1024.0;

    let b = bytes as f64;
    if b >= GB {
        format!("{:.2} GB", b / GB)
    } else if b >= MB {
        format!("{:.2} MB", b / MB)
    } else if b >= KB {
        format!("{:.2} KB", b / KB)
    } else {
        format!("{b:.2} B")
    }
}
