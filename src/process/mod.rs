//! Process control blocks and the instruction engine.
//!
//! A `Process` owns everything the scheduler needs to run it: the parsed
//! instruction list, the symbol table (16-bit variables in a 64-byte
//! budget), sparse data memory, a bounded execution log, and the FOR-loop
//! stack. State transitions are driven one instruction per tick by
//! `exec::execute_one`; the scheduler moves the PCB between queues in
//! response.

pub mod exec;
pub mod instruction;

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::fmt;

pub use instruction::{Instruction, Operand, ParseError};

/// Fixed symbol-table budget per process, in bytes.
pub const SYMBOL_TABLE_BYTES: u32 = 64;
/// Cost of one 16-bit variable in the symbol table.
pub const BYTES_PER_VALUE: u32 = 2;
/// Maximum retained exec-log lines.
pub const EXEC_LOG_CAP: usize = 500;
/// FOR loops nest at most this deep; deeper headers are skipped.
pub const MAX_LOOP_DEPTH: usize = 3;
/// Memory size given to synthesized processes.
pub const DEFAULT_PROCESS_MEMORY: u32 = 1024;

/// Lifecycle states.
///
/// `Finished` and `MemoryViolated` are terminal; the scheduler releases the
/// process's frames as soon as it observes either.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProcessState {
    Ready,
    Running,
    Sleeping,
    Finished,
    MemoryViolated,
}

impl fmt::Display for ProcessState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ProcessState::Ready => "READY",
            ProcessState::Running => "RUNNING",
            ProcessState::Sleeping => "SLEEPING",
            ProcessState::Finished => "FINISHED",
            ProcessState::MemoryViolated => "MEMORY-VIOLATED",
        };
        f.write_str(label)
    }
}

/// One active FOR loop.
#[derive(Debug, Clone)]
pub struct LoopFrame {
    /// First instruction of the body.
    pub start: usize,
    /// Last instruction of the body (inclusive).
    pub end: usize,
    pub iterations_remaining: u32,
}

/// Details of a memory violation, kept for the user-facing report.
#[derive(Debug, Clone)]
pub struct Violation {
    /// The offending address token, case preserved from the source.
    pub addr_token: String,
    /// Host wall-clock time (HH:MM:SS) when the violation occurred.
    pub wall_clock: String,
}

/// Process control block.
pub struct Process {
    pub pid: u32,
    pub name: String,
    pub state: ProcessState,
    pub sleep_until_tick: u64,
    pub current_instruction: usize,
    pub quantum_ticks_left: u32,
    pub delay_ticks_left: u32,
    /// Declared address space in bytes; READ/WRITE beyond it violate.
    pub memory_size: u32,
    pub symbol_table_bytes_used: u32,
    pub variables: BTreeMap<String, u16>,
    /// Sparse data memory: address -> 16-bit value.
    pub data_memory: HashMap<u32, u16>,
    pub exec_log: VecDeque<String>,
    pub instructions: Vec<Instruction>,
    pub loop_stack: Vec<LoopFrame>,
    /// Set while the scheduler has this process stalled on a page fault.
    pub waiting_on_fault: bool,
    pub violation: Option<Violation>,
}

impl Process {
    pub fn new(pid: u32, name: String, instructions: Vec<Instruction>, memory_size: u32) -> Self {
        Self {
            pid,
            name,
            state: ProcessState::Ready,
            sleep_until_tick: 0,
            current_instruction: 0,
            quantum_ticks_left: 0,
            delay_ticks_left: 0,
            memory_size,
            symbol_table_bytes_used: 0,
            variables: BTreeMap::new(),
            data_memory: HashMap::new(),
            exec_log: VecDeque::new(),
            instructions,
            loop_stack: Vec::new(),
            waiting_on_fault: false,
            violation: None,
        }
    }

    pub fn total_instructions(&self) -> usize {
        self.instructions.len()
    }

    /// Appends `[<tick>] <msg>` to the exec log, trimming to the cap.
    pub fn log_event(&mut self, tick: u64, msg: &str) {
        self.push_log(format!("[{tick}] {msg}"));
    }

    /// Appends a raw line (used for FAULT records, which carry no tick
    /// prefix so reports can match on the `FAULT:` prefix).
    pub fn push_log(&mut self, line: String) {
        self.exec_log.push_back(line);
        while self.exec_log.len() > EXEC_LOG_CAP {
            self.exec_log.pop_front();
        }
    }

    /// Most recent FAULT line, if any.
    pub fn last_fault(&self) -> Option<&str> {
        self.exec_log
            .iter()
            .rev()
            .find(|line| line.starts_with("FAULT:"))
            .map(String::as_str)
    }

    /// The virtual address the current instruction is about to touch, when
    /// it is a READ/WRITE with a well-formed, in-bounds address.
    ///
    /// This is the scheduler's page-fault pre-check hook: malformed or
    /// out-of-bounds tokens return `None` so the violation is raised by the
    /// engine rather than masked by a paging stall.
    pub fn pending_access(&self) -> Option<u32> {
        let addr = match self.instructions.get(self.current_instruction)? {
            Instruction::Read { addr, .. } | Instruction::Write { addr, .. } => addr,
            _ => return None,
        };
        exec::parse_hex_address(addr).filter(|&a| a < self.memory_size)
    }
}
