//! Configuration loading and validation.
//!
//! The emulator reads a whitespace-separated key/value file (`config.txt` by
//! default). Unknown keys consume and discard one value token; missing keys
//! fall back to defaults. The snapshot is immutable after startup and shared
//! read-only by every subsystem.

use std::fs;
use std::path::Path;

use thiserror::Error;

const DEFAULT_NUM_CPU: u32 = 4;
const DEFAULT_QUANTUM_CYCLES: u32 = 5;
const DEFAULT_BATCH_PROCESS_FREQ: u64 = 1;
const DEFAULT_MIN_INS: u32 = 1000;
const DEFAULT_MAX_INS: u32 = 2000;
const DEFAULT_DELAYS_PER_EXEC: u32 = 0;
const DEFAULT_MAX_OVERALL_MEM: u64 = 16384;
const DEFAULT_MEM_PER_FRAME: u64 = 16;
const DEFAULT_MIN_MEM_PER_PROC: u64 = 4096;
const DEFAULT_MAX_MEM_PER_PROC: u64 = 4096;

/// Error raised while loading or validating a configuration file.
///
/// Any error here refuses initialization outright; no emulator state is
/// created from a config that failed to load.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("unknown scheduler '{0}' (expected 'fcfs' or 'rr')")]
    UnknownScheduler(String),

    #[error("unknown replacement policy '{0}' (expected 'fifo' or 'lru')")]
    UnknownPolicy(String),

    #[error("key '{key}' has invalid value '{value}'")]
    BadValue { key: String, value: String },

    #[error("invalid configuration: {0}")]
    Invalid(&'static str),
}

/// Scheduling discipline for the tick loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerKind {
    /// First-come-first-served; a dispatched process holds its core until it
    /// finishes, sleeps, or faults.
    Fcfs,
    /// Round-robin with a fixed quantum in ticks.
    Rr,
}

/// Page replacement policy selected at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyKind {
    Fifo,
    Lru,
}

/// Immutable configuration snapshot.
#[derive(Debug, Clone)]
pub struct Config {
    pub num_cpu: u32,
    pub scheduler: SchedulerKind,
    pub quantum_cycles: u32,
    /// Ticks between synthesized processes while generation is enabled.
    pub batch_process_freq: u64,
    pub min_ins: u32,
    pub max_ins: u32,
    /// Busy-wait ticks inserted before each executed instruction.
    pub delays_per_exec: u32,
    /// Total simulated physical memory in bytes.
    pub max_overall_mem: u64,
    /// Frame (and page) size in bytes; must divide `max_overall_mem`.
    pub mem_per_frame: u64,
    pub min_mem_per_proc: u64,
    pub max_mem_per_proc: u64,
    pub replacement_policy: PolicyKind,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            num_cpu: DEFAULT_NUM_CPU,
            scheduler: SchedulerKind::Rr,
            quantum_cycles: DEFAULT_QUANTUM_CYCLES,
            batch_process_freq: DEFAULT_BATCH_PROCESS_FREQ,
            min_ins: DEFAULT_MIN_INS,
            max_ins: DEFAULT_MAX_INS,
            delays_per_exec: DEFAULT_DELAYS_PER_EXEC,
            max_overall_mem: DEFAULT_MAX_OVERALL_MEM,
            mem_per_frame: DEFAULT_MEM_PER_FRAME,
            min_mem_per_proc: DEFAULT_MIN_MEM_PER_PROC,
            max_mem_per_proc: DEFAULT_MAX_MEM_PER_PROC,
            replacement_policy: PolicyKind::Fifo,
        }
    }
}

impl Config {
    /// Reads and parses a config file, then validates the result.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path)?;
        let config = Self::parse(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Parses whitespace-separated key/value token pairs.
    ///
    /// Recognized keys mirror the on-disk format: `num-cpu`, `scheduler`,
    /// `quantum-cycles`, `batch-process-freq`, `min-ins`, `max-ins`,
    /// `delays-per-exec`, `max-overall-mem`, `mem-per-frame`,
    /// `min-mem-per-proc`, `max-mem-per-proc`, `replacement-policy`.
    pub fn parse(contents: &str) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let mut tokens = contents.split_whitespace();

        while let Some(key) = tokens.next() {
            let Some(value) = tokens.next() else { break };
            match key {
                "num-cpu" => config.num_cpu = parse_value(key, value)?,
                "scheduler" => config.scheduler = parse_scheduler(value)?,
                "quantum-cycles" => config.quantum_cycles = parse_value(key, value)?,
                "batch-process-freq" => config.batch_process_freq = parse_value(key, value)?,
                "min-ins" => config.min_ins = parse_value(key, value)?,
                "max-ins" => config.max_ins = parse_value(key, value)?,
                "delays-per-exec" => config.delays_per_exec = parse_value(key, value)?,
                "max-overall-mem" => config.max_overall_mem = parse_value(key, value)?,
                "mem-per-frame" => config.mem_per_frame = parse_value(key, value)?,
                "min-mem-per-proc" => config.min_mem_per_proc = parse_value(key, value)?,
                "max-mem-per-proc" => config.max_mem_per_proc = parse_value(key, value)?,
                "replacement-policy" => config.replacement_policy = parse_policy(value)?,
                // Unknown key: the value token has already been consumed.
                _ => {}
            }
        }

        Ok(config)
    }

    /// Checks every range constraint; refuses the whole snapshot on the
    /// first violation.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_cpu < 1 {
            return Err(ConfigError::Invalid("num-cpu must be at least 1"));
        }
        if self.quantum_cycles < 1 {
            return Err(ConfigError::Invalid("quantum-cycles must be at least 1"));
        }
        if self.batch_process_freq < 1 {
            return Err(ConfigError::Invalid("batch-process-freq must be at least 1"));
        }
        if self.min_ins < 1 {
            return Err(ConfigError::Invalid("min-ins must be at least 1"));
        }
        if self.max_ins < self.min_ins {
            return Err(ConfigError::Invalid("max-ins must be at least min-ins"));
        }
        if self.mem_per_frame == 0 {
            return Err(ConfigError::Invalid("mem-per-frame must be non-zero"));
        }
        if self.max_overall_mem == 0 || self.max_overall_mem % self.mem_per_frame != 0 {
            return Err(ConfigError::Invalid(
                "mem-per-frame must divide max-overall-mem",
            ));
        }
        if self.max_mem_per_proc < self.min_mem_per_proc {
            return Err(ConfigError::Invalid(
                "max-mem-per-proc must be at least min-mem-per-proc",
            ));
        }
        Ok(())
    }

    /// Number of physical frames in the simulated pool.
    pub fn total_frames(&self) -> usize {
        (self.max_overall_mem / self.mem_per_frame) as usize
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.parse().map_err(|_| ConfigError::BadValue {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_scheduler(value: &str) -> Result<SchedulerKind, ConfigError> {
    match value {
        "fcfs" => Ok(SchedulerKind::Fcfs),
        "rr" => Ok(SchedulerKind::Rr),
        other => Err(ConfigError::UnknownScheduler(other.to_string())),
    }
}

fn parse_policy(value: &str) -> Result<PolicyKind, ConfigError> {
    match value {
        "fifo" => Ok(PolicyKind::Fifo),
        "lru" => Ok(PolicyKind::Lru),
        other => Err(ConfigError::UnknownPolicy(other.to_string())),
    }
}
