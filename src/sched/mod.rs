//! Tick-driven multi-core scheduler.
//!
//! One background worker thread owns the tick loop; the REPL thread only
//! touches shared state through admission and query calls. Everything the
//! queues and core slots need lives behind one coarse lock; contention is
//! negligible at 100 ms per tick. Counters that reports read frequently
//! (tick, utilization accumulators, paging totals) sit in atomics next to
//! the lock.
//!
//! Per tick: advance the clock, account utilization, maybe synthesize a
//! process, wake due sleepers, step every occupied core (stalling on page
//! faults without burning quantum), then refill idle cores from the ready
//! queue.

pub mod generator;

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::Duration;

use log::debug;
use rand::rngs::SmallRng;
use rand::SeedableRng;

use crate::config::{Config, SchedulerKind};
use crate::memory::MemoryManager;
use crate::process::{exec, Process, ProcessState};

/// Real-time pacing of the tick loop: one tick per 100 ms of wall time.
pub const CPU_TICK_DELAY_MS: u64 = 100;

/// Queues and core slots, guarded by the scheduler lock.
///
/// A live process is in exactly one place: the ready queue, the sleeping
/// list, a core slot, or the finished list.
pub struct SchedState {
    pub ready: VecDeque<Process>,
    pub sleeping: Vec<Process>,
    /// Terminal processes, retained for reporting.
    pub finished: Vec<Process>,
    pub cores: Vec<Option<Process>>,
    last_generation_tick: u64,
    rng: SmallRng,
}

pub struct Scheduler {
    config: Arc<Config>,
    memory: Arc<MemoryManager>,
    /// Shared global tick; also read by the memory manager for FIFO/LRU
    /// stamps and by reports.
    clock: Arc<AtomicU64>,
    next_pid: AtomicU32,
    generating: AtomicBool,
    total_active_ticks: AtomicU64,
    total_idle_ticks: AtomicU64,
    state: Mutex<SchedState>,
}

impl Scheduler {
    pub fn new(config: Arc<Config>, memory: Arc<MemoryManager>, clock: Arc<AtomicU64>) -> Self {
        let cores = (0..config.num_cpu).map(|_| None).collect();
        Self {
            config,
            memory,
            clock,
            next_pid: AtomicU32::new(1),
            generating: AtomicBool::new(false),
            total_active_ticks: AtomicU64::new(0),
            total_idle_ticks: AtomicU64::new(0),
            state: Mutex::new(SchedState {
                ready: VecDeque::new(),
                sleeping: Vec::new(),
                finished: Vec::new(),
                cores,
                last_generation_tick: 0,
                rng: SmallRng::from_entropy(),
            }),
        }
    }

    /// Spawns the detached worker thread driving `tick` at the fixed
    /// real-time pace.
    pub fn spawn_worker(self: &Arc<Self>) {
        let scheduler = Arc::clone(self);
        thread::spawn(move || loop {
            scheduler.tick();
            thread::sleep(Duration::from_millis(CPU_TICK_DELAY_MS));
        });
    }

    /// Runs one tick of the scheduler. Exposed so tests can drive the loop
    /// without the wall-clock pacing thread.
    pub fn tick(&self) {
        let tick = self.clock.fetch_add(1, Ordering::SeqCst) + 1;
        let mut st = self.state.lock().unwrap();

        let occupied = st.cores.iter().flatten().count() as u64;
        self.total_active_ticks.fetch_add(occupied, Ordering::Relaxed);
        self.total_idle_ticks
            .fetch_add(u64::from(self.config.num_cpu) - occupied, Ordering::Relaxed);

        if self.generating.load(Ordering::Relaxed)
            && tick - st.last_generation_tick >= self.config.batch_process_freq
        {
            st.last_generation_tick = tick;
            let pid = self.allocate_pid();
            let process = generator::synthesize(&mut st.rng, pid, &self.config);
            debug!(
                "generating process {} ({} instructions)",
                process.name,
                process.instructions.len()
            );
            self.memory.allocate(pid, u64::from(process.memory_size));
            st.ready.push_back(process);
        }

        self.wake_sleepers(&mut st, tick);
        self.step_cores(&mut st, tick);
        self.dispatch(&mut st);
    }

    /// Moves every sleeper whose deadline has passed back to the ready
    /// queue, in iteration order.
    fn wake_sleepers(&self, st: &mut SchedState, tick: u64) {
        let mut index = 0;
        while index < st.sleeping.len() {
            if st.sleeping[index].sleep_until_tick <= tick {
                let mut process = st.sleeping.remove(index);
                debug!("process {} waking up", process.name);
                process.state = ProcessState::Ready;
                st.ready.push_back(process);
            } else {
                index += 1;
            }
        }
    }

    /// Executes one instruction on every occupied core, handling page-fault
    /// stalls, retirement, sleep transitions, and RR preemption.
    fn step_cores(&self, st: &mut SchedState, tick: u64) {
        for index in 0..st.cores.len() {
            let Some(process) = st.cores[index].as_mut() else {
                continue;
            };

            // Page-fault pre-check: a READ/WRITE over a non-resident page
            // stalls this tick. No instruction, no quantum decrement.
            if let Some(vaddr) = process.pending_access() {
                if !self.memory.is_resident(process.pid, vaddr) {
                    self.memory.request_page(process.pid, vaddr);
                    process.waiting_on_fault = true;
                    continue;
                }
            }
            process.waiting_on_fault = false;

            exec::execute_one(process, tick, self.config.delays_per_exec);

            match process.state {
                ProcessState::Finished | ProcessState::MemoryViolated => {
                    let process = st.cores[index].take().unwrap();
                    // Terminal states release their frames eagerly.
                    self.memory.deallocate(process.pid);
                    st.finished.push(process);
                }
                ProcessState::Sleeping => {
                    let process = st.cores[index].take().unwrap();
                    st.sleeping.push(process);
                }
                _ => {
                    if self.config.scheduler == SchedulerKind::Rr {
                        let process = st.cores[index].as_mut().unwrap();
                        if process.quantum_ticks_left > 0 {
                            process.quantum_ticks_left -= 1;
                        }
                        if process.quantum_ticks_left == 0 {
                            let mut process = st.cores[index].take().unwrap();
                            debug!("process {} preempted", process.name);
                            process.state = ProcessState::Ready;
                            st.ready.push_back(process);
                        }
                    }
                }
            }
        }
    }

    /// Fills idle cores from the front of the ready queue.
    fn dispatch(&self, st: &mut SchedState) {
        for index in 0..st.cores.len() {
            if st.ready.is_empty() {
                break;
            }
            if st.cores[index].is_none() {
                let mut process = st.ready.pop_front().unwrap();
                process.state = ProcessState::Running;
                process.waiting_on_fault = false;
                if self.config.scheduler == SchedulerKind::Rr {
                    process.quantum_ticks_left = self.config.quantum_cycles;
                }
                debug!("dispatching {} to core {}", process.name, index);
                st.cores[index] = Some(process);
            }
        }
    }

    /// Hands out the next monotonically increasing pid.
    pub fn allocate_pid(&self) -> u32 {
        self.next_pid.fetch_add(1, Ordering::SeqCst)
    }

    /// Pushes an admitted process onto the ready queue.
    pub fn push_ready(&self, process: Process) {
        self.state.lock().unwrap().ready.push_back(process);
    }

    pub fn set_generating(&self, enabled: bool) {
        self.generating.store(enabled, Ordering::Relaxed);
    }

    pub fn is_generating(&self) -> bool {
        self.generating.load(Ordering::Relaxed)
    }

    pub fn current_tick(&self) -> u64 {
        self.clock.load(Ordering::SeqCst)
    }

    pub fn total_active_ticks(&self) -> u64 {
        self.total_active_ticks.load(Ordering::Relaxed)
    }

    pub fn total_idle_ticks(&self) -> u64 {
        self.total_idle_ticks.load(Ordering::Relaxed)
    }

    /// Snapshot access for the query layer; held only briefly.
    pub fn lock_state(&self) -> MutexGuard<'_, SchedState> {
        self.state.lock().unwrap()
    }
}
