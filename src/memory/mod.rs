//! Demand-paged memory manager.
//!
//! A fixed pool of frames backs the simulated physical memory. Page tables
//! are created eagerly at allocation (one entry per covered page, all
//! non-resident) but frames are claimed only on first touch. When the pool
//! is full, the configured replacement policy picks a victim; the eviction
//! and the load are both recorded in the backing-store journal.
//!
//! All operations serialize on a single internal lock. Paging counters are
//! additionally kept in atomics so reporting can read them without taking
//! the lock. Determinism, not throughput, is the goal here.

pub mod journal;
pub mod policy;

use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use crate::config::{Config, ConfigError};

use journal::Journal;
use policy::ReplacementPolicy;

/// One slot of simulated physical memory.
#[derive(Debug, Clone)]
pub struct Frame {
    pub frame_id: usize,
    /// Owning process, or `None` when the frame is free.
    pub owner_pid: Option<u32>,
    pub page_num: u32,
    /// Reserved: tracked on every swap-in but never consulted.
    pub dirty: bool,
    /// Tick at which the current page was loaded (FIFO key).
    pub allocated_tick: u64,
    /// Tick of the most recent touch (LRU key).
    pub last_accessed_tick: u64,
}

impl Frame {
    fn free(frame_id: usize) -> Self {
        Self {
            frame_id,
            owner_pid: None,
            page_num: 0,
            dirty: false,
            allocated_tick: 0,
            last_accessed_tick: 0,
        }
    }
}

/// Everything guarded by the memory-manager lock.
struct MemState {
    frames: Vec<Frame>,
    /// pid -> page number -> frame index (`None` = not resident).
    /// An entry exists iff the process's allocation covers that page.
    page_tables: HashMap<u32, HashMap<u32, Option<usize>>>,
    journal: Journal,
}

pub struct MemoryManager {
    frame_size: u64,
    total_frames: usize,
    policy: Box<dyn ReplacementPolicy>,
    /// Shared global tick, read for FIFO/LRU stamps.
    clock: Arc<AtomicU64>,
    state: Mutex<MemState>,
    paged_in: AtomicU64,
    paged_out: AtomicU64,
}

impl MemoryManager {
    /// Builds the frame pool and truncates the journal.
    ///
    /// Refuses a zero frame size; the pool size is fixed for the lifetime of
    /// the manager.
    pub fn new(
        config: &Config,
        journal_path: impl AsRef<Path>,
        clock: Arc<AtomicU64>,
    ) -> Result<Self, ConfigError> {
        if config.mem_per_frame == 0 {
            return Err(ConfigError::Invalid("mem-per-frame must be non-zero"));
        }

        let total_frames = config.total_frames();
        let frames = (0..total_frames).map(Frame::free).collect();

        Ok(Self {
            frame_size: config.mem_per_frame,
            total_frames,
            policy: policy::from_kind(config.replacement_policy),
            clock,
            state: Mutex::new(MemState {
                frames,
                page_tables: HashMap::new(),
                journal: Journal::create(journal_path),
            }),
            paged_in: AtomicU64::new(0),
            paged_out: AtomicU64::new(0),
        })
    }

    /// Creates the page table for a new process: one non-resident entry per
    /// page covered by `size` bytes.
    pub fn allocate(&self, pid: u32, size: u64) {
        let num_pages = size.div_ceil(self.frame_size) as u32;
        let mut state = self.state.lock().unwrap();
        let table = state.page_tables.entry(pid).or_default();
        for page in 0..num_pages {
            table.insert(page, None);
        }
    }

    /// Releases every frame owned by `pid` and drops its page table.
    /// No-op for unknown pids; idempotent.
    pub fn deallocate(&self, pid: u32) {
        let mut state = self.state.lock().unwrap();
        for frame in &mut state.frames {
            if frame.owner_pid == Some(pid) {
                frame.owner_pid = None;
                frame.page_num = 0;
                frame.dirty = false;
            }
        }
        state.page_tables.remove(&pid);
    }

    /// Whether the page containing `vaddr` is backed by a frame. A hit
    /// refreshes the frame's `last_accessed_tick` from the global clock.
    pub fn is_resident(&self, pid: u32, vaddr: u32) -> bool {
        let page = self.page_of(vaddr);
        let mut state = self.state.lock().unwrap();

        let resident = state
            .page_tables
            .get(&pid)
            .and_then(|table| table.get(&page).copied())
            .flatten();

        match resident {
            Some(frame_index) => {
                let now = self.clock.load(Ordering::SeqCst);
                state.frames[frame_index].last_accessed_tick = now;
                true
            }
            None => false,
        }
    }

    /// Makes the page containing `vaddr` resident. Idempotent when it
    /// already is; otherwise claims a free frame or evicts a victim, then
    /// swaps the page in. Never fails: the pool is non-empty and eviction is
    /// always possible.
    pub fn request_page(&self, pid: u32, vaddr: u32) {
        let page = self.page_of(vaddr);
        let now = self.clock.load(Ordering::SeqCst);
        let mut state = self.state.lock().unwrap();

        match state.page_tables.get(&pid).and_then(|table| table.get(&page)) {
            // Allocation never covered this page; bounds checks are the
            // caller's job, so nothing to map.
            None => return,
            Some(Some(_)) => return,
            Some(None) => {}
        }

        let frame_index = match state.frames.iter().position(|f| f.owner_pid.is_none()) {
            Some(free) => free,
            None => {
                let victim = self.policy.select_victim(&state.frames);
                self.swap_out(&mut state, victim);
                victim
            }
        };

        self.swap_in(&mut state, pid, page, frame_index, now);
    }

    pub fn total_memory(&self) -> u64 {
        self.total_frames as u64 * self.frame_size
    }

    pub fn used_memory(&self) -> u64 {
        let state = self.state.lock().unwrap();
        let occupied = state.frames.iter().filter(|f| f.owner_pid.is_some()).count();
        occupied as u64 * self.frame_size
    }

    pub fn free_memory(&self) -> u64 {
        self.total_memory() - self.used_memory()
    }

    /// Resident set size of `pid` in bytes.
    pub fn process_rss(&self, pid: u32) -> u64 {
        let state = self.state.lock().unwrap();
        let owned = state
            .frames
            .iter()
            .filter(|f| f.owner_pid == Some(pid))
            .count();
        owned as u64 * self.frame_size
    }

    pub fn paged_in(&self) -> u64 {
        self.paged_in.load(Ordering::Relaxed)
    }

    pub fn paged_out(&self) -> u64 {
        self.paged_out.load(Ordering::Relaxed)
    }

    fn page_of(&self, vaddr: u32) -> u32 {
        (vaddr as u64 / self.frame_size) as u32
    }

    fn swap_out(&self, state: &mut MemState, frame_index: usize) {
        let (owner, page) = {
            let frame = &state.frames[frame_index];
            (frame.owner_pid, frame.page_num)
        };

        if let Some(owner_pid) = owner {
            state.journal.swap_out(owner_pid, page, frame_index);
            if let Some(table) = state.page_tables.get_mut(&owner_pid) {
                table.insert(page, None);
            }
            self.paged_out.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn swap_in(&self, state: &mut MemState, pid: u32, page: u32, frame_index: usize, now: u64) {
        state.journal.swap_in(pid, page, frame_index);

        let frame = &mut state.frames[frame_index];
        frame.owner_pid = Some(pid);
        frame.page_num = page;
        frame.dirty = false;
        frame.allocated_tick = now;
        frame.last_accessed_tick = now;

        state
            .page_tables
            .get_mut(&pid)
            .expect("page table exists for faulting pid")
            .insert(page, Some(frame_index));
        self.paged_in.fetch_add(1, Ordering::Relaxed);
    }
}
