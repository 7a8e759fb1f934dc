//! Integration tests for the tick-driven scheduler.
//!
//! Every test builds a `System` and drives `scheduler().tick()` by hand;
//! the wall-clock worker thread is never started, so ticks are instant and
//! deterministic. Instruction ordering across processes is asserted via
//! exec-log tick stamps.

use os_emulator::config::{Config, SchedulerKind};
use os_emulator::process::instruction::Instruction;
use os_emulator::process::ProcessState;
use os_emulator::report::ProcessView;
use os_emulator::shell::script::parse_script;
use os_emulator::system::System;

fn create_test_system(test_name: &str, config: Config) -> System {
    let journal = std::env::temp_dir().join(format!("os-emulator-sched-{test_name}.txt"));
    let report = std::env::temp_dir().join(format!("os-emulator-rep-{test_name}.txt"));
    System::new(config, journal, report).unwrap()
}

fn single_core(scheduler: SchedulerKind, quantum_cycles: u32) -> Config {
    Config {
        num_cpu: 1,
        scheduler,
        quantum_cycles,
        delays_per_exec: 0,
        min_ins: 1,
        max_ins: 5,
        max_overall_mem: 1024,
        mem_per_frame: 64,
        ..Config::default()
    }
}

fn run_ticks(system: &System, count: u64) {
    for _ in 0..count {
        system.scheduler().tick();
    }
}

fn prints(message: &str, count: usize) -> Vec<Instruction> {
    vec![Instruction::Print(Some(message.to_string())); count]
}

/// Ticks at which the process's logged instructions executed, ascending.
fn exec_ticks(view: &ProcessView) -> Vec<u64> {
    let mut ticks: Vec<u64> = view
        .recent_log
        .iter()
        .map(|line| {
            let end = line.find(']').expect("log line has tick prefix");
            line[1..end].parse().expect("tick parses")
        })
        .collect();
    ticks.sort_unstable();
    ticks
}

/// Tests the single-core FCFS smoke scenario: declare, increment, print.
#[test]
fn test_fcfs_smoke() {
    let system = create_test_system("fcfs-smoke", single_core(SchedulerKind::Fcfs, 1));
    let script = parse_script("DECLARE x 41; ADD x x 1; PRINT \"v=+x\"").unwrap();
    system.create_scripted("p01", 256, script).unwrap();

    run_ticks(&system, 6);

    let view = system.attach("p01").unwrap();
    assert_eq!(view.state, ProcessState::Finished);
    assert_eq!(view.current_instruction, 3);
    assert_eq!(view.total_instructions, 3);
    assert_eq!(
        view.variables,
        vec![("x".to_string(), 42)],
        "saturating add produced 42"
    );
}

/// Tests round-robin preemption ordering: quantum 2 alternates the two
/// processes in pairs of instructions.
#[test]
fn test_rr_alternates_in_quantum_pairs() {
    let system = create_test_system("rr-pairs", single_core(SchedulerKind::Rr, 2));
    system.create_scripted("p01", 256, prints("a", 10)).unwrap();
    system.create_scripted("p02", 256, prints("b", 10)).unwrap();

    run_ticks(&system, 40);

    let p01 = system.attach("p01").unwrap();
    let p02 = system.attach("p02").unwrap();
    assert_eq!(p01.state, ProcessState::Finished);
    assert_eq!(p02.state, ProcessState::Finished);

    let mut merged: Vec<(u64, char)> = exec_ticks(&p01)
        .into_iter()
        .map(|tick| (tick, 'a'))
        .chain(exec_ticks(&p02).into_iter().map(|tick| (tick, 'b')))
        .collect();
    merged.sort_unstable();

    let order: String = merged.iter().map(|(_, label)| *label).collect();
    assert!(
        order.starts_with("aabbaabb"),
        "expected pairwise alternation, got {order}"
    );
}

/// Tests FCFS ordering: an earlier admission fully precedes a later one.
#[test]
fn test_fcfs_preserves_admission_order() {
    let system = create_test_system("fcfs-order", single_core(SchedulerKind::Fcfs, 1));
    system.create_scripted("p01", 256, prints("a", 3)).unwrap();
    system.create_scripted("p02", 256, prints("b", 3)).unwrap();

    run_ticks(&system, 12);

    let first = exec_ticks(&system.attach("p01").unwrap());
    let second = exec_ticks(&system.attach("p02").unwrap());
    assert!(
        first.last().unwrap() < second.first().unwrap(),
        "p01 must finish before p02 starts"
    );
}

/// Tests the sleep/wake scenario: the process spends the full five ticks
/// sleeping and prints no earlier than admission + 6.
#[test]
fn test_sleep_and_wake() {
    let system = create_test_system("sleep-wake", single_core(SchedulerKind::Fcfs, 1));
    let script = parse_script("PRINT \"pre\"; SLEEP 5; PRINT \"post\"").unwrap();
    system.create_scripted("p01", 256, script).unwrap();

    let mut sleeping_observed = 0;
    for _ in 0..12 {
        system.scheduler().tick();
        if system.attach("p01").unwrap().state == ProcessState::Sleeping {
            sleeping_observed += 1;
        }
    }

    let view = system.attach("p01").unwrap();
    assert_eq!(view.state, ProcessState::Finished);
    assert!(sleeping_observed >= 5, "slept {sleeping_observed} ticks");

    let post_tick = *exec_ticks(&view).last().unwrap();
    assert!(post_tick >= 6, "post printed at tick {post_tick}");
}

/// Tests the page-fault stall: the faulting tick pages the frame in
/// without executing, and the quantum is untouched while stalled.
#[test]
fn test_page_fault_stalls_without_executing() {
    let system = create_test_system("fault-stall", single_core(SchedulerKind::Fcfs, 1));
    let script = parse_script("WRITE 0x0 7").unwrap();
    system.create_scripted("p01", 256, script).unwrap();

    // Tick 1 dispatches; tick 2 faults the page in and stalls.
    run_ticks(&system, 2);
    assert_eq!(system.memory().paged_in(), 1);
    let view = system.attach("p01").unwrap();
    assert_eq!(view.state, ProcessState::Running);
    assert_eq!(view.current_instruction, 0, "stall does not execute");
    assert_eq!(system.utilization().used, 0, "stalled core is not utilized");

    // Tick 3 retries and executes.
    run_ticks(&system, 1);
    let view = system.attach("p01").unwrap();
    assert_eq!(view.current_instruction, 1);
    assert_eq!(system.utilization().used, 1);
    assert_eq!(system.memory().paged_in(), 1, "no second fault");

    run_ticks(&system, 1);
    assert_eq!(
        system.attach("p01").unwrap().state,
        ProcessState::Finished
    );
}

/// Tests the end-to-end memory violation scenario: out-of-bounds WRITE
/// terminates the process without consuming a frame.
#[test]
fn test_memory_violation_terminates_process() {
    let system = create_test_system("violation", single_core(SchedulerKind::Fcfs, 1));
    let script = parse_script("WRITE 0x100 5").unwrap();
    system.create_scripted("p01", 64, script).unwrap();

    run_ticks(&system, 3);

    let view = system.attach("p01").unwrap();
    assert_eq!(view.state, ProcessState::MemoryViolated);
    assert!(view
        .fault_line
        .as_deref()
        .unwrap()
        .starts_with("FAULT: invalid WRITE address 0x100"));
    let message = view.violation_message.unwrap();
    assert!(message.starts_with("Process p01 shut down due to memory access violation error"));
    assert!(message.ends_with("0x100 invalid."));

    assert_eq!(system.memory().paged_in(), 0, "no frame was consumed");
    assert_eq!(system.memory().process_rss(view.pid), 0);
}

/// Tests that terminal processes release their frames eagerly.
#[test]
fn test_finished_process_releases_frames() {
    let system = create_test_system("release", single_core(SchedulerKind::Fcfs, 1));
    let script = parse_script("WRITE 0x0 1; WRITE 0x40 2").unwrap();
    system.create_scripted("p01", 256, script).unwrap();

    // Dispatch + (stall, write) per instruction + finish.
    run_ticks(&system, 8);

    let view = system.attach("p01").unwrap();
    assert_eq!(view.state, ProcessState::Finished);
    assert_eq!(system.memory().used_memory(), 0);
    assert_eq!(system.memory().paged_in(), 2);
}

/// Tests periodic generation: one synthesized process every
/// batch-process-freq ticks while enabled, none after stopping.
#[test]
fn test_batch_generation_cadence() {
    let mut config = single_core(SchedulerKind::Fcfs, 1);
    config.batch_process_freq = 2;
    config.min_ins = 3;
    config.max_ins = 3;
    let system = create_test_system("generation", config);

    system.scheduler_start();
    run_ticks(&system, 6);
    assert_eq!(system.list().len(), 3, "ticks 2, 4, 6 each generate");

    system.scheduler_stop();
    run_ticks(&system, 6);
    assert_eq!(system.list().len(), 3, "generation stopped");

    let names: Vec<String> = system.list().into_iter().map(|e| e.name).collect();
    assert!(names.contains(&"p01".to_string()));
}

/// Tests utilization accounting: idle and active core-ticks sum to
/// cores x ticks.
#[test]
fn test_tick_accounting() {
    let mut config = single_core(SchedulerKind::Fcfs, 1);
    config.num_cpu = 2;
    let system = create_test_system("accounting", config);

    run_ticks(&system, 5);
    let stats = system.vmstat();
    assert_eq!(stats.idle_ticks, 10);
    assert_eq!(stats.active_ticks, 0);
    assert_eq!(stats.total_ticks(), 10);

    system.create_scripted("p01", 256, prints("a", 4)).unwrap();
    run_ticks(&system, 5);
    let stats = system.vmstat();
    assert_eq!(stats.total_ticks(), 20);
    assert!(stats.active_ticks >= 4, "p01 occupied a core while running");
}

/// Tests the report writer: utilization header plus the process list.
#[test]
fn test_report_util_writes_file() {
    let system = create_test_system("report", single_core(SchedulerKind::Fcfs, 1));
    system.create_manual("p01", 256).unwrap();

    let path = system.report_util().unwrap();
    let contents = std::fs::read_to_string(path).unwrap();
    assert!(contents.starts_with("CPU Utilization:"));
    assert!(contents.contains("p01 [READY]"));
}
