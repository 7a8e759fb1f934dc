//! Integration tests for the admission surface and batch script parsing.

use os_emulator::config::{Config, ConfigError, SchedulerKind};
use os_emulator::process::instruction::Instruction;
use os_emulator::process::ProcessState;
use os_emulator::shell::script::parse_script;
use os_emulator::system::{AdmissionError, System};

fn create_test_system(test_name: &str) -> System {
    let config = Config {
        num_cpu: 1,
        scheduler: SchedulerKind::Fcfs,
        quantum_cycles: 1,
        delays_per_exec: 0,
        min_ins: 1,
        max_ins: 5,
        max_overall_mem: 1024,
        mem_per_frame: 64,
        ..Config::default()
    };
    let journal = std::env::temp_dir().join(format!("os-emulator-adm-{test_name}.txt"));
    let report = std::env::temp_dir().join(format!("os-emulator-admrep-{test_name}.txt"));
    System::new(config, journal, report).unwrap()
}

/// Tests that system construction refuses an invalid config outright.
#[test]
fn test_system_refuses_invalid_config() {
    let config = Config {
        mem_per_frame: 0,
        ..Config::default()
    };
    let journal = std::env::temp_dir().join("os-emulator-adm-badcfg.txt");
    assert!(matches!(
        System::new(config, journal, "report.txt"),
        Err(ConfigError::Invalid(_))
    ));
}

/// Tests memory-size validation: powers of two in [64, 65536] only.
#[test]
fn test_rejects_bad_memory_sizes() {
    let system = create_test_system("bad-sizes");

    for size in [0, 32, 63, 96, 100, 65537, 131072] {
        assert!(
            matches!(
                system.create_manual("p01", size),
                Err(AdmissionError::InvalidMemorySize(_))
            ),
            "size {size} should be rejected"
        );
    }
    assert!(system.list().is_empty(), "no side effects on rejection");
}

/// Tests script length validation: 1 to 50 instructions.
#[test]
fn test_rejects_bad_script_lengths() {
    let system = create_test_system("bad-lengths");

    assert!(matches!(
        system.create_scripted("p01", 256, Vec::new()),
        Err(AdmissionError::BadScriptLength(0))
    ));

    let too_many = vec![Instruction::Print(None); 51];
    assert!(matches!(
        system.create_scripted("p01", 256, too_many),
        Err(AdmissionError::BadScriptLength(51))
    ));

    let at_cap = vec![Instruction::Print(None); 50];
    assert!(system.create_scripted("p01", 256, at_cap).is_ok());
}

/// Tests that an empty name is rejected.
#[test]
fn test_rejects_empty_name() {
    let system = create_test_system("empty-name");
    assert!(matches!(
        system.create_manual("", 256),
        Err(AdmissionError::InvalidName)
    ));
}

/// Tests pid assignment: monotonic from 1.
#[test]
fn test_pids_are_monotonic() {
    let system = create_test_system("pids");
    let first = system.create_manual("alpha", 256).unwrap();
    let second = system.create_manual("beta", 256).unwrap();
    assert_eq!(first, 1);
    assert_eq!(second, 2);
}

/// Tests the starter script of `screen -s`: declare then two
/// increment/print pairs, ending with x == 2.
#[test]
fn test_manual_starter_script_runs() {
    let system = create_test_system("starter");
    system.create_manual("p01", 256).unwrap();

    for _ in 0..8 {
        system.scheduler().tick();
    }

    let view = system.attach("p01").unwrap();
    assert_eq!(view.state, ProcessState::Finished);
    assert_eq!(view.total_instructions, 5);
    assert_eq!(view.current_instruction, 5);
    assert_eq!(view.variables, vec![("x".to_string(), 2)]);
}

/// Tests attach lookups by name, including the not-found case.
#[test]
fn test_attach_by_name() {
    let system = create_test_system("attach");
    system.create_manual("worker", 256).unwrap();

    let view = system.attach("worker").unwrap();
    assert_eq!(view.name, "worker");
    assert_eq!(view.state, ProcessState::Ready);
    assert!(system.attach("nope").is_none());
}

/// Tests a scripted admission flowing through the batch parser.
#[test]
fn test_scripted_admission_via_parser() {
    let system = create_test_system("scripted");
    let script =
        parse_script("DECLARE total 0; FOR 3 1; ADD total total 2; PRINT \"total=+total\"")
            .unwrap();
    assert_eq!(script.len(), 4);
    system.create_scripted("summer", 256, script).unwrap();

    for _ in 0..12 {
        system.scheduler().tick();
    }

    let view = system.attach("summer").unwrap();
    assert_eq!(view.state, ProcessState::Finished);
    assert_eq!(view.variables, vec![("total".to_string(), 6)]);
}

/// Tests that a malformed script never reaches admission.
#[test]
fn test_malformed_script_is_rejected_by_parser() {
    assert!(parse_script("DECLARE x").is_err());
    assert!(parse_script("FROB x 1").is_err());
    assert!(parse_script("ADD x one two three").is_err());
    assert!(parse_script("DECLARE x abc").is_err());
}
