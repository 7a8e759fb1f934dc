//! Random process synthesis for batch generation.
//!
//! While generation is enabled the scheduler asks this module for one new
//! process every `batch-process-freq` ticks. Instruction mix: a 1-in-10
//! chance of a FOR header whenever at least two slots remain, otherwise a
//! uniform pick over the seven plain opcodes with small operand ranges, so
//! generated workloads exercise arithmetic, sleeping, and paging without
//! running forever.

use rand::rngs::SmallRng;
use rand::Rng;

use crate::config::Config;
use crate::process::instruction::{Instruction, Operand};
use crate::process::{Process, DEFAULT_PROCESS_MEMORY};

/// Variables generated instructions draw from.
const VAR_POOL: [&str; 4] = ["x", "y", "z", "counter"];

/// 1-in-N chance of emitting a FOR header.
const FOR_CHANCE: u32 = 10;
const MIN_FOR_ITERATIONS: u32 = 2;
const MAX_FOR_ITERATIONS: u32 = 5;
const MIN_FOR_BODY: usize = 2;
const MAX_FOR_BODY: usize = 5;

/// Exclusive upper bound for random DECLARE values.
const MAX_DECLARE_VALUE: i32 = 100;
/// Exclusive upper bound for random ADD/SUBTRACT literals.
const MAX_ARITHMETIC_OPERAND: i32 = 50;
const MIN_SLEEP_TICKS: u32 = 1;
const MAX_SLEEP_TICKS: u32 = 10;
/// READ/WRITE addresses fall inside this simulated range.
const GENERATED_ADDRESS_SPACE: u32 = 4096;

/// `p01`-style name: zero-padded to two digits for single-digit pids.
pub fn process_name(pid: u32) -> String {
    if pid < 10 {
        format!("p0{pid}")
    } else {
        format!("p{pid}")
    }
}

/// Builds a process with a random instruction list of length
/// `[min_ins, max_ins]` and the default memory size.
pub fn synthesize(rng: &mut SmallRng, pid: u32, config: &Config) -> Process {
    let count = rng.gen_range(config.min_ins..=config.max_ins) as usize;
    let mut instructions = Vec::with_capacity(count);

    for i in 0..count {
        let remaining = count - i - 1;
        if remaining >= MIN_FOR_BODY && rng.gen_ratio(1, FOR_CHANCE) {
            let iterations = rng.gen_range(MIN_FOR_ITERATIONS..=MAX_FOR_ITERATIONS);
            let block = rng.gen_range(MIN_FOR_BODY..=remaining.min(MAX_FOR_BODY)) as u32;
            instructions.push(Instruction::For { iterations, block });
            continue;
        }

        instructions.push(match rng.gen_range(0..7) {
            0 => Instruction::Print(None),
            1 => Instruction::Declare {
                var: pick_var(rng),
                value: rng.gen_range(0..MAX_DECLARE_VALUE),
            },
            2 => Instruction::Add {
                dst: pick_var(rng),
                lhs: random_operand(rng, MAX_ARITHMETIC_OPERAND),
                rhs: random_operand(rng, MAX_ARITHMETIC_OPERAND),
            },
            3 => Instruction::Subtract {
                dst: pick_var(rng),
                lhs: random_operand(rng, MAX_ARITHMETIC_OPERAND),
                rhs: random_operand(rng, MAX_ARITHMETIC_OPERAND),
            },
            4 => Instruction::Sleep(rng.gen_range(MIN_SLEEP_TICKS..=MAX_SLEEP_TICKS)),
            5 => Instruction::Read {
                var: pick_var(rng),
                addr: hex_address(rng),
            },
            _ => Instruction::Write {
                addr: hex_address(rng),
                value: random_operand(rng, MAX_DECLARE_VALUE),
            },
        });
    }

    Process::new(pid, process_name(pid), instructions, DEFAULT_PROCESS_MEMORY)
}

fn pick_var(rng: &mut SmallRng) -> String {
    VAR_POOL[rng.gen_range(0..VAR_POOL.len())].to_string()
}

/// 50/50 between a pool variable and a literal in `[0, max_literal)`.
fn random_operand(rng: &mut SmallRng, max_literal: i32) -> Operand {
    if rng.gen_bool(0.5) {
        Operand::Literal(rng.gen_range(0..max_literal))
    } else {
        Operand::Var(pick_var(rng))
    }
}

fn hex_address(rng: &mut SmallRng) -> String {
    format!("0x{:X}", rng.gen_range(0..GENERATED_ADDRESS_SPACE))
}
