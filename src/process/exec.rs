//! Single-step instruction engine.
//!
//! `execute_one` runs exactly one instruction of a process and mutates only
//! that PCB. All arithmetic happens in 32-bit signed space and is saturated
//! to the unsigned 16-bit range on store. The engine never touches the
//! memory manager: residency of READ/WRITE targets is the scheduler's
//! pre-check, so by the time an instruction executes here its page is
//! either resident or irrelevant.

use std::time::{SystemTime, UNIX_EPOCH};

use log::{debug, warn};

use super::instruction::{Instruction, Operand};
use super::{Process, ProcessState, Violation};
use super::{BYTES_PER_VALUE, MAX_LOOP_DEPTH, SYMBOL_TABLE_BYTES};

const U16_MIN_VALUE: i32 = 0;
const U16_MAX_VALUE: i32 = 65535;

/// Executes one instruction of `p` at the given tick.
///
/// Order of phases:
/// 1. busy-wait (`delays_per_exec` stall ticks per instruction),
/// 2. termination check,
/// 3. exec-log append,
/// 4. the opcode itself,
/// 5. advance + FOR-loop epilogue,
/// 6. delay reload for the next instruction.
///
/// A memory violation returns immediately: no advance, no delay reload.
pub fn execute_one(p: &mut Process, tick: u64, delays_per_exec: u32) {
    if p.delay_ticks_left > 0 {
        p.delay_ticks_left -= 1;
        return;
    }

    if p.current_instruction >= p.instructions.len() {
        debug!("process {} finished", p.name);
        p.state = ProcessState::Finished;
        return;
    }

    let ins = p.instructions[p.current_instruction].clone();
    p.log_event(tick, &format!("EXEC {ins}"));

    match ins {
        Instruction::Print(message) => {
            let message =
                message.unwrap_or_else(|| format!("Hello world from {}!", p.name));
            let expanded = expand_message(&message, p);
            println!("[{}] {}", p.name, expanded);
        }
        Instruction::Declare { var, value } => {
            if ensure_symbol_slot(p, &var) {
                p.variables.insert(var, saturate(value));
            }
        }
        Instruction::Add { dst, lhs, rhs } => arithmetic(p, &dst, &lhs, &rhs, true),
        Instruction::Subtract { dst, lhs, rhs } => arithmetic(p, &dst, &lhs, &rhs, false),
        Instruction::Sleep(ticks) => {
            p.state = ProcessState::Sleeping;
            p.sleep_until_tick = tick + u64::from(ticks);
        }
        Instruction::Read { var, addr } => {
            let Some(addr) = checked_address(p, "READ", &addr) else {
                return;
            };
            if ensure_symbol_slot(p, &var) {
                let value = p.data_memory.get(&addr).copied().unwrap_or(0);
                p.variables.insert(var, value);
            }
        }
        Instruction::Write { addr, value } => {
            let Some(addr) = checked_address(p, "WRITE", &addr) else {
                return;
            };
            let raw = operand_value(p, &value);
            p.data_memory.insert(addr, saturate(raw));
        }
        Instruction::For { iterations, block } => {
            let start = p.current_instruction + 1;
            let end = p.current_instruction + block as usize;
            let fits = start < p.instructions.len() && end <= p.instructions.len();

            if p.loop_stack.len() >= MAX_LOOP_DEPTH || !fits {
                debug!(
                    "[{}] FOR skipped (depth {} of {}, block {})",
                    p.name,
                    p.loop_stack.len(),
                    MAX_LOOP_DEPTH,
                    block
                );
                // Falls through to the normal advance below.
            } else {
                p.loop_stack.push(super::LoopFrame {
                    start,
                    end,
                    iterations_remaining: iterations.saturating_sub(1),
                });
                p.current_instruction = start;
                p.delay_ticks_left = delays_per_exec;
                return;
            }
        }
    }

    p.current_instruction += 1;
    loop_epilogue(p);
    p.delay_ticks_left = delays_per_exec;
}

/// After the instruction pointer advances past the innermost body, rewind
/// for the next iteration or pop the frame. Popping cascades: several
/// nested bodies can end on the same instruction, and every frame whose
/// end was just passed gets its turn.
fn loop_epilogue(p: &mut Process) {
    while let Some(frame) = p.loop_stack.last_mut() {
        if p.current_instruction <= frame.end {
            break;
        }
        if frame.iterations_remaining > 0 {
            frame.iterations_remaining -= 1;
            p.current_instruction = frame.start;
            break;
        }
        p.loop_stack.pop();
    }
}

/// Parses a `0x`/`0X`-prefixed hex token. `None` when the prefix is
/// missing, no digits follow, a non-hex character appears, or the value
/// overflows 32 bits.
pub fn parse_hex_address(token: &str) -> Option<u32> {
    let digits = token
        .strip_prefix("0x")
        .or_else(|| token.strip_prefix("0X"))?;
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
        return None;
    }
    u32::from_str_radix(digits, 16).ok()
}

/// Expands every `+<identifier>` substring to the decimal value of that
/// variable, with the usual auto-init rule (reads of unknown variables see
/// 0; the variable is only stored if the symbol table has room).
pub fn expand_message(message: &str, p: &mut Process) -> String {
    let chars: Vec<char> = message.chars().collect();
    let mut out = String::with_capacity(message.len());
    let mut i = 0;

    while i < chars.len() {
        if chars[i] == '+' {
            let mut j = i + 1;
            while j < chars.len() && (chars[j].is_ascii_alphanumeric() || chars[j] == '_') {
                j += 1;
            }
            if j > i + 1 && !chars[i + 1].is_ascii_digit() {
                let name: String = chars[i + 1..j].iter().collect();
                let value = lookup_value(p, &name);
                out.push_str(&value.to_string());
                i = j;
                continue;
            }
        }
        out.push(chars[i]);
        i += 1;
    }

    out
}

/// Clamps a 32-bit intermediate into the unsigned 16-bit value range.
pub fn saturate(value: i32) -> u16 {
    value.clamp(U16_MIN_VALUE, U16_MAX_VALUE) as u16
}

/// Makes sure `name` has a slot in the symbol table, creating it at 0 when
/// there is room. Returns false (without storing) when the table is full.
fn ensure_symbol_slot(p: &mut Process, name: &str) -> bool {
    if p.variables.contains_key(name) {
        return true;
    }
    if p.symbol_table_bytes_used + BYTES_PER_VALUE > SYMBOL_TABLE_BYTES {
        debug!(
            "[{}] symbol table full, ignoring variable '{}'",
            p.name, name
        );
        return false;
    }
    p.symbol_table_bytes_used += BYTES_PER_VALUE;
    p.variables.insert(name.to_string(), 0);
    true
}

fn lookup_value(p: &mut Process, name: &str) -> u16 {
    if ensure_symbol_slot(p, name) {
        p.variables[name]
    } else {
        0
    }
}

fn operand_value(p: &mut Process, operand: &Operand) -> i32 {
    match operand {
        Operand::Literal(value) => *value,
        Operand::Var(name) => i32::from(lookup_value(p, name)),
    }
}

fn arithmetic(p: &mut Process, dst: &str, lhs: &Operand, rhs: &Operand, is_add: bool) {
    // The destination slot is claimed first; a full symbol table drops the
    // whole operation, including operand auto-init.
    if !ensure_symbol_slot(p, dst) {
        return;
    }
    let lhs = operand_value(p, lhs);
    let rhs = operand_value(p, rhs);
    let result = if is_add { lhs + rhs } else { lhs - rhs };
    p.variables.insert(dst.to_string(), saturate(result));
}

/// Validates a READ/WRITE address token against the process's declared
/// memory size. On failure records the violation and flips the state;
/// callers must bail out of the instruction.
fn checked_address(p: &mut Process, op: &str, token: &str) -> Option<u32> {
    match parse_hex_address(token) {
        Some(addr) if addr < p.memory_size => Some(addr),
        _ => {
            p.push_log(format!("FAULT: invalid {op} address {token}"));
            p.violation = Some(Violation {
                addr_token: token.to_string(),
                wall_clock: wall_clock_hms(),
            });
            p.state = ProcessState::MemoryViolated;
            warn!(
                "[{}] memory access violation on {} at {} (mem size {})",
                p.name, op, token, p.memory_size
            );
            None
        }
    }
}

/// Host wall-clock time of day as HH:MM:SS (UTC).
fn wall_clock_hms() -> String {
    let secs = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    let day = secs % 86_400;
    format!("{:02}:{:02}:{:02}", day / 3600, (day % 3600) / 60, day % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn process_with(vars: &[(&str, u16)]) -> Process {
        let mut p = Process::new(1, "p01".to_string(), Vec::new(), 1024);
        for (name, value) in vars {
            p.symbol_table_bytes_used += BYTES_PER_VALUE;
            p.variables.insert(name.to_string(), *value);
        }
        p
    }

    #[test]
    fn hex_address_accepts_both_prefixes() {
        assert_eq!(parse_hex_address("0x1A"), Some(26));
        assert_eq!(parse_hex_address("0X1a"), Some(26));
    }

    #[test]
    fn hex_address_rejects_malformed_tokens() {
        assert_eq!(parse_hex_address("1A"), None);
        assert_eq!(parse_hex_address("0x"), None);
        assert_eq!(parse_hex_address("0x1G"), None);
        assert_eq!(parse_hex_address("0x1FFFFFFFF"), None);
    }

    #[test]
    fn saturates_at_both_ends() {
        assert_eq!(saturate(-1), 0);
        assert_eq!(saturate(0), 0);
        assert_eq!(saturate(65535), 65535);
        assert_eq!(saturate(65536), 65535);
    }

    #[test]
    fn expands_variable_references() {
        let mut p = process_with(&[("x", 42)]);
        assert_eq!(expand_message("v=+x", &mut p), "v=42");
    }

    #[test]
    fn expansion_auto_initializes_unknowns_to_zero() {
        let mut p = process_with(&[]);
        assert_eq!(expand_message("+missing!", &mut p), "0!");
        assert_eq!(p.variables.get("missing"), Some(&0));
    }

    #[test]
    fn expansion_ignores_digit_leading_runs() {
        let mut p = process_with(&[]);
        assert_eq!(expand_message("1+1=2", &mut p), "1+1=2");
        assert!(p.variables.is_empty());
    }

    #[test]
    fn expansion_handles_adjacent_identifier_chars() {
        let mut p = process_with(&[("x1", 7)]);
        assert_eq!(expand_message("a +x1 b", &mut p), "a 7 b");
    }
}
