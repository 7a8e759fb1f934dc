//! Batch script parser.
//!
//! Turns the quoted, semicolon-separated command string of
//! `screen -c <name> <memsize> "<instructions>"` into a typed instruction
//! list. Splitting and trimming happen here; per-instruction validation is
//! `Instruction::parse`. `PRINT` is the one opcode whose remainder is kept
//! as a single message argument (surrounding quotes stripped) instead of
//! being tokenized.

use crate::process::instruction::{Instruction, ParseError};

/// Parses a semicolon-separated command string.
///
/// Empty segments (doubled or trailing semicolons, whitespace-only) are
/// skipped; the first malformed instruction aborts the whole script.
pub fn parse_script(source: &str) -> Result<Vec<Instruction>, ParseError> {
    let mut instructions = Vec::new();

    for segment in source.split(';') {
        let line = segment.trim();
        if line.is_empty() {
            continue;
        }

        let (op, rest) = match line.split_once(char::is_whitespace) {
            Some((op, rest)) => (op, rest.trim()),
            None => (line, ""),
        };

        let args: Vec<String> = if op == "PRINT" {
            if rest.is_empty() {
                Vec::new()
            } else {
                vec![strip_quotes(rest).to_string()]
            }
        } else {
            rest.split_whitespace().map(str::to_string).collect()
        };

        instructions.push(Instruction::parse(op, &args)?);
    }

    Ok(instructions)
}

/// Strips one pair of surrounding double quotes, if present.
fn strip_quotes(text: &str) -> &str {
    text.strip_prefix('"')
        .and_then(|inner| inner.strip_suffix('"'))
        .unwrap_or(text)
}

#[cfg(test)]
mod tests {
    use crate::process::instruction::Operand;

    use super::*;

    #[test]
    fn parses_a_three_instruction_script() {
        let script = parse_script("DECLARE x 5; ADD x x 1; PRINT +x").unwrap();
        assert_eq!(script.len(), 3);
        assert_eq!(
            script[0],
            Instruction::Declare {
                var: "x".to_string(),
                value: 5
            }
        );
        assert_eq!(script[2], Instruction::Print(Some("+x".to_string())));
    }

    #[test]
    fn print_message_keeps_internal_spaces() {
        let script = parse_script("PRINT \"value is +x\"").unwrap();
        assert_eq!(
            script,
            vec![Instruction::Print(Some("value is +x".to_string()))]
        );
    }

    #[test]
    fn skips_empty_segments() {
        let script = parse_script("DECLARE x 1;; SLEEP 2 ;").unwrap();
        assert_eq!(script.len(), 2);
    }

    #[test]
    fn propagates_arity_errors() {
        assert!(matches!(
            parse_script("DECLARE x 1; WRITE 0x10"),
            Err(ParseError::BadArity { op: "WRITE", .. })
        ));
    }

    #[test]
    fn keeps_write_operand_typed() {
        let script = parse_script("WRITE 0x10 y").unwrap();
        assert_eq!(
            script,
            vec![Instruction::Write {
                addr: "0x10".to_string(),
                value: Operand::Var("y".to_string()),
            }]
        );
    }
}
