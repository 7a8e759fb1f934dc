//! Typed instruction set.
//!
//! Eight opcodes, each with a typed operand tuple. Operand validation lives
//! here, at the parse boundary: a script that survives parsing contains no
//! unknown opcodes, wrong arities, or unparseable literals, so the engine
//! never has to skip over malformed entries at runtime. The one token kept
//! raw is the hex address of `READ`/`WRITE`: it is validated when the
//! instruction executes, and an invalid token is a memory violation, not a
//! parse error.

use std::fmt;

use thiserror::Error;

/// Parse failure for a single instruction. Surfaced through the admission
/// path; a rejected script leaves no trace in the core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("unknown instruction '{0}'")]
    UnknownOpcode(String),

    #[error("{op} expects {expected} operand(s), got {got}")]
    BadArity {
        op: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("'{0}' is not a valid identifier")]
    BadIdentifier(String),

    #[error("'{0}' is not a valid integer literal")]
    BadLiteral(String),
}

/// A value source: a decimal literal or a variable reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Literal(i32),
    Var(String),
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::Literal(value) => write!(f, "{value}"),
            Operand::Var(name) => write!(f, "{name}"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Instruction {
    /// Emit a message (default greeting when absent), expanding
    /// `+<identifier>` substrings to variable values.
    Print(Option<String>),
    Declare {
        var: String,
        value: i32,
    },
    Add {
        dst: String,
        lhs: Operand,
        rhs: Operand,
    },
    Subtract {
        dst: String,
        lhs: Operand,
        rhs: Operand,
    },
    Sleep(u32),
    /// Loop over the next `block` instructions `iterations` times.
    For {
        iterations: u32,
        block: u32,
    },
    /// Load from data memory. The address token is kept raw (case included)
    /// so a violation report can echo it verbatim.
    Read {
        var: String,
        addr: String,
    },
    Write {
        addr: String,
        value: Operand,
    },
}

impl Instruction {
    /// Builds an instruction from an opcode token and its argument tokens.
    pub fn parse(op: &str, args: &[String]) -> Result<Self, ParseError> {
        match op {
            "PRINT" => Ok(Instruction::Print(if args.is_empty() {
                None
            } else {
                Some(args.join(" "))
            })),
            "DECLARE" => {
                expect_arity("DECLARE", args, 2)?;
                Ok(Instruction::Declare {
                    var: parse_identifier(&args[0])?,
                    value: parse_literal(&args[1])?,
                })
            }
            "ADD" => {
                expect_arity("ADD", args, 3)?;
                Ok(Instruction::Add {
                    dst: parse_identifier(&args[0])?,
                    lhs: parse_operand(&args[1])?,
                    rhs: parse_operand(&args[2])?,
                })
            }
            "SUBTRACT" => {
                expect_arity("SUBTRACT", args, 3)?;
                Ok(Instruction::Subtract {
                    dst: parse_identifier(&args[0])?,
                    lhs: parse_operand(&args[1])?,
                    rhs: parse_operand(&args[2])?,
                })
            }
            "SLEEP" => {
                expect_arity("SLEEP", args, 1)?;
                let ticks = args[0]
                    .parse()
                    .map_err(|_| ParseError::BadLiteral(args[0].clone()))?;
                Ok(Instruction::Sleep(ticks))
            }
            "FOR" => {
                expect_arity("FOR", args, 2)?;
                let iterations = args[0]
                    .parse()
                    .map_err(|_| ParseError::BadLiteral(args[0].clone()))?;
                let block = args[1]
                    .parse()
                    .map_err(|_| ParseError::BadLiteral(args[1].clone()))?;
                Ok(Instruction::For { iterations, block })
            }
            "READ" => {
                expect_arity("READ", args, 2)?;
                Ok(Instruction::Read {
                    var: parse_identifier(&args[0])?,
                    addr: args[1].clone(),
                })
            }
            "WRITE" => {
                expect_arity("WRITE", args, 2)?;
                Ok(Instruction::Write {
                    addr: args[0].clone(),
                    value: parse_operand(&args[1])?,
                })
            }
            other => Err(ParseError::UnknownOpcode(other.to_string())),
        }
    }
}

impl fmt::Display for Instruction {
    /// Opcode and operands in source form, as recorded in exec logs.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Instruction::Print(None) => write!(f, "PRINT"),
            Instruction::Print(Some(msg)) => write!(f, "PRINT {msg}"),
            Instruction::Declare { var, value } => write!(f, "DECLARE {var} {value}"),
            Instruction::Add { dst, lhs, rhs } => write!(f, "ADD {dst} {lhs} {rhs}"),
            Instruction::Subtract { dst, lhs, rhs } => write!(f, "SUBTRACT {dst} {lhs} {rhs}"),
            Instruction::Sleep(ticks) => write!(f, "SLEEP {ticks}"),
            Instruction::For { iterations, block } => write!(f, "FOR {iterations} {block}"),
            Instruction::Read { var, addr } => write!(f, "READ {var} {addr}"),
            Instruction::Write { addr, value } => write!(f, "WRITE {addr} {value}"),
        }
    }
}

/// Identifiers start with a non-digit and contain only alphanumerics and
/// underscores.
pub fn is_identifier(token: &str) -> bool {
    let mut chars = token.chars();
    match chars.next() {
        Some(first) if !first.is_ascii_digit() => {
            (first.is_ascii_alphanumeric() || first == '_')
                && chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        _ => false,
    }
}

fn expect_arity(op: &'static str, args: &[String], expected: usize) -> Result<(), ParseError> {
    if args.len() == expected {
        Ok(())
    } else {
        Err(ParseError::BadArity {
            op,
            expected,
            got: args.len(),
        })
    }
}

fn parse_identifier(token: &str) -> Result<String, ParseError> {
    if is_identifier(token) {
        Ok(token.to_string())
    } else {
        Err(ParseError::BadIdentifier(token.to_string()))
    }
}

fn parse_literal(token: &str) -> Result<i32, ParseError> {
    token
        .parse()
        .map_err(|_| ParseError::BadLiteral(token.to_string()))
}

/// A token starting with a digit or `-` must be a literal; anything else
/// must be an identifier.
fn parse_operand(token: &str) -> Result<Operand, ParseError> {
    if token.chars().next().is_some_and(|c| c == '-' || c.is_ascii_digit()) {
        parse_literal(token).map(Operand::Literal)
    } else {
        parse_identifier(token).map(Operand::Var)
    }
}
