//! Command script parser.
//!
//! Scripts drive the emulator from text files: one message per line,
//! `#` starts a comment. A line is either a mnemonic with an optional
//! value (`push 5`, `push 0x2A`, `add`, `pop`) or a raw byte pair
//! (`0x0A 0x05`) for exercising arbitrary opcodes, including unrecognized
//! ones. Values accept decimal or `0x` hex.

use crate::command::{
    OP_ADD, OP_AND, OP_INC, OP_IS_EMPTY, OP_IS_FULL, OP_MOD, OP_MUL, OP_NOT, OP_OR, OP_PEEK,
    OP_POP, OP_PUSH, OP_READY, OP_SUB, OP_XOR,
};

/// One host-to-device message: opcode and argument byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub op: u8,
    pub arg: u8,
}

/// Parse a command script into messages.
pub fn parse_script(src: &str) -> Result<Vec<Message>, String> {
    let mut messages = Vec::new();

    for (idx, raw) in src.lines().enumerate() {
        let lineno = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let mut tokens = line.split_whitespace();
        let head = match tokens.next() {
            Some(t) => t,
            None => continue,
        };
        let value = tokens.next();
        if let Some(extra) = tokens.next() {
            return Err(format!("line {}: unexpected trailing token '{}'", lineno, extra));
        }

        let msg = if let Ok(op) = parse_byte(head) {
            // Raw form: opcode [argument]
            let arg = match value {
                Some(t) => parse_byte(t).map_err(|e| format!("line {}: {}", lineno, e))?,
                None => 0,
            };
            Message { op, arg }
        } else {
            let op = match head.to_ascii_lowercase().as_str() {
                "ready" => OP_READY,
                "empty" | "is-empty" => OP_IS_EMPTY,
                "full" | "is-full" => OP_IS_FULL,
                "push" => OP_PUSH,
                "pop" => OP_POP,
                "peek" => OP_PEEK,
                "and" => OP_AND,
                "or" => OP_OR,
                "not" => OP_NOT,
                "xor" => OP_XOR,
                "add" => OP_ADD,
                "sub" => OP_SUB,
                "inc" => OP_INC,
                "mul" => OP_MUL,
                "mod" => OP_MOD,
                other => return Err(format!("line {}: unknown command '{}'", lineno, other)),
            };
            let arg = match value {
                Some(t) => parse_byte(t).map_err(|e| format!("line {}: {}", lineno, e))?,
                None if op == OP_PUSH => {
                    return Err(format!("line {}: push needs a value", lineno));
                }
                None => 0,
            };
            Message { op, arg }
        };
        messages.push(msg);
    }

    Ok(messages)
}

/// Parse a byte literal: decimal or `0x`-prefixed hex.
fn parse_byte(token: &str) -> Result<u8, String> {
    let parsed = if let Some(hex) = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")) {
        u8::from_str_radix(hex, 16)
    } else {
        token.parse::<u8>()
    };
    parsed.map_err(|_| format!("invalid byte '{}'", token))
}
