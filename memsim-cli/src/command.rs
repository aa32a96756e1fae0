//! # Command File Parser
//!
//! Reads the simulator's text command format, grounded in
//! `original_source/commands.c`'s `handle_line`/`handle_line_instruction`/
//! `handle_line_data_read`/`handle_line_data_write`. One line, one command:
//!
//! ```text
//! R  I     @<vaddr_hex64>
//! R  DW    @<vaddr_hex64>
//! R  DB    @<vaddr_hex64>
//! W  DW  <data_hex32>  @<vaddr_hex64>
//! W  DB  <data_hex8>   @<vaddr_hex64>
//! ```
//!
//! `W I` is rejected here rather than left to the cache layer, matching the
//! source's `writingInstruction` check.

use crate::error::{CliError, CliResult};
use std::path::{Path, PathBuf};

/// What kind of access a command performs.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum CommandKind {
    /// Instruction fetch (always a 4-byte word).
    ReadInstruction { vaddr: u64 },
    /// Data read of `size` bytes (1 or 4).
    ReadData { vaddr: u64, size: u8 },
    /// Data write of `size` bytes (1 or 4) with the given value.
    WriteData { vaddr: u64, size: u8, value: u32 },
}

/// One parsed line of a command file, numbered in file order.
#[derive(Copy, Clone, Debug)]
pub struct Command {
    /// 1-based position among the *commands* in the file (blank lines and
    /// comments do not consume an order number).
    pub order: usize,
    /// The access this command performs.
    pub kind: CommandKind,
}

fn strip_comment(line: &str) -> &str {
    line.split(';').next().unwrap_or("")
}

fn parse_hex_u64(token: &str) -> Result<u64, String> {
    let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    u64::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value `{token}`: {e}"))
}

fn parse_hex_u32(token: &str) -> Result<u32, String> {
    let digits = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    u32::from_str_radix(digits, 16).map_err(|e| format!("invalid hex value `{token}`: {e}"))
}

/// Parse write data that must be exactly `digits` hex characters wide
/// (`program_add_command`'s `wrongSize` check in `original_source/commands.c`
/// rejects a mismatched token rather than silently truncating it).
fn parse_hex_data_exact(token: &str, digits: usize) -> Result<u32, String> {
    let stripped = token.strip_prefix("0x").or_else(|| token.strip_prefix("0X")).unwrap_or(token);
    if stripped.len() != digits {
        return Err(format!("write data `{token}` must be exactly {digits} hex digits wide"));
    }
    parse_hex_u32(token)
}

fn parse_vaddr(token: Option<&str>) -> Result<u64, String> {
    let token = token.ok_or_else(|| "missing virtual address".to_string())?;
    let token = token.strip_prefix('@').ok_or_else(|| format!("expected `@<vaddr>`, found `{token}`"))?;
    parse_hex_u64(token)
}

/// `commands.c`'s `invalidAddr` check: a word-sized access must target a
/// 4-byte-aligned virtual address.
fn require_word_alignment(vaddr: u64) -> Result<(), String> {
    if vaddr % 4 != 0 {
        return Err(format!("word access to {vaddr:#x} is not 4-byte aligned"));
    }
    Ok(())
}

fn parse_line(line: &str) -> Result<Option<CommandKind>, String> {
    let line = strip_comment(line).trim();
    if line.is_empty() {
        return Ok(None);
    }
    let mut tokens = line.split_whitespace();
    let order = tokens.next().ok_or("empty command")?;
    match order {
        "R" => {
            let access = tokens.next().ok_or("missing access type after `R`")?;
            let kind = match access {
                "I" => {
                    let vaddr = parse_vaddr(tokens.next())?;
                    require_word_alignment(vaddr)?;
                    CommandKind::ReadInstruction { vaddr }
                }
                "DW" => {
                    let vaddr = parse_vaddr(tokens.next())?;
                    require_word_alignment(vaddr)?;
                    CommandKind::ReadData { vaddr, size: 4 }
                }
                "DB" => CommandKind::ReadData { vaddr: parse_vaddr(tokens.next())?, size: 1 },
                other => return Err(format!("unknown read access type `{other}`")),
            };
            if tokens.next().is_some() {
                return Err("trailing tokens after command".to_string());
            }
            Ok(Some(kind))
        }
        "W" => {
            let access = tokens.next().ok_or("missing access type after `W`")?;
            let kind = match access {
                "I" => return Err("instruction writes are not supported".to_string()),
                "DW" => {
                    let value = parse_hex_data_exact(tokens.next().ok_or("missing write data")?, 8)?;
                    let vaddr = parse_vaddr(tokens.next())?;
                    require_word_alignment(vaddr)?;
                    CommandKind::WriteData { vaddr, size: 4, value }
                }
                "DB" => {
                    let value = parse_hex_data_exact(tokens.next().ok_or("missing write data")?, 2)?;
                    CommandKind::WriteData { vaddr: parse_vaddr(tokens.next())?, size: 1, value }
                }
                other => return Err(format!("unknown write access type `{other}`")),
            };
            if tokens.next().is_some() {
                return Err("trailing tokens after command".to_string());
            }
            Ok(Some(kind))
        }
        other => Err(format!("unknown command order `{other}`, expected `R` or `W`")),
    }
}

/// Parse every command out of a command file, skipping blank lines and
/// `;`-prefixed or `;`-trailing comments.
pub fn parse_commands(path: &Path) -> CliResult<Vec<Command>> {
    let text = std::fs::read_to_string(path).map_err(|source| CliError::Io { path: PathBuf::from(path), source })?;
    let mut commands = Vec::new();
    for (line_no, raw_line) in text.lines().enumerate() {
        match parse_line(raw_line) {
            Ok(Some(kind)) => {
                commands.push(Command { order: commands.len() + 1, kind });
            }
            Ok(None) => {}
            Err(reason) => {
                return Err(CliError::Parse { path: PathBuf::from(path), line: line_no + 1, reason });
            }
        }
    }
    Ok(commands)
}
