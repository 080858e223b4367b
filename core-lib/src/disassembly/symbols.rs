//! Address-to-name tables used when rendering operands.
use crate::catalogue::Effect;
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SymbolError {
    #[error("line {line}: expected `<label|read|write> <name> <address>`")]
    Malformed { line: usize },
    #[error("line {line}: unknown symbol kind {kind:?}")]
    Kind { line: usize, kind: String },
    #[error("line {line}: invalid address {value:?}")]
    Address { line: usize, value: String },
}

/// Names for code labels and for registers that read and write differently.
///
/// Hardware registers often share an address between a read-only and a
/// write-only function, so read and write accesses are resolved separately.
/// Both fall back to the code labels when no access-specific name exists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SymbolTable {
    labels: HashMap<u16, String>,
    reads: HashMap<u16, String>,
    writes: HashMap<u16, String>,
}

impl SymbolTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_label(&mut self, addr: u16, name: impl Into<String>) {
        self.labels.insert(addr, name.into());
    }

    pub fn add_read(&mut self, addr: u16, name: impl Into<String>) {
        self.reads.insert(addr, name.into());
    }

    pub fn add_write(&mut self, addr: u16, name: impl Into<String>) {
        self.writes.insert(addr, name.into());
    }

    pub fn label(&self, addr: u16) -> Option<&str> {
        self.labels.get(&addr).map(String::as_str)
    }

    /// Name for an address accessed by an instruction with the given effect.
    pub fn lookup(&self, effect: Effect, addr: u16) -> Option<&str> {
        let specific = match effect {
            Effect::Write | Effect::ReadModifyWrite => self.writes.get(&addr),
            Effect::Read => self.reads.get(&addr),
            Effect::Flow | Effect::Subroutine | Effect::Interrupt => None,
        };
        specific.map(String::as_str).or_else(|| self.label(addr))
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty() && self.reads.is_empty() && self.writes.is_empty()
    }

    /// Parse a symbol file.
    ///
    /// One symbol per line as `<label|read|write> <name> <address>`, where the
    /// address is hex with an optional `$` or `0x` prefix. Blank lines and lines
    /// starting with `#` are skipped.
    pub fn parse(source: &str) -> Result<Self, SymbolError> {
        let mut table = Self::new();
        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let text = raw.trim();
            if text.is_empty() || text.starts_with('#') {
                continue;
            }

            let fields: Vec<&str> = text.split_whitespace().collect();
            let [kind, name, value] = fields.as_slice() else {
                return Err(SymbolError::Malformed { line });
            };
            let addr = parse_hex(value).ok_or_else(|| SymbolError::Address {
                line,
                value: (*value).to_owned(),
            })?;

            match *kind {
                "label" => table.add_label(addr, *name),
                "read" => table.add_read(addr, *name),
                "write" => table.add_write(addr, *name),
                other => {
                    return Err(SymbolError::Kind {
                        line,
                        kind: other.to_owned(),
                    })
                }
            }
        }
        Ok(table)
    }
}

fn parse_hex(value: &str) -> Option<u16> {
    let digits = value
        .strip_prefix('$')
        .or_else(|| value.strip_prefix("0x"))
        .unwrap_or(value);
    u16::from_str_radix(digits, 16).ok()
}
