//! Instruction catalogue for the 6507.
//!
//! The catalogue maps each of the 256 opcode values to an [`InstructionDefinition`].
//! It is built once from the declarative table in `instructions.csv` and never
//! mutated afterwards. Opcodes missing from the table are a valid emulation state
//! and simply decode to `None`.
use once_cell::sync::Lazy;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::{debug, warn};

/// The embedded instruction table.
const SOURCE: &str = include_str!("instructions.csv");

static CATALOGUE: Lazy<Catalogue> = Lazy::new(|| match Catalogue::parse(SOURCE) {
    Ok(catalogue) => {
        catalogue.self_check();
        catalogue
    }
    Err(err) => panic!("embedded instruction table is malformed: {err}"),
});

/// Look up the definition for an opcode in the built-in catalogue.
pub fn lookup(opcode: u8) -> Option<&'static InstructionDefinition> {
    CATALOGUE.lookup(opcode)
}

/// The built-in catalogue.
pub fn catalogue() -> &'static Catalogue {
    &CATALOGUE
}

/// Errors raised while building a catalogue from its table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogueError {
    #[error("line {line}: expected 5 or 6 fields, found {found}")]
    FieldCount { line: usize, found: usize },
    #[error("line {line}: unparsable opcode {value:?}")]
    Opcode { line: usize, value: String },
    #[error("line {line}: unknown mnemonic {value:?}")]
    Mnemonic { line: usize, value: String },
    #[error("line {line}: unparsable cycle count {value:?}")]
    Cycles { line: usize, value: String },
    #[error("line {line}: unknown addressing mode {value:?}")]
    AddressingMode { line: usize, value: String },
    #[error("line {line}: page sensitivity must be true or false, found {value:?}")]
    PageSensitivity { line: usize, value: String },
    #[error("line {line}: unknown effect category {value:?}")]
    Effect { line: usize, value: String },
    #[error("line {line}: opcode {opcode:#04X} is defined twice")]
    Duplicate { line: usize, opcode: u8 },
}

/// How an instruction interprets its operand bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressingMode {
    Implied,
    Immediate,
    Relative,
    Absolute,
    ZeroPage,
    Indirect,
    /// `(zp,X)`
    PreIndexedIndirect,
    /// `(zp),Y`
    PostIndexedIndirect,
    AbsoluteIndexedX,
    AbsoluteIndexedY,
    IndexedZeroPageX,
    IndexedZeroPageY,
}

impl AddressingMode {
    /// Total instruction length, opcode included.
    pub const fn byte_length(self) -> u8 {
        match self {
            Self::Implied => 1,
            Self::Immediate
            | Self::Relative
            | Self::ZeroPage
            | Self::IndexedZeroPageX
            | Self::IndexedZeroPageY
            | Self::PreIndexedIndirect
            | Self::PostIndexedIndirect => 2,
            Self::Absolute | Self::Indirect | Self::AbsoluteIndexedX | Self::AbsoluteIndexedY => 3,
        }
    }

    /// Modes whose effective address always lies in the zero page.
    pub const fn is_zero_page(self) -> bool {
        matches!(
            self,
            Self::ZeroPage | Self::IndexedZeroPageX | Self::IndexedZeroPageY
        )
    }
}

impl FromStr for AddressingMode {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Implied" => Self::Implied,
            "Immediate" => Self::Immediate,
            "Relative" => Self::Relative,
            "Absolute" => Self::Absolute,
            "ZeroPage" => Self::ZeroPage,
            "Indirect" => Self::Indirect,
            "PreIndexedIndirect" => Self::PreIndexedIndirect,
            "PostIndexedIndirect" => Self::PostIndexedIndirect,
            "AbsoluteIndexedX" => Self::AbsoluteIndexedX,
            "AbsoluteIndexedY" => Self::AbsoluteIndexedY,
            "IndexedZeroPageX" => Self::IndexedZeroPageX,
            "IndexedZeroPageY" => Self::IndexedZeroPageY,
            _ => return Err(()),
        })
    }
}

/// Bus behaviour of an instruction.
///
/// Drives the placement of the final memory access within an instruction and
/// tells disassemblers which symbol table an operand address belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Effect {
    #[default]
    Read,
    Write,
    ReadModifyWrite,
    Flow,
    Subroutine,
    Interrupt,
}

impl FromStr for Effect {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "Read" => Self::Read,
            "Write" => Self::Write,
            "ReadModifyWrite" => Self::ReadModifyWrite,
            "Flow" => Self::Flow,
            "Subroutine" => Self::Subroutine,
            "Interrupt" => Self::Interrupt,
            _ => return Err(()),
        })
    }
}

macro_rules! operations {
    ($($variant:ident),+ $(,)?) => {
        /// The semantic operation behind a mnemonic.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum Operation {
            $($variant),+
        }

        impl Operation {
            pub const fn mnemonic(self) -> &'static str {
                match self {
                    $(Self::$variant => pastey::paste!(stringify!([<$variant:upper>]))),+
                }
            }
        }

        impl FromStr for Operation {
            type Err = ();

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                pastey::paste! {
                    match s {
                        $(stringify!([<$variant:upper>]) => Ok(Self::$variant),)+
                        _ => Err(()),
                    }
                }
            }
        }
    };
}

operations!(
    Adc, And, Asl, Bcc, Bcs, Beq, Bit, Bmi, Bne, Bpl, Brk, Bvc, Bvs, Clc, Cld, Cli, Clv, Cmp,
    Cpx, Cpy, Dec, Dex, Dey, Eor, Inc, Inx, Iny, Jmp, Jsr, Lda, Ldx, Ldy, Lsr, Nop, Ora, Pha,
    Php, Pla, Plp, Rol, Ror, Rti, Rts, Sbc, Sec, Sed, Sei, Sta, Stx, Sty, Tax, Tay, Tsx, Txa,
    Txs, Tya, // undocumented
    Kil, Lax, Sax, Dcp, Isc, Slo, Rla, Sre, Rra, Anc, Alr, Arr, Sbx,
);

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// Static definition of one opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InstructionDefinition {
    pub opcode: u8,
    pub mnemonic: &'static str,
    pub operation: Operation,
    /// Total bytes including the opcode. Always `addressing_mode.byte_length()`.
    pub byte_length: u8,
    /// Cycle count before page-crossing and branch penalties.
    pub base_cycles: u32,
    pub addressing_mode: AddressingMode,
    /// Whether crossing a page while addressing costs an extra cycle.
    pub page_sensitive: bool,
    pub effect: Effect,
}

impl InstructionDefinition {
    pub const fn is_branch(&self) -> bool {
        matches!(self.addressing_mode, AddressingMode::Relative)
    }
}

/// A complete opcode table.
pub struct Catalogue {
    entries: [Option<InstructionDefinition>; 256],
}

impl fmt::Debug for Catalogue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Catalogue")
            .field("defined", &self.defined_count())
            .finish_non_exhaustive()
    }
}

impl Catalogue {
    /// Build a catalogue from table text.
    ///
    /// Each non-blank line that does not start with `#` is one record:
    /// `opcode, mnemonic, cycles, addressing mode, page sensitive [, effect]`.
    /// Any malformed record rejects the whole table.
    pub fn parse(source: &'static str) -> Result<Self, CatalogueError> {
        let mut entries = [None; 256];

        for (index, raw) in source.lines().enumerate() {
            let line = index + 1;
            let record = raw.trim();
            if record.is_empty() || record.starts_with('#') {
                continue;
            }

            let definition = parse_record(line, record)?;
            let slot = &mut entries[usize::from(definition.opcode)];
            if slot.is_some() {
                return Err(CatalogueError::Duplicate {
                    line,
                    opcode: definition.opcode,
                });
            }
            *slot = Some(definition);
        }

        Ok(Self { entries })
    }

    pub fn lookup(&self, opcode: u8) -> Option<&InstructionDefinition> {
        self.entries[usize::from(opcode)].as_ref()
    }

    /// Number of opcode slots with a definition.
    pub fn defined_count(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_some()).count()
    }

    /// Opcodes without a definition, in ascending order.
    pub fn undefined_opcodes(&self) -> Vec<u8> {
        (0..=u8::MAX)
            .filter(|&opcode| self.lookup(opcode).is_none())
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstructionDefinition> {
        self.entries.iter().flatten()
    }

    /// Startup coverage check. Gaps are reported, never fatal.
    fn self_check(&self) {
        let defined = self.defined_count();
        if defined < self.entries.len() {
            warn!(
                defined,
                undefined = self.entries.len() - defined,
                "instruction catalogue does not cover every opcode"
            );
            debug!(opcodes = ?self.undefined_opcodes(), "undefined opcodes");
        }

        #[cfg(debug_assertions)]
        for definition in self.iter() {
            debug_assert_eq!(
                definition.byte_length,
                definition.addressing_mode.byte_length(),
                "{definition:?}"
            );
        }
    }
}

fn parse_record(line: usize, record: &'static str) -> Result<InstructionDefinition, CatalogueError> {
    let fields: Vec<&'static str> = record.split(',').map(str::trim).collect();
    if !(5..=6).contains(&fields.len()) {
        return Err(CatalogueError::FieldCount {
            line,
            found: fields.len(),
        });
    }

    let opcode = fields[0]
        .strip_prefix("0x")
        .and_then(|hex| u8::from_str_radix(hex, 16).ok())
        .ok_or_else(|| CatalogueError::Opcode {
            line,
            value: fields[0].to_owned(),
        })?;

    let mnemonic = fields[1];
    let operation = mnemonic
        .parse::<Operation>()
        .map_err(|()| CatalogueError::Mnemonic {
            line,
            value: mnemonic.to_owned(),
        })?;

    let base_cycles = fields[2]
        .parse::<u32>()
        .map_err(|_| CatalogueError::Cycles {
            line,
            value: fields[2].to_owned(),
        })?;

    let addressing_mode =
        fields[3]
            .parse::<AddressingMode>()
            .map_err(|()| CatalogueError::AddressingMode {
                line,
                value: fields[3].to_owned(),
            })?;

    let page_sensitive = match fields[4] {
        "true" => true,
        "false" => false,
        other => {
            return Err(CatalogueError::PageSensitivity {
                line,
                value: other.to_owned(),
            })
        }
    };

    let effect = match fields.get(5) {
        Some(name) => name.parse::<Effect>().map_err(|()| CatalogueError::Effect {
            line,
            value: (*name).to_owned(),
        })?,
        None => Effect::default(),
    };

    Ok(InstructionDefinition {
        opcode,
        mnemonic,
        operation,
        byte_length: addressing_mode.byte_length(),
        base_cycles,
        addressing_mode,
        page_sensitive,
        effect,
    })
}
