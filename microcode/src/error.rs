use std::{io, path::PathBuf};

use thiserror::Error;

use crate::ds::Opcode;

#[derive(Debug, Error)]
#[error("Error on line {line_number}: {message}")]
pub(crate) struct ParseError {
    line_number: usize,
    message: String,
}

impl ParseError {
    pub(crate) fn new(line_number: usize, message: &str) -> Self {
        ParseError {
            line_number,
            message: message.to_string(),
        }
    }
}

/// Inconsistent signal, write-device or instruction tables
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum TableError {
    #[error("Signal '{0}' defined more than once")]
    DuplicateSignal(String),
    #[error("Signals '{first}' and '{second}' share bit {bit}")]
    SharedBit {
        first: String,
        second: String,
        bit: u8,
    },
    #[error("Bit {bit} of signal '{name}' is outside the 32-bit control word")]
    BitOutOfRange { name: String, bit: u32 },
    #[error("Write-device field at offset {offset} with width {width} does not fit the control word")]
    FieldOutOfRange { offset: u32, width: u32 },
    #[error("No write-device field declared, expected a '~ OFFSET/WIDTH' line")]
    MissingField,
    #[error("Write device '{0}' defined more than once")]
    DuplicateDevice(String),
    #[error("Selector code {code} of write device '{name}' is used more than once")]
    DuplicateSelector { name: String, code: u32 },
    #[error("Selector code {code} of write device '{name}' does not fit a {width}-bit field")]
    SelectorOutOfRange { name: String, code: u32, width: u8 },
    #[error("Selector code 0 is reserved for the idle device, cannot assign it to '{0}'")]
    ReservedSelector(String),
    #[error("Bit {bit} of signal '{name}' overlaps the write-device field")]
    OverlapsField { name: String, bit: u8 },
    #[error("Signal '{0}' is also a write-device mnemonic")]
    AmbiguousSignal(String),
    #[error("Opcode {0} does not fit the 4-bit opcode field")]
    OpcodeOutOfRange(u32),
    #[error("Opcode {0} defined more than once")]
    DuplicateOpcode(Opcode),
    #[error("Opcode {opcode} has {count} steps, at most 16 fit the step counter")]
    TooManySteps { opcode: Opcode, count: usize },
}

/// A micro-step that cannot be turned into a control word
#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum EncodeError {
    #[error("Unknown signal '{signal}' in opcode {opcode} step {step}")]
    UnknownSignal {
        signal: String,
        opcode: Opcode,
        step: usize,
    },
    #[error("Write devices '{first}' and '{second}' both drive the data bus in opcode {opcode} step {step}")]
    ConflictingWriteDevices {
        first: String,
        second: String,
        opcode: Opcode,
        step: usize,
    },
}

#[derive(Debug, Error)]
pub(crate) enum RomError {
    #[error("Cannot serialize ROM plane {plane}: {message}")]
    Serialize { plane: usize, message: String },
    #[error("Cannot write '{}': a directory is in the way", .path.display())]
    NotAFile { path: PathBuf },
    #[error("File error writing '{}': {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

#[derive(Debug, Error)]
pub(crate) enum Error {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error("Invalid ISA profile: {0}")]
    Table(#[from] TableError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Rom(#[from] RomError),
    #[error("Unknown built-in profile '{name}', available: {available}")]
    UnknownProfile { name: String, available: String },
    #[error("Cannot read profile '{}': {source}", .path.display())]
    ReadProfile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}
