use crate::{
    ds::{Instruction, MicroStep, Opcode},
    error::{ParseError, TableError},
    tables::{InstructionTable, IsaProfile, Signal, SignalTable, WriteDevice, WriteDeviceTable},
};
use std::io::BufRead;

/// Reads an ISA profile from its line-oriented text form:
///
/// ```text
/// @ NAME:BIT NAME:BIT ...     single-bit signals
/// ~ OFFSET/WIDTH              write-device field
/// % CODE DEVICE MNEMONIC      write device
/// > OPCODE [MNEMONIC]         start an instruction
/// = SIGNAL SIGNAL ...         append a micro-step
/// ```
///
/// Numbers accept an `h`, `d` or `b` radix prefix. `#` starts a comment.
/// Each entry goes straight into its table, so table errors carry the line
/// that caused them.
#[derive(Debug)]
pub(crate) struct ParserState {
    line_number: usize,
    signals: SignalTable,
    write_devices: Option<WriteDeviceTable>,
    instructions: InstructionTable,
    current: Option<Opcode>,
}

impl ParserState {
    pub(crate) fn new() -> Self {
        ParserState {
            line_number: 0,
            signals: SignalTable::default(),
            write_devices: None,
            instructions: InstructionTable::default(),
            current: None,
        }
    }

    /// Helper method to create a ParseError with the current line number
    fn parse_error(&self, message: &str) -> ParseError {
        ParseError::new(self.line_number, message)
    }

    fn table_error(&self, error: TableError) -> ParseError {
        self.parse_error(&error.to_string())
    }
}

impl ParserState {
    pub(crate) fn parse<R: BufRead>(&mut self, reader: R) -> Result<(), ParseError> {
        let mut lines = reader.lines();
        while let Some(line) = lines.next() {
            self.line_number += 1;
            let line =
                line.map_err(|e| self.parse_error(&format!("Failed to read line: {}", e)))?;
            let line = line.split('#').next().unwrap_or_default().trim();
            if line.is_empty() {
                continue; // Skip comments and empty lines
            }
            let mut chars = line.chars();
            let first_char = chars.next().unwrap_or_default();
            let rest = chars.as_str();
            match first_char {
                '@' => self.parse_signal_line(rest)?,
                '~' => self.parse_field_line(rest)?,
                '%' => self.parse_device_line(rest)?,
                '>' => self.parse_opcode_line(rest)?,
                '=' => self.parse_step_line(rest)?,
                _ => {
                    return Err(self.parse_error(&format!("Invalid line start '{}'", first_char)));
                }
            }
        }
        Ok(())
    }

    /// Checks the tables against each other and bundles them into a profile.
    pub(crate) fn finish(self, name: &str) -> Result<IsaProfile, TableError> {
        let write_devices = self.write_devices.ok_or(TableError::MissingField)?;
        IsaProfile::new(name, self.signals, write_devices, self.instructions)
    }
}

impl ParserState {
    fn parse_signal_line(&mut self, line: &str) -> Result<(), ParseError> {
        for term in line.split_whitespace() {
            let (name, bit_str) = term.split_once(':').ok_or_else(|| {
                self.parse_error(&format!(
                    "Invalid signal '{}', expected format 'name:bit'",
                    term
                ))
            })?;
            self.check_name(name, "Signal")?;
            let bit = self.parse_number(bit_str)?;
            let inserted = match u8::try_from(bit) {
                Ok(bit) => self.signals.insert(Signal::new(name, bit)),
                Err(_) => Err(TableError::BitOutOfRange {
                    name: name.to_string(),
                    bit,
                }),
            };
            inserted.map_err(|e| self.table_error(e))?;
        }
        Ok(())
    }

    fn check_name(&self, name: &str, kind: &str) -> Result<(), ParseError> {
        if name.is_empty() {
            return Err(self.parse_error(&format!("{} name cannot be empty", kind)));
        }
        if name.chars().all(char::is_numeric) {
            return Err(self.parse_error(&format!(
                "{} name '{}' cannot be all numerals",
                kind, name
            )));
        }
        Ok(())
    }
}

impl ParserState {
    fn parse_field_line(&mut self, line: &str) -> Result<(), ParseError> {
        if self.write_devices.is_some() {
            return Err(self.parse_error("Write-device field defined more than once"));
        }
        let line = line.trim();
        let (offset_str, width_str) = line.split_once('/').ok_or_else(|| {
            self.parse_error(&format!(
                "Invalid write-device field '{}', expected format 'offset/width'",
                line
            ))
        })?;
        let offset = self.parse_number(offset_str)?;
        let width = self.parse_number(width_str)?;
        let table = match (u8::try_from(offset), u8::try_from(width)) {
            (Ok(offset), Ok(width)) => WriteDeviceTable::new(offset, width, Vec::new()),
            _ => Err(TableError::FieldOutOfRange { offset, width }),
        };
        self.write_devices = Some(table.map_err(|e| self.table_error(e))?);
        Ok(())
    }
}

impl ParserState {
    fn parse_device_line(&mut self, line: &str) -> Result<(), ParseError> {
        if self.write_devices.is_none() {
            return Err(self.parse_error("Write device declared before the write-device field '~'"));
        }
        let tokens: Vec<&str> = line.split_whitespace().collect();
        let [code_str, name, mnemonic] = tokens[..] else {
            return Err(self.parse_error(&format!(
                "Invalid write device '{}', expected format 'code device mnemonic'",
                line.trim()
            )));
        };
        let code = self.parse_number(code_str)?;
        self.check_name(name, "Write device")?;
        self.check_name(mnemonic, "Write device mnemonic")?;

        let device = WriteDevice::new(name, code, mnemonic);
        let inserted = match self.write_devices.as_mut() {
            Some(table) => table.insert(device),
            None => Err(TableError::MissingField),
        };
        inserted.map_err(|e| self.table_error(e))
    }
}

impl ParserState {
    fn parse_opcode_line(&mut self, line: &str) -> Result<(), ParseError> {
        let mut tokens = line.split_whitespace();
        let opcode_str = tokens
            .next()
            .ok_or_else(|| self.parse_error("Missing opcode after '>'"))?;
        let value = self.parse_number(opcode_str)?;
        let opcode = u8::try_from(value)
            .ok()
            .and_then(Opcode::new)
            .ok_or_else(|| self.table_error(TableError::OpcodeOutOfRange(value)))?;
        let mnemonic = tokens.next().map(str::to_string);
        if let Some(extra) = tokens.next() {
            return Err(self.parse_error(&format!(
                "Unexpected '{}' after opcode mnemonic",
                extra
            )));
        }

        let instruction = Instruction {
            mnemonic,
            steps: Vec::new(),
        };
        self.instructions
            .insert(opcode, instruction)
            .map_err(|e| self.table_error(e))?;
        self.current = Some(opcode);
        Ok(())
    }
}

impl ParserState {
    fn parse_step_line(&mut self, line: &str) -> Result<(), ParseError> {
        let Some(opcode) = self.current else {
            return Err(self.parse_error("Micro-step before any opcode '>'"));
        };
        // Names are resolved when encoding so both profile sources fail alike.
        self.instructions
            .push_step(opcode, MicroStep::new(line.split_whitespace()))
            .map_err(|e| self.table_error(e))
    }
}

impl ParserState {
    fn parse_number(&self, text: &str) -> Result<u32, ParseError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(self.parse_error("Missing number"));
        }

        let (radix, digits) = match text.chars().next() {
            Some('h') => (16, &text[1..]),
            Some('d') => (10, &text[1..]),
            Some('b') => (2, &text[1..]),
            _ => (10, text),
        };

        u32::from_str_radix(digits, radix)
            .map_err(|_| self.parse_error(&format!("Invalid number format '{}'", text)))
    }
}
