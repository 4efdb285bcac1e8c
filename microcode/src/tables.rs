use std::collections::{BTreeMap, HashMap, HashSet};

use crate::{
    ds::{Instruction, MicroStep, Opcode, STEPS_PER_OPCODE, WORD_BITS},
    error::TableError,
};

/// A single-bit control line
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Signal {
    pub(crate) name: String,
    pub(crate) bit: u8,
    pub(crate) description: Option<String>,
}

impl Signal {
    pub(crate) fn new(name: &str, bit: u8) -> Self {
        Signal {
            name: name.to_string(),
            bit,
            description: None,
        }
    }

    pub(crate) fn described(name: &str, bit: u8, description: &str) -> Self {
        Signal {
            description: Some(description.to_string()),
            ..Signal::new(name, bit)
        }
    }
}

/// Maps control-line names to their bit in the control word
#[derive(Debug, Clone, Default)]
pub(crate) struct SignalTable {
    signals: Vec<Signal>,
    by_name: HashMap<String, u8>,
}

impl SignalTable {
    pub(crate) fn new(signals: Vec<Signal>) -> Result<Self, TableError> {
        let mut table = SignalTable::default();
        for signal in signals {
            table.insert(signal)?;
        }
        Ok(table)
    }

    /// Adds one signal, keeping names and bits unique.
    pub(crate) fn insert(&mut self, signal: Signal) -> Result<(), TableError> {
        if signal.bit >= WORD_BITS {
            return Err(TableError::BitOutOfRange {
                name: signal.name,
                bit: u32::from(signal.bit),
            });
        }
        if let Some(first) = self.signals.iter().find(|s| s.bit == signal.bit) {
            return Err(TableError::SharedBit {
                first: first.name.clone(),
                second: signal.name,
                bit: signal.bit,
            });
        }
        if self.by_name.contains_key(&signal.name) {
            return Err(TableError::DuplicateSignal(signal.name));
        }
        self.by_name.insert(signal.name.clone(), signal.bit);
        self.signals.push(signal);
        Ok(())
    }

    pub(crate) fn bit(&self, name: &str) -> Option<u8> {
        self.by_name.get(name).copied()
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &Signal> {
        self.signals.iter()
    }

    pub(crate) fn len(&self) -> usize {
        self.signals.len()
    }
}

/// A functional unit that can drive the shared data bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WriteDevice {
    pub(crate) name: String,
    pub(crate) code: u32,
    /// The micro-step signal that selects this device
    pub(crate) mnemonic: String,
}

impl WriteDevice {
    pub(crate) fn new(name: &str, code: u32, mnemonic: &str) -> Self {
        WriteDevice {
            name: name.to_string(),
            code,
            mnemonic: mnemonic.to_string(),
        }
    }
}

/// The multi-bit selector field choosing which device drives the data bus.
///
/// Code 0 is the idle device (`none`): a step naming no write device leaves
/// the field at zero. Device names and mnemonics share one namespace.
#[derive(Debug, Clone)]
pub(crate) struct WriteDeviceTable {
    offset: u8,
    width: u8,
    devices: Vec<WriteDevice>,
    names: HashSet<String>,
    by_mnemonic: HashMap<String, usize>,
}

impl WriteDeviceTable {
    pub(crate) const IDLE_CODE: u32 = 0;
    pub(crate) const IDLE_NAME: &'static str = "none";

    pub(crate) fn new(offset: u8, width: u8, devices: Vec<WriteDevice>) -> Result<Self, TableError> {
        if width == 0 || u32::from(offset) + u32::from(width) > u32::from(WORD_BITS) {
            return Err(TableError::FieldOutOfRange {
                offset: offset.into(),
                width: width.into(),
            });
        }

        let mut table = WriteDeviceTable {
            offset,
            width,
            devices: Vec::new(),
            names: HashSet::new(),
            by_mnemonic: HashMap::new(),
        };
        for device in devices {
            table.insert(device)?;
        }
        Ok(table)
    }

    /// Adds one device with a unique, non-zero selector that fits the field.
    pub(crate) fn insert(&mut self, device: WriteDevice) -> Result<(), TableError> {
        if device.code == Self::IDLE_CODE {
            return Err(TableError::ReservedSelector(device.name));
        }
        if u64::from(device.code) >= 1u64 << self.width {
            return Err(TableError::SelectorOutOfRange {
                name: device.name,
                code: device.code,
                width: self.width,
            });
        }
        for key in [&device.name, &device.mnemonic] {
            if key == Self::IDLE_NAME || self.names.contains(key) {
                return Err(TableError::DuplicateDevice(key.clone()));
            }
        }
        if device.name == device.mnemonic {
            return Err(TableError::DuplicateDevice(device.mnemonic));
        }
        if self.devices.iter().any(|d| d.code == device.code) {
            return Err(TableError::DuplicateSelector {
                name: device.name,
                code: device.code,
            });
        }

        self.names.insert(device.name.clone());
        self.names.insert(device.mnemonic.clone());
        self.by_mnemonic.insert(device.mnemonic.clone(), self.devices.len());
        self.devices.push(device);
        Ok(())
    }

    pub(crate) fn device(&self, mnemonic: &str) -> Option<&WriteDevice> {
        self.by_mnemonic.get(mnemonic).map(|&i| &self.devices[i])
    }

    /// Bits of the control word occupied by the selector
    pub(crate) fn field_mask(&self) -> u32 {
        (((1u64 << self.width) - 1) << self.offset) as u32
    }

    /// Shifts a selector code into the field position
    pub(crate) fn place(&self, code: u32) -> u32 {
        (code << self.offset) & self.field_mask()
    }

    pub(crate) fn offset(&self) -> u8 {
        self.offset
    }

    pub(crate) fn width(&self) -> u8 {
        self.width
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = &WriteDevice> {
        self.devices.iter()
    }
}

/// Micro-step sequences keyed by opcode. Absent opcodes have no steps.
#[derive(Debug, Clone, Default)]
pub(crate) struct InstructionTable {
    instructions: BTreeMap<Opcode, Instruction>,
}

impl InstructionTable {
    pub(crate) fn new(
        entries: impl IntoIterator<Item = (Opcode, Instruction)>,
    ) -> Result<Self, TableError> {
        let mut table = InstructionTable::default();
        for (opcode, instruction) in entries {
            table.insert(opcode, instruction)?;
        }
        Ok(table)
    }

    pub(crate) fn insert(&mut self, opcode: Opcode, instruction: Instruction) -> Result<(), TableError> {
        if instruction.steps.len() > STEPS_PER_OPCODE {
            return Err(TableError::TooManySteps {
                opcode,
                count: instruction.steps.len(),
            });
        }
        if self.instructions.contains_key(&opcode) {
            return Err(TableError::DuplicateOpcode(opcode));
        }
        self.instructions.insert(opcode, instruction);
        Ok(())
    }

    /// Appends a micro-step to `opcode`, creating an unnamed instruction if needed.
    pub(crate) fn push_step(&mut self, opcode: Opcode, step: MicroStep) -> Result<(), TableError> {
        let instruction = self.instructions.entry(opcode).or_default();
        if instruction.steps.len() == STEPS_PER_OPCODE {
            return Err(TableError::TooManySteps {
                opcode,
                count: STEPS_PER_OPCODE + 1,
            });
        }
        instruction.steps.push(step);
        Ok(())
    }

    pub(crate) fn get(&self, opcode: Opcode) -> Option<&Instruction> {
        self.instructions.get(&opcode)
    }

    pub(crate) fn len(&self) -> usize {
        self.instructions.len()
    }
}

/// Everything needed to compile one control store
#[derive(Debug, Clone)]
pub(crate) struct IsaProfile {
    pub(crate) name: String,
    pub(crate) signals: SignalTable,
    pub(crate) write_devices: WriteDeviceTable,
    pub(crate) instructions: InstructionTable,
}

impl IsaProfile {
    pub(crate) fn new(
        name: &str,
        signals: SignalTable,
        write_devices: WriteDeviceTable,
        instructions: InstructionTable,
    ) -> Result<Self, TableError> {
        let field = write_devices.field_mask();
        for signal in signals.iter() {
            if field & (1 << signal.bit) != 0 {
                return Err(TableError::OverlapsField {
                    name: signal.name.clone(),
                    bit: signal.bit,
                });
            }
            if write_devices.device(&signal.name).is_some() {
                return Err(TableError::AmbiguousSignal(signal.name.clone()));
            }
        }
        Ok(IsaProfile {
            name: name.to_string(),
            signals,
            write_devices,
            instructions,
        })
    }
}
