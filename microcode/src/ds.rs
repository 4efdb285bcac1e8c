use std::fmt;

/// Number of opcodes addressable by the 4-bit opcode field
pub(crate) const OPCODE_COUNT: u8 = 16;

/// Number of micro-steps per opcode (4-bit step counter)
pub(crate) const STEPS_PER_OPCODE: usize = 16;

/// Size of the control store address space
pub(crate) const ADDRESS_SPACE: usize = OPCODE_COUNT as usize * STEPS_PER_OPCODE;

/// Width of a control word in bits
pub(crate) const WORD_BITS: u8 = 32;

/// Number of byte-wide ROM chips holding one control word
pub(crate) const PLANE_COUNT: usize = (WORD_BITS / 8) as usize;

/// A 4-bit operation code
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Opcode(u8);

impl Opcode {
    pub(crate) const fn new(value: u8) -> Option<Self> {
        if value < OPCODE_COUNT {
            Some(Opcode(value))
        } else {
            None
        }
    }

    pub(crate) const fn value(self) -> u8 {
        self.0
    }

    /// Every opcode, in ascending order
    pub(crate) fn all() -> impl Iterator<Item = Opcode> {
        (0..OPCODE_COUNT).map(Opcode)
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:X}", self.0)
    }
}

/// Control store address: the opcode in the high nibble, the step counter in the low nibble
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub(crate) struct Address(u8);

impl Address {
    /// Returns `None` when `step` does not fit the 4-bit step counter.
    pub(crate) fn new(opcode: Opcode, step: usize) -> Option<Self> {
        if step < STEPS_PER_OPCODE {
            Some(Address((opcode.value() << 4) | step as u8))
        } else {
            None
        }
    }

    /// The addresses of all steps of `opcode`, in step order
    pub(crate) fn steps(opcode: Opcode) -> impl Iterator<Item = Address> {
        (0..STEPS_PER_OPCODE).filter_map(move |step| Address::new(opcode, step))
    }

    /// Every address of the control store, in ascending order
    pub(crate) fn all() -> impl Iterator<Item = Address> {
        Opcode::all().flat_map(Address::steps)
    }

    pub(crate) const fn opcode(self) -> Opcode {
        Opcode(self.0 >> 4)
    }

    pub(crate) const fn step(self) -> usize {
        (self.0 & 0x0F) as usize
    }

    pub(crate) const fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02X}", self.0)
    }
}

/// The control lines asserted during one clock cycle
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub(crate) struct ControlWord(pub(crate) u32);

impl ControlWord {
    /// All lines deasserted
    pub(crate) const IDLE: ControlWord = ControlWord(0);

    /// Byte `plane` of the word, plane 0 being the least significant
    pub(crate) const fn byte(self, plane: usize) -> u8 {
        (self.0 >> (8 * plane)) as u8
    }
}

impl fmt::Display for ControlWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0b{:032b}", self.0)
    }
}

/// Signal names asserted together for one clock cycle
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct MicroStep {
    pub(crate) signals: Vec<String>,
}

impl MicroStep {
    pub(crate) fn new<I, S>(signals: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        MicroStep {
            signals: signals.into_iter().map(Into::into).collect(),
        }
    }
}

/// Ordered micro-steps executed for one opcode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct Instruction {
    pub(crate) mnemonic: Option<String>,
    pub(crate) steps: Vec<MicroStep>,
}

impl Instruction {
    pub(crate) fn new(mnemonic: &str, steps: Vec<MicroStep>) -> Self {
        Instruction {
            mnemonic: Some(mnemonic.to_string()),
            steps,
        }
    }
}

/// The complete control store: one word for each of the 256 addresses
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct WordMap {
    words: [ControlWord; ADDRESS_SPACE],
}

impl WordMap {
    pub(crate) const fn new(words: [ControlWord; ADDRESS_SPACE]) -> Self {
        WordMap { words }
    }

    pub(crate) const fn get(&self, address: Address) -> ControlWord {
        self.words[address.index()]
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (Address, ControlWord)> + '_ {
        Address::all().zip(self.words.iter().copied())
    }
}

/// One byte-wide ROM chip: byte `index` of every control word
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct RomPlane {
    pub(crate) index: usize,
    pub(crate) bytes: [u8; ADDRESS_SPACE],
}
