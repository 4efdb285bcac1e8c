//! ISA profiles compiled into the binary.

use crate::{
    ds::{Instruction, MicroStep, Opcode},
    error::TableError,
    tables::{InstructionTable, IsaProfile, Signal, SignalTable, WriteDevice, WriteDeviceTable},
};

pub(crate) const DEFAULT_PROFILE: &str = "8t8";

/// Names accepted by [`profile`]
pub(crate) const PROFILE_NAMES: &[&str] = &[DEFAULT_PROFILE];

/// Looks up a built-in profile by name.
pub(crate) fn profile(name: &str) -> Option<Result<IsaProfile, TableError>> {
    match name {
        DEFAULT_PROFILE => Some(eight_t_eight()),
        _ => None,
    }
}

const SIGNALS_8T8: &[(&str, u8, &str)] = &[
    ("UCC_COND_CLR", 0, "Reset the microcode counter if the jump condition is not met"),
    ("UCC_CLR", 1, "Reset the microcode counter"),
    ("PC_INC", 2, "Increment PC"),
    ("PC_WR_ADDR", 3, "Write PC to the address bus"),
    ("PC_RD_ADDR", 4, "Load the address bus into PC"),
    ("IR0_RD_DB", 5, "Instruction register 0 reads the data bus"),
    ("IR1_RD_DB", 6, "Instruction register 1 reads the data bus"),
    ("IR2_RD_DB", 7, "Instruction register 2 reads the data bus"),
    ("PCL_RD_DB", 8, "PC low byte reads the data bus"),
    ("PCH_RD_DB", 9, "PC high byte reads the data bus"),
    ("RD_RD_DB", 10, "Destination register reads the data bus"),
    ("RD_DB", 11, "Read the data bus"),
    ("WR_DB", 12, "Write the data bus"),
    ("SPL_RD_DB", 13, "Stack pointer low byte reads the data bus"),
    ("SPH_RD_DB", 14, "Stack pointer high byte reads the data bus"),
    ("SP_WR_ADDR", 15, "Write SP to the address bus"),
    ("SP_INC", 16, "Increment SP"),
    ("SP_DEC", 17, "Decrement SP"),
    ("RS_BUFFER", 18, "Buffer the source registers, before RD_RD_DB"),
    ("RS_WR_ADDR", 19, "Write the source registers to the address bus"),
    ("RS+1_WR_ADDR", 20, "Write the source registers plus one to the address bus"),
    ("ALU_WR_FLAG", 29, "ALU writes the flag register"),
    ("MEM_WE", 30, "External memory write enable"),
    ("MEM_OE", 31, "External memory output enable"),
];

const WRITE_FIELD_OFFSET_8T8: u8 = 21;
const WRITE_FIELD_WIDTH_8T8: u8 = 4;

const WRITE_DEVICES_8T8: &[(&str, u32, &str)] = &[
    ("pcl", 0b0001, "PCL_WR_DB"),
    ("pch", 0b0010, "PCH_WR_DB"),
    ("spl", 0b0011, "SPL_WR_DB"),
    ("sph", 0b0100, "SPH_WR_DB"),
    ("rd", 0b0101, "RD_WR_DB"),
    ("rs0", 0b0110, "RS0_WR_DB"),
    ("rs1", 0b0111, "RS1_WR_DB"),
    ("imm", 0b1000, "IMM_WR_DB"),
    ("alu", 0b1001, "ALU_OUT_WR_DB"),
];

// Every instruction starts by loading its three bytes into IR0..IR2.
const FETCH: [&[&str]; 3] = [
    &["PC_INC", "PC_WR_ADDR", "IR0_RD_DB", "RD_DB", "MEM_OE"],
    &["PC_INC", "PC_WR_ADDR", "IR1_RD_DB", "RD_DB", "MEM_OE"],
    &["PC_INC", "PC_WR_ADDR", "IR2_RD_DB", "RD_DB", "MEM_OE"],
];

// Fetch variant for stack pushes: SP moves during the last fetch cycle.
const FETCH_SP_INC: [&[&str]; 3] = [
    &["PC_INC", "PC_WR_ADDR", "IR0_RD_DB", "RD_DB", "MEM_OE"],
    &["PC_INC", "PC_WR_ADDR", "IR1_RD_DB", "RD_DB", "MEM_OE"],
    &["SP_INC", "PC_INC", "PC_WR_ADDR", "IR2_RD_DB", "RD_DB", "MEM_OE"],
];

type Program = (u8, &'static str, &'static [&'static [&'static str]], &'static [&'static [&'static str]]);

const INSTRUCTIONS_8T8: &[Program] = &[
    (0x0, "NOP", &FETCH, &[]),
    (0x1, "MOV", &FETCH, &[&["RS0_WR_DB", "RD_RD_DB", "UCC_CLR"]]),
    (0x2, "LDI", &FETCH, &[&["IMM_WR_DB", "RD_RD_DB", "UCC_CLR"]]),
    (
        0x3,
        "LOAD",
        &FETCH,
        &[
            &["RS_BUFFER", "RS_WR_ADDR"],
            &["RS_WR_ADDR", "RD_RD_DB", "RD_DB", "MEM_OE", "UCC_CLR"],
        ],
    ),
    (
        0x4,
        "STORE",
        &FETCH,
        &[
            &["RS_BUFFER", "RS_WR_ADDR"],
            &["RS_WR_ADDR", "RD_WR_DB", "WR_DB", "MEM_WE", "UCC_CLR"],
        ],
    ),
    (0x5, "ALU", &FETCH, &[&["ALU_OUT_WR_DB", "ALU_WR_FLAG", "RD_RD_DB", "UCC_CLR"]]),
    (
        0x6,
        "JUMP",
        &FETCH,
        &[
            &["UCC_COND_CLR", "RS_BUFFER", "RS_WR_ADDR"],
            &["RS_WR_ADDR", "PC_RD_ADDR", "UCC_CLR"],
        ],
    ),
    (
        0x7,
        "PUSH",
        &FETCH_SP_INC,
        &[&["SP_WR_ADDR", "RD_WR_DB", "WR_DB", "MEM_WE", "UCC_CLR"]],
    ),
    (
        0x8,
        "POP",
        &FETCH,
        &[&["SP_WR_ADDR", "SP_DEC", "RD_RD_DB", "RD_DB", "MEM_OE", "UCC_CLR"]],
    ),
    (
        0x9,
        "LDSP",
        &FETCH,
        &[&["RS0_WR_DB", "SPL_RD_DB"], &["RS1_WR_DB", "SPH_RD_DB", "UCC_CLR"]],
    ),
    (
        0xC,
        "PUSHPC",
        &FETCH_SP_INC,
        &[
            &["SP_INC", "SP_WR_ADDR", "PCL_WR_DB", "WR_DB", "MEM_WE"],
            &["SP_WR_ADDR", "PCH_WR_DB", "WR_DB", "MEM_WE", "UCC_CLR"],
        ],
    ),
    (
        0xD,
        "POPPC",
        &FETCH,
        &[
            &["SP_DEC", "SP_WR_ADDR", "PCH_RD_DB", "RD_DB", "MEM_OE"],
            &["SP_DEC", "SP_WR_ADDR", "PCL_RD_DB", "RD_DB", "MEM_OE", "UCC_CLR"],
        ],
    ),
    (
        0xE,
        "CALL",
        &FETCH,
        &[
            // Step PC past the operand and make room on the stack
            &["PC_INC", "SP_INC"],
            // Push the return address
            &["SP_INC", "SP_WR_ADDR", "PCL_WR_DB", "WR_DB", "MEM_WE"],
            &["SP_WR_ADDR", "PCH_WR_DB", "WR_DB", "MEM_WE"],
            // Jump
            &["RS0_WR_DB", "PCL_RD_DB"],
            &["RS1_WR_DB", "PCH_RD_DB", "UCC_CLR"],
        ],
    ),
];

/// The 8T8 CPU: 24 single-bit lines plus a 4-bit write-device selector at bit 21.
pub(crate) fn eight_t_eight() -> Result<IsaProfile, TableError> {
    let signals = SignalTable::new(
        SIGNALS_8T8
            .iter()
            .map(|&(name, bit, description)| Signal::described(name, bit, description))
            .collect(),
    )?;

    let write_devices = WriteDeviceTable::new(
        WRITE_FIELD_OFFSET_8T8,
        WRITE_FIELD_WIDTH_8T8,
        WRITE_DEVICES_8T8
            .iter()
            .map(|&(name, code, mnemonic)| WriteDevice::new(name, code, mnemonic))
            .collect(),
    )?;

    let mut entries = Vec::with_capacity(INSTRUCTIONS_8T8.len());
    for &(value, mnemonic, prologue, body) in INSTRUCTIONS_8T8 {
        let opcode = Opcode::new(value).ok_or(TableError::OpcodeOutOfRange(value.into()))?;
        let steps = prologue
            .iter()
            .chain(body)
            .map(|signals| MicroStep::new(signals.iter().copied()))
            .collect();
        entries.push((opcode, Instruction::new(mnemonic, steps)));
    }
    let instructions = InstructionTable::new(entries)?;

    IsaProfile::new(DEFAULT_PROFILE, signals, write_devices, instructions)
}
