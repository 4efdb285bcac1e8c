use crate::{
    ds::{Address, ControlWord, MicroStep, Opcode, WordMap, ADDRESS_SPACE},
    error::EncodeError,
    tables::{InstructionTable, SignalTable, WriteDevice, WriteDeviceTable},
};

/// Compiles the instruction table into a word for every control store address.
///
/// Steps past the end of an instruction, and every step of an opcode the table
/// leaves out, are idle (all lines deasserted). The first bad micro-step aborts
/// the whole encoding.
pub(crate) fn encode(
    instructions: &InstructionTable,
    signals: &SignalTable,
    write_devices: &WriteDeviceTable,
) -> Result<WordMap, EncodeError> {
    let mut words = [ControlWord::IDLE; ADDRESS_SPACE];
    for address in Address::all() {
        words[address.index()] = encode_address(address, instructions, signals, write_devices)?;
    }
    Ok(WordMap::new(words))
}

fn encode_address(
    address: Address,
    instructions: &InstructionTable,
    signals: &SignalTable,
    write_devices: &WriteDeviceTable,
) -> Result<ControlWord, EncodeError> {
    let opcode = address.opcode();
    let step = address.step();
    let Some(micro_step) = instructions
        .get(opcode)
        .and_then(|instruction| instruction.steps.get(step))
    else {
        return Ok(ControlWord::IDLE);
    };

    tracing::debug!(
        "Generating microcode for opcode {} at step {}: {:?}",
        opcode,
        step,
        micro_step.signals
    );
    let word = encode_step(micro_step, opcode, step, signals, write_devices)?;
    tracing::trace!(" -> Address: {}, Microcode: {}", address, word);
    Ok(word)
}

/// Builds the control word for one micro-step.
///
/// Single-bit signals are OR-ed together. A write-device mnemonic is not a bit
/// of its own: its selector code is assigned to the write-device field, and a
/// step naming two different devices is rejected.
pub(crate) fn encode_step(
    micro_step: &MicroStep,
    opcode: Opcode,
    step: usize,
    signals: &SignalTable,
    write_devices: &WriteDeviceTable,
) -> Result<ControlWord, EncodeError> {
    let mut bits = 0u32;
    let mut selected: Option<&WriteDevice> = None;

    for signal in &micro_step.signals {
        if let Some(bit) = signals.bit(signal) {
            bits |= 1 << bit;
        } else if let Some(device) = write_devices.device(signal) {
            match selected {
                Some(first) if first.code != device.code => {
                    return Err(EncodeError::ConflictingWriteDevices {
                        first: first.mnemonic.clone(),
                        second: device.mnemonic.clone(),
                        opcode,
                        step,
                    });
                }
                _ => selected = Some(device),
            }
        } else {
            return Err(EncodeError::UnknownSignal {
                signal: signal.clone(),
                opcode,
                step,
            });
        }
    }

    let code = selected.map_or(WriteDeviceTable::IDLE_CODE, |device| device.code);
    let word = (bits & !write_devices.field_mask()) | write_devices.place(code);
    Ok(ControlWord(word))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        builtin::eight_t_eight,
        ds::Instruction,
        tables::{IsaProfile, Signal},
    };
    use pretty_assertions::assert_eq;

    fn encode_profile(profile: &IsaProfile) -> Result<WordMap, EncodeError> {
        encode(
            &profile.instructions,
            &profile.signals,
            &profile.write_devices,
        )
    }

    fn word_at(words: &WordMap, opcode: u8, step: usize) -> u32 {
        let address = Address::new(Opcode::new(opcode).unwrap(), step).unwrap();
        words.get(address).0
    }

    /// Builtin signals and devices with a custom instruction table
    fn with_instructions(entries: Vec<(u8, Vec<MicroStep>)>) -> IsaProfile {
        let base = eight_t_eight().unwrap();
        let instructions = InstructionTable::new(
            entries
                .into_iter()
                .map(|(op, steps)| (Opcode::new(op).unwrap(), Instruction::new("TEST", steps))),
        )
        .unwrap();
        IsaProfile::new("test", base.signals, base.write_devices, instructions).unwrap()
    }

    #[test]
    fn test_every_address_is_encoded() {
        let words = encode_profile(&eight_t_eight().unwrap()).unwrap();
        assert_eq!(words.iter().count(), 256);
        for (i, (address, _)) in words.iter().enumerate() {
            assert_eq!(address.index(), i);
        }
    }

    #[test]
    fn test_single_signal_sets_one_bit() {
        let profile = with_instructions(vec![(0x0, vec![MicroStep::new(["PC_INC"])])]);
        let words = encode_profile(&profile).unwrap();
        let word = word_at(&words, 0x0, 0);
        assert_eq!(word.count_ones(), 1);
        assert_eq!(word, 1 << 2);
    }

    #[test]
    fn test_mov_final_step() {
        let words = encode_profile(&eight_t_eight().unwrap()).unwrap();
        // RD_RD_DB (bit 10) | UCC_CLR (bit 1) | rs0 selector 0b0110 at bit 21
        let expected = (1 << 10) | (1 << 1) | (0b0110 << 21);
        assert_eq!(word_at(&words, 0x1, 3), expected);
        let address = Address::new(Opcode::new(0x1).unwrap(), 3).unwrap();
        assert_eq!(address.index(), 0x1 * 16 + 3);
    }

    #[test]
    fn test_fetch_step() {
        let words = encode_profile(&eight_t_eight().unwrap()).unwrap();
        // PC_INC, PC_WR_ADDR, IR0_RD_DB, RD_DB, MEM_OE
        let expected = (1 << 2) | (1 << 3) | (1 << 5) | (1 << 11) | (1 << 31);
        assert_eq!(word_at(&words, 0x0, 0), expected);
    }

    #[test]
    fn test_steps_past_the_end_are_idle() {
        let profile = eight_t_eight().unwrap();
        let words = encode_profile(&profile).unwrap();
        for op in 0..16u8 {
            let defined = profile
                .instructions
                .get(Opcode::new(op).unwrap())
                .map_or(0, |i| i.steps.len());
            for step in 0..16 {
                let word = word_at(&words, op, step);
                if step >= defined {
                    assert_eq!(word, 0, "opcode {op:X} step {step}");
                } else {
                    assert_ne!(word, 0, "opcode {op:X} step {step}");
                }
            }
        }
    }

    #[test]
    fn test_empty_step_is_idle() {
        let profile = with_instructions(vec![(0x3, vec![MicroStep::default()])]);
        let words = encode_profile(&profile).unwrap();
        assert_eq!(words.iter().filter(|(_, w)| w.0 != 0).count(), 0);
    }

    #[test]
    fn test_write_device_without_other_signals() {
        let profile = with_instructions(vec![(0x2, vec![MicroStep::new(["ALU_OUT_WR_DB"])])]);
        let words = encode_profile(&profile).unwrap();
        assert_eq!(word_at(&words, 0x2, 0), 0b1001 << 21);
    }

    #[test]
    fn test_repeated_signals_are_idempotent() {
        let profile = with_instructions(vec![(
            0x2,
            vec![MicroStep::new(["MEM_OE", "RD_WR_DB", "MEM_OE", "RD_WR_DB"])],
        )]);
        let words = encode_profile(&profile).unwrap();
        assert_eq!(word_at(&words, 0x2, 0), (1 << 31) | (0b0101 << 21));
    }

    #[test]
    fn test_error_unknown_signal() {
        let profile = with_instructions(vec![(
            0x4,
            vec![MicroStep::new(["PC_INC"]), MicroStep::new(["PC_INC", "BOGUS"])],
        )]);
        let err = encode_profile(&profile).unwrap_err();
        assert_eq!(
            err,
            EncodeError::UnknownSignal {
                signal: "BOGUS".to_string(),
                opcode: Opcode::new(4).unwrap(),
                step: 1,
            }
        );
        assert_eq!(
            err.to_string(),
            "Unknown signal 'BOGUS' in opcode 0x4 step 1"
        );
    }

    #[test]
    fn test_error_unknown_write_device_mnemonic() {
        let profile = with_instructions(vec![(0x1, vec![MicroStep::new(["SPX_WR_DB"])])]);
        let err = encode_profile(&profile).unwrap_err();
        assert!(matches!(err, EncodeError::UnknownSignal { ref signal, .. } if signal == "SPX_WR_DB"));
    }

    #[test]
    fn test_error_conflicting_write_devices() {
        let profile = with_instructions(vec![(
            0x6,
            vec![MicroStep::new(["RS0_WR_DB", "RD_RD_DB", "IMM_WR_DB"])],
        )]);
        let err = encode_profile(&profile).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Write devices 'RS0_WR_DB' and 'IMM_WR_DB' both drive the data bus in opcode 0x6 step 0"
        );
    }

    #[test]
    fn test_selector_lands_in_field() {
        let signals = SignalTable::new(vec![Signal::new("A", 0)]).unwrap();
        let devices = WriteDeviceTable::new(
            4,
            2,
            vec![
                crate::tables::WriteDevice::new("x", 0b01, "X_WR_DB"),
                crate::tables::WriteDevice::new("y", 0b10, "Y_WR_DB"),
            ],
        )
        .unwrap();
        let step = MicroStep::new(["A", "Y_WR_DB"]);
        let word = encode_step(&step, Opcode::new(0).unwrap(), 0, &signals, &devices).unwrap();
        assert_eq!(word, ControlWord(0b10_0001));
    }

    #[test]
    fn test_encoding_is_deterministic() {
        let first = encode_profile(&eight_t_eight().unwrap()).unwrap();
        let second = encode_profile(&eight_t_eight().unwrap()).unwrap();
        assert_eq!(first, second);
    }
}
