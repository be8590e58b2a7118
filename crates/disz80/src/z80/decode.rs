//! Byte decoder: memory + address → decoded instruction.
//!
//! Decoding is total: every byte sequence yields an instruction record
//! (undefined encodings come back as `INVALID`), so the analysis never
//! has to handle a decode failure, only attribute conflicts.

use crate::labels::LabelKind;
use crate::memory::Memory;

use super::instruction::{Immediate, Instruction, OpcodeFlags};
use super::opcodes::{cb_template, index_cb_template, substitute_index, ED, MAIN};

/// Decode the instruction starting at `addr`.
pub fn decode_instruction(mem: &Memory, addr: u16) -> Instruction {
    let b0 = mem.read_byte(addr);
    match b0 {
        0xCB => {
            let op = mem.read_byte(addr.wrapping_add(1));
            Instruction {
                address: addr,
                length: 2,
                template: cb_template(op),
                flags: OpcodeFlags::empty(),
                value: 0,
                value_kind: LabelKind::None,
                immediates: Vec::new(),
            }
        }
        0xED => {
            let op = mem.read_byte(addr.wrapping_add(1));
            let entry = &ED[op as usize];
            build(mem, addr, 2, entry.template.to_string(), entry.flags, entry.value_kind, b0)
        }
        0xDD => decode_indexed(mem, addr, "IX"),
        0xFD => decode_indexed(mem, addr, "IY"),
        _ => {
            let entry = &MAIN[b0 as usize];
            build(mem, addr, 1, entry.template.to_string(), entry.flags, entry.value_kind, b0)
        }
    }
}

fn decode_indexed(mem: &Memory, addr: u16, index: &str) -> Instruction {
    let b1 = mem.read_byte(addr.wrapping_add(1));
    match b1 {
        0xCB => {
            // DD CB d op — displacement precedes the final opcode byte.
            let d = mem.read_byte(addr.wrapping_add(2)) as i8;
            let op = mem.read_byte(addr.wrapping_add(3));
            Instruction {
                address: addr,
                length: 4,
                template: index_cb_template(op, index),
                flags: OpcodeFlags::empty(),
                value: d as u8 as u16,
                value_kind: LabelKind::RelativeIndex,
                immediates: vec![Immediate::Index(d)],
            }
        }
        // A second prefix byte: the leading prefix is dead weight.
        // Re-synchronise on the next byte.
        0xDD | 0xED | 0xFD => Instruction {
            address: addr,
            length: 1,
            template: "INVALID".to_string(),
            flags: OpcodeFlags::empty(),
            value: 0,
            value_kind: LabelKind::None,
            immediates: Vec::new(),
        },
        _ => {
            let entry = &MAIN[b1 as usize];
            let (template, added_displacement) = substitute_index(entry.template, index);
            let value_kind = if added_displacement && entry.value_kind == LabelKind::None {
                LabelKind::RelativeIndex
            } else {
                entry.value_kind
            };
            build(mem, addr, 2, template, entry.flags, value_kind, b1)
        }
    }
}

/// Parse the template's immediate sentinels against the bytes following
/// the opcode, then pick the primary value according to the value kind.
fn build(
    mem: &Memory,
    addr: u16,
    opcode_len: u16,
    template: String,
    flags: OpcodeFlags,
    value_kind: LabelKind,
    opcode_byte: u8,
) -> Instruction {
    let mut immediates = Vec::new();
    let mut cursor = addr.wrapping_add(opcode_len);

    let bytes = template.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' {
            match bytes.get(i + 1) {
                Some(b'n') if bytes.get(i + 2) == Some(&b'n') => {
                    let w = if value_kind == LabelKind::NumberWordBigEndian {
                        mem.read_word_be(cursor)
                    } else {
                        mem.read_word(cursor)
                    };
                    immediates.push(Immediate::Word(w));
                    cursor = cursor.wrapping_add(2);
                    i += 3;
                    continue;
                }
                Some(b'n') => {
                    immediates.push(Immediate::Byte(mem.read_byte(cursor)));
                    cursor = cursor.wrapping_add(1);
                    i += 2;
                    continue;
                }
                Some(b'e') => {
                    // Relative target: PC after the two-byte instruction
                    // plus the signed displacement, wrapping.
                    let e = mem.read_byte(cursor) as i8;
                    let target = addr.wrapping_add(2).wrapping_add(e as u16);
                    immediates.push(Immediate::Target(target));
                    cursor = cursor.wrapping_add(1);
                    i += 2;
                    continue;
                }
                Some(b'd') => {
                    immediates.push(Immediate::Index(mem.read_byte(cursor) as i8));
                    cursor = cursor.wrapping_add(1);
                    i += 2;
                    continue;
                }
                _ => {}
            }
        }
        i += 1;
    }

    let value = primary_value(value_kind, &immediates, opcode_byte);

    Instruction {
        address: addr,
        length: cursor.wrapping_sub(addr) as u8,
        template,
        flags,
        value,
        value_kind,
        immediates,
    }
}

fn primary_value(kind: LabelKind, immediates: &[Immediate], opcode_byte: u8) -> u16 {
    match kind {
        LabelKind::CodeRst => (opcode_byte & 0x38) as u16,
        LabelKind::CodeLocalLbl | LabelKind::CodeLocalLoop => immediates
            .iter()
            .find_map(|imm| match imm {
                Immediate::Target(t) => Some(*t),
                _ => None,
            })
            .unwrap_or(0),
        LabelKind::CodeLbl
        | LabelKind::CodeSub
        | LabelKind::NumberWord
        | LabelKind::NumberWordBigEndian
        | LabelKind::DataLbl => immediates
            .iter()
            .find_map(|imm| match imm {
                Immediate::Word(w) => Some(*w),
                _ => None,
            })
            .unwrap_or(0),
        LabelKind::NumberByte | LabelKind::PortLbl => immediates
            .iter()
            .find_map(|imm| match imm {
                Immediate::Byte(b) => Some(*b as u16),
                _ => None,
            })
            .unwrap_or(0),
        LabelKind::RelativeIndex => immediates
            .iter()
            .find_map(|imm| match imm {
                Immediate::Index(d) => Some(*d as u8 as u16),
                _ => None,
            })
            .unwrap_or(0),
        LabelKind::None => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mem_with(origin: u16, bytes: &[u8]) -> Memory {
        let mut mem = Memory::new();
        mem.set_bytes(origin, bytes);
        mem
    }

    #[test]
    fn decode_simple_loads() {
        let mem = mem_with(0, &[0x3E, 0x05]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "LD A,#n");
        assert_eq!(inst.length, 2);
        assert_eq!(inst.value, 5);
        assert_eq!(inst.value_kind, LabelKind::NumberByte);
    }

    #[test]
    fn decode_jp_and_call() {
        let mem = mem_with(0, &[0xC3, 0x34, 0x12, 0xCD, 0x00, 0x80]);
        let jp = decode_instruction(&mem, 0);
        assert_eq!(jp.template, "JP #nn");
        assert_eq!(jp.value, 0x1234);
        assert_eq!(jp.value_kind, LabelKind::CodeLbl);
        assert!(jp.is_stop());

        let call = decode_instruction(&mem, 3);
        assert_eq!(call.value, 0x8000);
        assert_eq!(call.value_kind, LabelKind::CodeSub);
        assert!(call.is_call());
        assert!(!call.is_stop());
    }

    #[test]
    fn relative_targets_from_pc_plus_two() {
        // JR -2 at 0x0000: target = 0 + 2 - 2 = 0.
        let mem = mem_with(0, &[0x18, 0xFE]);
        let jr = decode_instruction(&mem, 0);
        assert_eq!(jr.value, 0x0000);
        assert_eq!(jr.value_kind, LabelKind::CodeLocalLbl);

        // DJNZ +3 at 0x0010: target = 0x15.
        let mem = mem_with(0x0010, &[0x10, 0x03]);
        let djnz = decode_instruction(&mem, 0x0010);
        assert_eq!(djnz.template, "DJNZ #e");
        assert_eq!(djnz.value, 0x0015);
    }

    #[test]
    fn relative_target_wraps_address_space() {
        // JR +2 at 0xFFFD: target = 0xFFFD + 2 + 2 = 0x0001.
        let mem = mem_with(0xFFFD, &[0x18, 0x02]);
        let jr = decode_instruction(&mem, 0xFFFD);
        assert_eq!(jr.value, 0x0001);
    }

    #[test]
    fn rst_targets_are_page_zero() {
        let mem = mem_with(0, &[0xC7, 0xDF, 0xFF]);
        assert_eq!(decode_instruction(&mem, 0).value, 0x00);
        assert_eq!(decode_instruction(&mem, 1).value, 0x18);
        assert_eq!(decode_instruction(&mem, 2).value, 0x38);
        let rst = decode_instruction(&mem, 2);
        assert_eq!(rst.value_kind, LabelKind::CodeRst);
        assert!(rst.is_call());
    }

    #[test]
    fn decode_cb_page() {
        let mem = mem_with(0, &[0xCB, 0x27]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "SLA A");
        assert_eq!(inst.length, 2);
    }

    #[test]
    fn decode_ed_page() {
        let mem = mem_with(0, &[0xED, 0x4B, 0x00, 0x90]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "LD BC,(#nn)");
        assert_eq!(inst.length, 4);
        assert_eq!(inst.value, 0x9000);
        assert_eq!(inst.value_kind, LabelKind::DataLbl);
    }

    #[test]
    fn decode_zx_next_big_endian_push() {
        let mem = mem_with(0, &[0xED, 0x8A, 0x12, 0x34]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "PUSH #nn");
        assert_eq!(inst.length, 4);
        // High byte first.
        assert_eq!(inst.value, 0x1234);
        assert_eq!(inst.value_kind, LabelKind::NumberWordBigEndian);
    }

    #[test]
    fn decode_indexed_with_displacement() {
        // LD (IX+5),0x42
        let mem = mem_with(0, &[0xDD, 0x36, 0x05, 0x42]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "LD (IX#d),#n");
        assert_eq!(inst.length, 4);
        assert_eq!(inst.immediates, vec![Immediate::Index(5), Immediate::Byte(0x42)]);
        assert_eq!(inst.value, 0x42);
        assert_eq!(inst.value_kind, LabelKind::NumberByte);
    }

    #[test]
    fn decode_indexed_without_memory_operand() {
        // ADD IY,DE
        let mem = mem_with(0, &[0xFD, 0x19]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "ADD IY,DE");
        assert_eq!(inst.length, 2);
    }

    #[test]
    fn decode_indexed_cb() {
        // SET 6,(IX-1)
        let mem = mem_with(0, &[0xDD, 0xCB, 0xFF, 0xF6]);
        let inst = decode_instruction(&mem, 0);
        assert_eq!(inst.template, "SET 6,(IX#d)");
        assert_eq!(inst.length, 4);
        assert_eq!(inst.immediates, vec![Immediate::Index(-1)]);
    }

    #[test]
    fn decode_jp_hl_variants_stop() {
        let mem = mem_with(0, &[0xE9, 0xDD, 0xE9]);
        let jp_hl = decode_instruction(&mem, 0);
        assert_eq!(jp_hl.template, "JP (HL)");
        assert!(jp_hl.is_stop());
        let jp_ix = decode_instruction(&mem, 1);
        assert_eq!(jp_ix.template, "JP (IX)");
        assert_eq!(jp_ix.length, 2);
        assert!(jp_ix.is_stop());
    }
}
