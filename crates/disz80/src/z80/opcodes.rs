//! Static Z80 opcode tables.
//!
//! The unprefixed and `ED` pages are literal 256-entry tables. The `CB`
//! page (rotates, shifts, bit ops) and the `DDCB`/`FDCB` pages are fully
//! regular, so their mnemonics are derived from the opcode bit pattern
//! instead of being spelled out. The `DD`/`FD` pages reuse the main table
//! with `HL` replaced by `IX`/`IY` (and `(HL)` by `(IX+d)`, which adds
//! the displacement byte).
//!
//! Mnemonic templates use sentinels for immediates:
//! `#n` byte, `#nn` word, `#e` relative displacement, `#d` index
//! displacement. Whether a `#nn` is little- or big-endian is carried by
//! the entry's value kind, not the sentinel.

use crate::labels::LabelKind;

use super::instruction::OpcodeFlags;

/// One opcode-table entry.
#[derive(Debug, Clone, Copy)]
pub struct Opcode {
    /// Mnemonic template with immediate sentinels.
    pub template: &'static str,
    pub flags: OpcodeFlags,
    /// What the primary immediate means (and the kind of any label
    /// created at its value).
    pub value_kind: LabelKind,
}

const fn op(template: &'static str) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::empty(),
        value_kind: LabelKind::None,
    }
}

const fn imm(template: &'static str, value_kind: LabelKind) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::empty(),
        value_kind,
    }
}

const fn br(template: &'static str, value_kind: LabelKind) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::BRANCH_ADDRESS,
        value_kind,
    }
}

const fn br_stop(template: &'static str, value_kind: LabelKind) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::BRANCH_ADDRESS.union(OpcodeFlags::STOP),
        value_kind,
    }
}

const fn call(template: &'static str) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::BRANCH_ADDRESS.union(OpcodeFlags::CALL),
        value_kind: LabelKind::CodeSub,
    }
}

const fn rst(template: &'static str) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::BRANCH_ADDRESS.union(OpcodeFlags::CALL),
        value_kind: LabelKind::CodeRst,
    }
}

const fn stop(template: &'static str) -> Opcode {
    Opcode {
        template,
        flags: OpcodeFlags::STOP,
        value_kind: LabelKind::None,
    }
}

/// Placeholder for undefined encodings (and for the prefix bytes, which
/// the decoder intercepts before the table is consulted).
pub const INVALID: Opcode = op("INVALID");

use LabelKind::{CodeLbl, CodeLocalLbl, DataLbl, NumberByte, NumberWord, NumberWordBigEndian, PortLbl};

/// The unprefixed opcode page.
#[rustfmt::skip]
pub static MAIN: [Opcode; 256] = [
    // 0x00
    op("NOP"),                 imm("LD BC,#nn", NumberWord), op("LD (BC),A"),  op("INC BC"),
    op("INC B"),               op("DEC B"),                  imm("LD B,#n", NumberByte), op("RLCA"),
    // 0x08
    op("EX AF,AF'"),           op("ADD HL,BC"),              op("LD A,(BC)"),  op("DEC BC"),
    op("INC C"),               op("DEC C"),                  imm("LD C,#n", NumberByte), op("RRCA"),
    // 0x10
    br("DJNZ #e", CodeLocalLbl), imm("LD DE,#nn", NumberWord), op("LD (DE),A"), op("INC DE"),
    op("INC D"),               op("DEC D"),                  imm("LD D,#n", NumberByte), op("RLA"),
    // 0x18
    br_stop("JR #e", CodeLocalLbl), op("ADD HL,DE"),         op("LD A,(DE)"),  op("DEC DE"),
    op("INC E"),               op("DEC E"),                  imm("LD E,#n", NumberByte), op("RRA"),
    // 0x20
    br("JR NZ,#e", CodeLocalLbl), imm("LD HL,#nn", NumberWord), imm("LD (#nn),HL", DataLbl), op("INC HL"),
    op("INC H"),               op("DEC H"),                  imm("LD H,#n", NumberByte), op("DAA"),
    // 0x28
    br("JR Z,#e", CodeLocalLbl), op("ADD HL,HL"),            imm("LD HL,(#nn)", DataLbl), op("DEC HL"),
    op("INC L"),               op("DEC L"),                  imm("LD L,#n", NumberByte), op("CPL"),
    // 0x30
    br("JR NC,#e", CodeLocalLbl), imm("LD SP,#nn", NumberWord), imm("LD (#nn),A", DataLbl), op("INC SP"),
    op("INC (HL)"),            op("DEC (HL)"),               imm("LD (HL),#n", NumberByte), op("SCF"),
    // 0x38
    br("JR C,#e", CodeLocalLbl), op("ADD HL,SP"),            imm("LD A,(#nn)", DataLbl), op("DEC SP"),
    op("INC A"),               op("DEC A"),                  imm("LD A,#n", NumberByte), op("CCF"),
    // 0x40
    op("LD B,B"),   op("LD B,C"),   op("LD B,D"),   op("LD B,E"),
    op("LD B,H"),   op("LD B,L"),   op("LD B,(HL)"), op("LD B,A"),
    // 0x48
    op("LD C,B"),   op("LD C,C"),   op("LD C,D"),   op("LD C,E"),
    op("LD C,H"),   op("LD C,L"),   op("LD C,(HL)"), op("LD C,A"),
    // 0x50
    op("LD D,B"),   op("LD D,C"),   op("LD D,D"),   op("LD D,E"),
    op("LD D,H"),   op("LD D,L"),   op("LD D,(HL)"), op("LD D,A"),
    // 0x58
    op("LD E,B"),   op("LD E,C"),   op("LD E,D"),   op("LD E,E"),
    op("LD E,H"),   op("LD E,L"),   op("LD E,(HL)"), op("LD E,A"),
    // 0x60
    op("LD H,B"),   op("LD H,C"),   op("LD H,D"),   op("LD H,E"),
    op("LD H,H"),   op("LD H,L"),   op("LD H,(HL)"), op("LD H,A"),
    // 0x68
    op("LD L,B"),   op("LD L,C"),   op("LD L,D"),   op("LD L,E"),
    op("LD L,H"),   op("LD L,L"),   op("LD L,(HL)"), op("LD L,A"),
    // 0x70
    op("LD (HL),B"), op("LD (HL),C"), op("LD (HL),D"), op("LD (HL),E"),
    op("LD (HL),H"), op("LD (HL),L"), op("HALT"),      op("LD (HL),A"),
    // 0x78
    op("LD A,B"),   op("LD A,C"),   op("LD A,D"),   op("LD A,E"),
    op("LD A,H"),   op("LD A,L"),   op("LD A,(HL)"), op("LD A,A"),
    // 0x80
    op("ADD A,B"),  op("ADD A,C"),  op("ADD A,D"),  op("ADD A,E"),
    op("ADD A,H"),  op("ADD A,L"),  op("ADD A,(HL)"), op("ADD A,A"),
    // 0x88
    op("ADC A,B"),  op("ADC A,C"),  op("ADC A,D"),  op("ADC A,E"),
    op("ADC A,H"),  op("ADC A,L"),  op("ADC A,(HL)"), op("ADC A,A"),
    // 0x90
    op("SUB B"),    op("SUB C"),    op("SUB D"),    op("SUB E"),
    op("SUB H"),    op("SUB L"),    op("SUB (HL)"), op("SUB A"),
    // 0x98
    op("SBC A,B"),  op("SBC A,C"),  op("SBC A,D"),  op("SBC A,E"),
    op("SBC A,H"),  op("SBC A,L"),  op("SBC A,(HL)"), op("SBC A,A"),
    // 0xA0
    op("AND B"),    op("AND C"),    op("AND D"),    op("AND E"),
    op("AND H"),    op("AND L"),    op("AND (HL)"), op("AND A"),
    // 0xA8
    op("XOR B"),    op("XOR C"),    op("XOR D"),    op("XOR E"),
    op("XOR H"),    op("XOR L"),    op("XOR (HL)"), op("XOR A"),
    // 0xB0
    op("OR B"),     op("OR C"),     op("OR D"),     op("OR E"),
    op("OR H"),     op("OR L"),     op("OR (HL)"),  op("OR A"),
    // 0xB8
    op("CP B"),     op("CP C"),     op("CP D"),     op("CP E"),
    op("CP H"),     op("CP L"),     op("CP (HL)"),  op("CP A"),
    // 0xC0
    op("RET NZ"),   op("POP BC"),   br("JP NZ,#nn", CodeLbl), br_stop("JP #nn", CodeLbl),
    call("CALL NZ,#nn"), op("PUSH BC"), imm("ADD A,#n", NumberByte), rst("RST 00h"),
    // 0xC8
    op("RET Z"),    stop("RET"),    br("JP Z,#nn", CodeLbl), INVALID, // CB prefix
    call("CALL Z,#nn"), call("CALL #nn"), imm("ADC A,#n", NumberByte), rst("RST 08h"),
    // 0xD0
    op("RET NC"),   op("POP DE"),   br("JP NC,#nn", CodeLbl), imm("OUT (#n),A", PortLbl),
    call("CALL NC,#nn"), op("PUSH DE"), imm("SUB #n", NumberByte), rst("RST 10h"),
    // 0xD8
    op("RET C"),    op("EXX"),      br("JP C,#nn", CodeLbl), imm("IN A,(#n)", PortLbl),
    call("CALL C,#nn"), INVALID /* DD prefix */, imm("SBC A,#n", NumberByte), rst("RST 18h"),
    // 0xE0
    op("RET PO"),   op("POP HL"),   br("JP PO,#nn", CodeLbl), op("EX (SP),HL"),
    call("CALL PO,#nn"), op("PUSH HL"), imm("AND #n", NumberByte), rst("RST 20h"),
    // 0xE8
    op("RET PE"),   stop("JP (HL)"), br("JP PE,#nn", CodeLbl), op("EX DE,HL"),
    call("CALL PE,#nn"), INVALID /* ED prefix */, imm("XOR #n", NumberByte), rst("RST 28h"),
    // 0xF0
    op("RET P"),    op("POP AF"),   br("JP P,#nn", CodeLbl), op("DI"),
    call("CALL P,#nn"), op("PUSH AF"), imm("OR #n", NumberByte), rst("RST 30h"),
    // 0xF8
    op("RET M"),    op("LD SP,HL"), br("JP M,#nn", CodeLbl), op("EI"),
    call("CALL M,#nn"), INVALID /* FD prefix */, imm("CP #n", NumberByte), rst("RST 38h"),
];

/// The `ED` opcode page. Undefined slots decode as `INVALID`.
#[rustfmt::skip]
pub static ED: [Opcode; 256] = [
    // 0x00-0x3F: undefined
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    // 0x40
    op("IN B,(C)"), op("OUT (C),B"), op("SBC HL,BC"), imm("LD (#nn),BC", DataLbl),
    op("NEG"),      stop("RETN"),    op("IM 0"),      op("LD I,A"),
    // 0x48
    op("IN C,(C)"), op("OUT (C),C"), op("ADC HL,BC"), imm("LD BC,(#nn)", DataLbl),
    INVALID,        stop("RETI"),    INVALID,         op("LD R,A"),
    // 0x50
    op("IN D,(C)"), op("OUT (C),D"), op("SBC HL,DE"), imm("LD (#nn),DE", DataLbl),
    INVALID,        INVALID,         op("IM 1"),      op("LD A,I"),
    // 0x58
    op("IN E,(C)"), op("OUT (C),E"), op("ADC HL,DE"), imm("LD DE,(#nn)", DataLbl),
    INVALID,        INVALID,         op("IM 2"),      op("LD A,R"),
    // 0x60
    op("IN H,(C)"), op("OUT (C),H"), op("SBC HL,HL"), imm("LD (#nn),HL", DataLbl),
    INVALID,        INVALID,         INVALID,         op("RRD"),
    // 0x68
    op("IN L,(C)"), op("OUT (C),L"), op("ADC HL,HL"), imm("LD HL,(#nn)", DataLbl),
    INVALID,        INVALID,         INVALID,         op("RLD"),
    // 0x70
    INVALID,        INVALID,         op("SBC HL,SP"), imm("LD (#nn),SP", DataLbl),
    INVALID,        INVALID,         INVALID,         INVALID,
    // 0x78
    op("IN A,(C)"), op("OUT (C),A"), op("ADC HL,SP"), imm("LD SP,(#nn)", DataLbl),
    INVALID,        INVALID,         INVALID,         INVALID,
    // 0x80-0x9F: undefined except the ZX-Next big-endian PUSH at 0x8A
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, imm("PUSH #nn", NumberWordBigEndian), INVALID,
    INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    // 0xA0
    op("LDI"),  op("CPI"),  op("INI"),  op("OUTI"),
    INVALID,    INVALID,    INVALID,    INVALID,
    // 0xA8
    op("LDD"),  op("CPD"),  op("IND"),  op("OUTD"),
    INVALID,    INVALID,    INVALID,    INVALID,
    // 0xB0
    op("LDIR"), op("CPIR"), op("INIR"), op("OTIR"),
    INVALID,    INVALID,    INVALID,    INVALID,
    // 0xB8
    op("LDDR"), op("CPDR"), op("INDR"), op("OTDR"),
    INVALID,    INVALID,    INVALID,    INVALID,
    // 0xC0-0xFF: undefined
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
    INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID, INVALID,
];

const REGS: [&str; 8] = ["B", "C", "D", "E", "H", "L", "(HL)", "A"];
const ROTS: [&str; 8] = ["RLC", "RRC", "RL", "RR", "SLA", "SRA", "SLL", "SRL"];

/// Mnemonic for a `CB`-page opcode. The page is fully regular:
/// bits 7-6 select rotate/BIT/RES/SET, bits 5-3 the sub-op or bit
/// number, bits 2-0 the register.
pub fn cb_template(op: u8) -> String {
    let r = REGS[(op & 7) as usize];
    let n = (op >> 3) & 7;
    match op >> 6 {
        0 => format!("{} {}", ROTS[n as usize], r),
        1 => format!("BIT {n},{r}"),
        2 => format!("RES {n},{r}"),
        _ => format!("SET {n},{r}"),
    }
}

/// Mnemonic for a `DDCB`/`FDCB` opcode. `index` is `"IX"` or `"IY"`.
///
/// The register field selects `(HL)` for the plain forms; the other
/// encodings are the undocumented copy-to-register variants, rendered
/// with the register as an extra operand. `BIT` has no writeback, so the
/// register field is ignored there.
pub fn index_cb_template(op: u8, index: &str) -> String {
    let r = REGS[(op & 7) as usize];
    let n = (op >> 3) & 7;
    let mem = format!("({index}#d)");
    match op >> 6 {
        0 if r == "(HL)" => format!("{} {mem}", ROTS[n as usize]),
        0 => format!("{} {mem},{r}", ROTS[n as usize]),
        1 => format!("BIT {n},{mem}"),
        2 if r == "(HL)" => format!("RES {n},{mem}"),
        2 => format!("RES {n},{mem},{r}"),
        _ if r == "(HL)" => format!("SET {n},{mem}"),
        _ => format!("SET {n},{mem},{r}"),
    }
}

/// Rewrite a main-page template for the `DD`/`FD` pages.
///
/// Returns the rewritten template and whether a displacement byte was
/// added. `(HL)` becomes `(IX+d)` except in `JP (HL)` (no displacement);
/// otherwise `HL` becomes `IX` and standalone `H`/`L` become the
/// undocumented `IXH`/`IXL` halves. A template without any of these
/// tokens is returned unchanged: the prefix merely lengthens the
/// instruction.
pub fn substitute_index(template: &str, index: &str) -> (String, bool) {
    if template == "JP (HL)" {
        return (format!("JP ({index})"), false);
    }
    if template.contains("(HL)") {
        return (template.replace("(HL)", &format!("({index}#d)")), true);
    }
    if template.contains("HL") {
        return (template.replace("HL", index), false);
    }
    (replace_register_halves(template, index), false)
}

/// Replace standalone `H` and `L` register tokens with `IXH`/`IXL`.
/// Token boundaries are non-alphanumeric, so `HALT` is untouched.
fn replace_register_halves(template: &str, index: &str) -> String {
    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len() + 4);
    for (i, &b) in bytes.iter().enumerate() {
        let standalone = (b == b'H' || b == b'L')
            && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric())
            && (i + 1 == bytes.len() || !bytes[i + 1].is_ascii_alphanumeric());
        if standalone {
            out.push_str(index);
            out.push(if b == b'H' { 'H' } else { 'L' });
        } else {
            out.push(b as char);
        }
    }
    out
}
