use bitflags::bitflags;

use crate::labels::LabelKind;

bitflags! {
    /// Control-flow properties of an opcode.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct OpcodeFlags: u8 {
        /// The immediate is a code target (`JP`, `JR`, `DJNZ`, `CALL`,
        /// `RST` and their conditional variants).
        const BRANCH_ADDRESS = 0b001;
        /// A call form: `CALL nn`, `CALL cc,nn`, `RST p`.
        const CALL = 0b010;
        /// Unconditionally ends a basic block: `RET`, `JP nn`, `JP (HL)`,
        /// `JR e`, `RETI`, `RETN`. Conditional returns and jumps do not
        /// stop the flow.
        const STOP = 0b100;
    }
}

/// One decoded immediate operand, in template sentinel order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Immediate {
    /// `#n` — raw byte.
    Byte(u8),
    /// `#nn` — 16-bit value (already endian-decoded).
    Word(u16),
    /// `#e` — relative displacement resolved to its absolute target.
    Target(u16),
    /// `#d` — signed index displacement in `(IX+d)` / `(IY+d)`.
    Index(i8),
}

/// A fully decoded Z80 instruction.
///
/// The mnemonic is kept as a template with `#n`/`#nn`/`#e`/`#d`
/// sentinels; the immediates are carried separately so the renderer can
/// substitute numbers or label names without re-reading memory.
#[derive(Debug, Clone)]
pub struct Instruction {
    /// Address of the first byte.
    pub address: u16,
    /// Total length in bytes (1-4).
    pub length: u8,
    /// Mnemonic template, e.g. `"LD A,#n"` or `"BIT 3,(IX#d)"`.
    pub template: String,
    pub flags: OpcodeFlags,
    /// The analysis-relevant immediate: absolute 16-bit target for
    /// branches, raw byte/word otherwise. Zero when `value_kind` is
    /// `None`.
    pub value: u16,
    /// What the immediate means; doubles as the label kind for any label
    /// created at `value`.
    pub value_kind: LabelKind,
    /// All immediates, in the order their sentinels appear in the
    /// template.
    pub immediates: Vec<Immediate>,
}

impl Instruction {
    /// Address of the following instruction, wrapping at the top of
    /// memory.
    pub fn next_address(&self) -> u16 {
        self.address.wrapping_add(self.length as u16)
    }

    pub fn is_branch(&self) -> bool {
        self.flags.contains(OpcodeFlags::BRANCH_ADDRESS)
    }

    pub fn is_call(&self) -> bool {
        self.flags.contains(OpcodeFlags::CALL)
    }

    pub fn is_stop(&self) -> bool {
        self.flags.contains(OpcodeFlags::STOP)
    }

    /// Absolute branch target, for the branch forms.
    pub fn branch_target(&self) -> Option<u16> {
        if self.is_branch() {
            Some(self.value)
        } else {
            None
        }
    }

    /// A branch that may or may not be taken: it carries a target but
    /// does not unconditionally end the block, and it is not a plain
    /// `CALL`/`RST` (whose comma-less mnemonics are unconditional).
    pub fn is_conditional_branch(&self) -> bool {
        self.is_branch()
            && !self.is_stop()
            && (self.template.contains(',') || !self.is_call())
    }

    /// `RET cc` — mnemonic `RET` followed by a condition.
    pub fn is_conditional_return(&self) -> bool {
        self.template.starts_with("RET ")
    }

    /// Any return mnemonic: `RET`, `RET cc`, `RETI`, `RETN`.
    pub fn is_return(&self) -> bool {
        self.template.starts_with("RET")
    }
}
