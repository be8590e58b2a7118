//! Label taxonomy and the address→label store.
//!
//! Labels are keyed by their 16-bit address; the address doubles as the
//! stable label id everywhere else in the analysis (parent map, callee
//! lists). The store iterates in ascending address order, which is what
//! the later analysis passes rely on for determinism.

use std::collections::{BTreeMap, BTreeSet};

use crate::memory::MemAttr;

/// Label classification, ordered by ascending priority.
///
/// When two analyses disagree about one address, the higher-ranked kind
/// wins; `set_found` promotes with `max`. The derived `Ord` follows
/// declaration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LabelKind {
    None,
    /// Target of a forward `JR`/`DJNZ` inside a subroutine.
    CodeLocalLbl,
    /// Target of a backward `JR`/`DJNZ` (a loop head).
    CodeLocalLoop,
    /// Absolute code label (`JP` target).
    CodeLbl,
    /// Subroutine entry (`CALL` target, or promoted `JP` target).
    CodeSub,
    /// `RST p` target in page zero.
    CodeRst,
    /// Index displacement in `(IX+d)` / `(IY+d)`.
    RelativeIndex,
    /// Plain 8-bit immediate.
    NumberByte,
    /// Plain 16-bit immediate.
    NumberWord,
    /// 16-bit immediate stored high byte first (ZX-Next `PUSH nn`).
    NumberWordBigEndian,
    /// Immediate used as a memory address (`LD A,(nn)` and friends).
    DataLbl,
    /// I/O port number (`IN`/`OUT`).
    PortLbl,
}

impl LabelKind {
    /// True for the kinds that label decodable code (any priority).
    pub fn is_code(self) -> bool {
        matches!(
            self,
            LabelKind::CodeLocalLbl
                | LabelKind::CodeLocalLoop
                | LabelKind::CodeLbl
                | LabelKind::CodeSub
                | LabelKind::CodeRst
        )
    }

    /// True for the top-level code kinds that own a body of instructions.
    pub fn is_top_code(self) -> bool {
        matches!(
            self,
            LabelKind::CodeLbl | LabelKind::CodeSub | LabelKind::CodeRst
        )
    }

    /// True for the two local (subroutine-scoped) kinds.
    pub fn is_local(self) -> bool {
        matches!(self, LabelKind::CodeLocalLbl | LabelKind::CodeLocalLoop)
    }
}

/// One synthesized (or user-fixed) label.
#[derive(Debug, Clone)]
pub struct Label {
    /// The labelled address; also the label's id in the store.
    pub address: u16,
    pub kind: LabelKind,
    /// Assigned in the naming pass, or provided by the user. User names
    /// survive every pass.
    pub name: Option<String>,
    /// Instruction addresses that target this label. Never contains the
    /// label's own address.
    pub referrers: BTreeSet<u16>,
    /// Labels called or jumped to from this label's body, by address.
    /// May contain duplicates; used only for presentation and the call
    /// graph.
    pub callees: Vec<u16>,
    /// The address was never assigned from an input image; the label
    /// renders as an `EQU` directive instead of code.
    pub is_equ: bool,
    /// Created by the user (entry point, jump table); immune to renaming
    /// and to local-scope demotion.
    pub is_fixed: bool,
    /// Discovered by interrupt detection; named with the INTRPT prefix.
    pub belongs_to_interrupt: bool,
}

impl Label {
    fn new(address: u16, kind: LabelKind) -> Self {
        Label {
            address,
            kind,
            name: None,
            referrers: BTreeSet::new(),
            callees: Vec::new(),
            is_equ: false,
            is_fixed: false,
            belongs_to_interrupt: false,
        }
    }
}

/// Address→label map plus the offset-label map for data pointers that
/// land inside an instruction.
#[derive(Default)]
pub struct LabelStore {
    labels: BTreeMap<u16, Label>,
    /// Original target → `first_byte − original` (non-positive). A lookup
    /// at the original address resolves to the label at
    /// `original + offset` plus a textual `+N`/`-N` suffix.
    offsets: BTreeMap<u16, i32>,
}

impl LabelStore {
    pub fn new() -> Self {
        LabelStore::default()
    }

    /// Record a discovered reference to `addr`.
    ///
    /// Creates the label if missing; otherwise promotes its kind to
    /// `max(existing, kind)`. Referrers equal to the label address are
    /// dropped. When the target byte is not `ASSIGNED` the label is
    /// marked `is_equ`.
    pub fn set_found(
        &mut self,
        addr: u16,
        referrers: &[u16],
        kind: LabelKind,
        attr: MemAttr,
    ) -> &mut Label {
        let label = self
            .labels
            .entry(addr)
            .or_insert_with(|| Label::new(addr, kind));
        if kind > label.kind {
            label.kind = kind;
        }
        for &r in referrers {
            if r != addr {
                label.referrers.insert(r);
            }
        }
        if !attr.contains(MemAttr::ASSIGNED) {
            label.is_equ = true;
        }
        label
    }

    /// Create a user-fixed `CodeLbl`. The caller decides whether the
    /// address is assigned; unassigned fixed labels become `EQU`s.
    pub fn set_fixed(&mut self, addr: u16, name: Option<String>, assigned: bool) -> &mut Label {
        let label = self
            .labels
            .entry(addr)
            .or_insert_with(|| Label::new(addr, LabelKind::CodeLbl));
        if LabelKind::CodeLbl > label.kind {
            label.kind = LabelKind::CodeLbl;
        }
        label.is_fixed = true;
        if name.is_some() {
            label.name = name;
        }
        if !assigned {
            label.is_equ = true;
        }
        label
    }

    pub fn get(&self, addr: u16) -> Option<&Label> {
        self.labels.get(&addr)
    }

    pub fn get_mut(&mut self, addr: u16) -> Option<&mut Label> {
        self.labels.get_mut(&addr)
    }

    pub fn contains(&self, addr: u16) -> bool {
        self.labels.contains_key(&addr)
    }

    pub fn remove(&mut self, addr: u16) -> Option<Label> {
        self.labels.remove(&addr)
    }

    /// Ascending-address iteration.
    pub fn iter(&self) -> impl Iterator<Item = (&u16, &Label)> {
        self.labels.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&u16, &mut Label)> {
        self.labels.iter_mut()
    }

    pub fn addresses(&self) -> Vec<u16> {
        self.labels.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn add_referrer(&mut self, addr: u16, referrer: u16) {
        if let Some(label) = self.labels.get_mut(&addr) {
            if referrer != addr {
                label.referrers.insert(referrer);
            }
        }
    }

    pub fn set_offset(&mut self, original: u16, offset: i32) {
        self.offsets.insert(original, offset);
    }

    pub fn offset(&self, addr: u16) -> Option<i32> {
        self.offsets.get(&addr).copied()
    }

    pub fn offsets(&self) -> impl Iterator<Item = (&u16, &i32)> {
        self.offsets.iter()
    }

    /// Resolve an address to a display name: a direct label name, or an
    /// anchor name plus offset suffix when the address sits inside an
    /// instruction covered by an offset label.
    pub fn resolve_name(&self, addr: u16) -> Option<String> {
        if let Some(label) = self.labels.get(&addr) {
            if let Some(name) = &label.name {
                return Some(name.clone());
            }
        }
        if let Some(offs) = self.offset(addr) {
            let anchor = (addr as i32 + offs) as u16;
            if let Some(label) = self.labels.get(&anchor) {
                if let Some(name) = &label.name {
                    return Some(format!("{name}{}", offset_suffix(offs)));
                }
            }
        }
        None
    }
}

/// Textual suffix for an offset label.
///
/// The stored offset runs from the original target to the instruction
/// start, so the displayed offset is its negation. The sign spelling
/// below reproduces the historical output of this tool family: positive
/// stored offsets print as a bare negative number, non-positive ones
/// with a leading `+`.
pub fn offset_suffix(offs: i32) -> String {
    if offs > 0 {
        format!("{}", -offs)
    } else {
        format!("+{}", -offs)
    }
}
