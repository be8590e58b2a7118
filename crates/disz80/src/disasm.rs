//! The disassembler: owns the address space and label store, drives the
//! worklist of entry addresses, and runs the analysis passes in their
//! fixed order.
//!
//! Pass order (each a closed transform over labels and attributes):
//! control-flow discovery, interrupt detection, special labels,
//! (store is inherently address-sorted), self-modifying-code
//! adjustment, flow-through references, LBL→SUB promotion, local-label
//! scoping, parent assignment, callee lists, statistics, naming.

pub mod naming;
pub mod passes;
pub mod stats;

use std::collections::{BTreeMap, BTreeSet, VecDeque};

use crate::error::{Error, Warning};
use crate::formats::{parse_sna, parse_trace, FormatError, SNA_RAM_START};
use crate::labels::{LabelKind, LabelStore};
use crate::memory::{MemAttr, Memory, MEMORY_SIZE};
use crate::z80::decode_instruction;

pub use naming::NamingOptions;
pub use stats::SubroutineStatistics;

/// A 65 536-entry visited set for the instruction-graph walks.
///
/// The walks are all expressed with explicit work-stacks over this set,
/// so pathological images cannot blow the call stack.
pub(crate) struct Visited {
    bits: Vec<u64>,
}

impl Visited {
    pub(crate) fn new() -> Self {
        Visited {
            bits: vec![0; MEMORY_SIZE / 64],
        }
    }

    /// Returns true if the address was not yet in the set.
    pub(crate) fn insert(&mut self, addr: u16) -> bool {
        let word = addr as usize / 64;
        let mask = 1u64 << (addr as usize % 64);
        let fresh = self.bits[word] & mask == 0;
        self.bits[word] |= mask;
        fresh
    }
}

/// Static disassembler for one 64 KiB memory image.
///
/// Load inputs, register entry points, then call [`analyze`]. The
/// instance is single-shot: re-running analysis on the same instance is
/// not supported; instantiate afresh.
///
/// [`analyze`]: Disassembler::analyze
pub struct Disassembler {
    pub memory: Memory,
    pub labels: LabelStore,
    /// Label-name prefixes used by the naming pass.
    pub naming: NamingOptions,
    queue: VecDeque<u16>,
    sna_start: Option<u16>,
    /// Per-address owning label (the enclosing subroutine or absolute
    /// label), filled by the parent pass.
    parents: Vec<Option<u16>>,
    statistics: BTreeMap<u16, SubroutineStatistics>,
    statistics_min: SubroutineStatistics,
    statistics_max: SubroutineStatistics,
    warnings: Vec<Warning>,
    /// Subroutines flagged by the parent pass as only calling themselves.
    self_referencing: BTreeSet<u16>,
}

impl Disassembler {
    pub fn new() -> Self {
        Disassembler {
            memory: Memory::new(),
            labels: LabelStore::new(),
            naming: NamingOptions::default(),
            queue: VecDeque::new(),
            sna_start: None,
            parents: vec![None; MEMORY_SIZE],
            statistics: BTreeMap::new(),
            statistics_min: SubroutineStatistics::default(),
            statistics_max: SubroutineStatistics::default(),
            warnings: Vec::new(),
            self_referencing: BTreeSet::new(),
        }
    }

    // ─── Inputs ──────────────────────────────────────────────────────

    /// Load a raw binary image at `origin`, wrapping at the top of
    /// memory.
    pub fn load_bin(&mut self, origin: u16, data: &[u8]) {
        self.memory.set_bytes(origin, data);
    }

    /// Load a ZX Spectrum .sna snapshot: 48 KiB at 0x4000 plus the
    /// start address recovered from the emulated stack, which is queued
    /// and remembered for the interrupt and special-label passes.
    pub fn load_sna(&mut self, data: &[u8]) -> Result<(), FormatError> {
        let snapshot = parse_sna(data)?;
        self.memory.set_bytes(SNA_RAM_START, &snapshot.ram);
        self.sna_start = Some(snapshot.start);
        self.queue.push_back(snapshot.start);
        Ok(())
    }

    /// Queue every address listed in a MAME trace file.
    pub fn load_trace(&mut self, text: &str) {
        for addr in parse_trace(text) {
            self.queue.push_back(addr);
        }
    }

    /// Register a user entry point: a fixed `CodeLbl` (with an optional
    /// user name) that is queued for disassembly when its byte is
    /// assigned, and rendered as an `EQU` otherwise.
    pub fn set_code_label(&mut self, addr: u16, name: Option<String>) {
        let assigned = self.memory.is_assigned(addr);
        self.labels.set_fixed(addr, name, assigned);
        if assigned {
            self.queue.push_back(addr);
        }
    }

    /// Read `count` little-endian words from a jump table at `addr` and
    /// register each as a fixed code label.
    pub fn set_jmp_table(&mut self, addr: u16, count: u16) {
        for i in 0..count {
            let target = self.memory.read_word(addr.wrapping_add(2 * i));
            self.set_code_label(target, None);
        }
    }

    // ─── Results ─────────────────────────────────────────────────────

    pub fn sna_start(&self) -> Option<u16> {
        self.sna_start
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn statistics(&self) -> &BTreeMap<u16, SubroutineStatistics> {
        &self.statistics
    }

    pub fn statistics_min(&self) -> SubroutineStatistics {
        self.statistics_min
    }

    pub fn statistics_max(&self) -> SubroutineStatistics {
        self.statistics_max
    }

    /// The label owning `addr`, established by the parent pass.
    pub fn parent(&self, addr: u16) -> Option<u16> {
        self.parents[addr as usize]
    }

    /// Subroutines warned about by the parent pass (only callers are
    /// themselves).
    pub fn self_referencing(&self) -> &BTreeSet<u16> {
        &self.self_referencing
    }

    // ─── Analysis ────────────────────────────────────────────────────

    /// Run the complete analysis pipeline.
    ///
    /// On the fatal ambiguous-decode error the already-computed labels
    /// and attributes remain available for inspection.
    pub fn analyze(&mut self) -> Result<(), Error> {
        // The reset vector is always an implicit entry point.
        if self.memory.is_assigned(0) {
            self.queue.push_back(0);
        }
        self.collect_labels()?;
        self.find_interrupt_labels();
        self.set_special_labels();
        // The label store iterates in address order by construction;
        // everything below relies on that.
        self.adjust_self_modifying_labels();
        self.add_flow_through_references();
        self.turn_lbl_into_sub();
        self.find_local_labels_in_subroutines();
        self.add_parent_references();
        self.add_calls_list_to_labels();
        self.count_statistics();
        self.assign_label_names();
        Ok(())
    }

    pub(crate) fn warn(&mut self, warning: Warning) {
        log::warn!("{warning}");
        self.warnings.push(warning);
    }

    /// Pass 1: pop entry addresses and follow the control flow,
    /// marking instruction bytes and harvesting branch targets.
    fn collect_labels(&mut self) -> Result<(), Error> {
        while let Some(addr) = self.queue.pop_front() {
            self.disassemble_flow(addr)?;
        }
        Ok(())
    }

    fn disassemble_flow(&mut self, start: u16) -> Result<(), Error> {
        let mut addr = start;
        loop {
            let attr = self.memory.attr(addr);
            if attr.contains(MemAttr::CODE) {
                if attr.contains(MemAttr::CODE_FIRST) {
                    // Joined an already-decoded stream.
                    return Ok(());
                }
                // Entry into the middle of a decoded instruction.
                let second = decode_instruction(&self.memory, addr);
                return Err(self.ambiguous_at(addr, &second.template, addr));
            }
            if !attr.contains(MemAttr::ASSIGNED) {
                self.warn(Warning::UnassignedAddress { address: addr });
                return Ok(());
            }

            let inst = decode_instruction(&self.memory, addr);
            for i in 1..inst.length as u16 {
                let a = addr.wrapping_add(i);
                if self.memory.attr(a).contains(MemAttr::CODE) {
                    return Err(self.ambiguous_at(addr, &inst.template, a));
                }
            }
            self.memory.or_attr(addr, 1, MemAttr::CODE_FIRST);
            self.memory.or_attr(addr, inst.length as u16, MemAttr::CODE);

            if inst.is_branch() {
                let target = inst.value;
                let mut kind = inst.value_kind;
                // A relative branch backwards is a loop head.
                if kind == LabelKind::CodeLocalLbl && target <= addr {
                    kind = LabelKind::CodeLocalLoop;
                }
                // A jump out of the image is a call into foreign code.
                if kind == LabelKind::CodeLbl && !self.memory.is_assigned(target) {
                    kind = LabelKind::CodeSub;
                }
                let target_attr = self.memory.attr(target);
                self.labels.set_found(target, &[addr], kind, target_attr);
                if target_attr.contains(MemAttr::CODE) {
                    if !target_attr.contains(MemAttr::CODE_FIRST) {
                        return Err(self.ambiguous_at(addr, &inst.template, target));
                    }
                } else if target_attr.contains(MemAttr::ASSIGNED) {
                    self.queue.push_back(target);
                }
            } else if inst.value_kind == LabelKind::DataLbl {
                // Data references get a label but are never queued.
                let target_attr = self.memory.attr(inst.value);
                self.labels
                    .set_found(inst.value, &[addr], LabelKind::DataLbl, target_attr);
            }

            if inst.is_stop() {
                return Ok(());
            }
            addr = inst.next_address();
        }
    }

    /// Build the fatal overlap error, naming both the new decode and
    /// the instruction that already covers the conflicting byte.
    fn ambiguous_at(&self, new_address: u16, new_mnemonic: &str, conflict: u16) -> Error {
        let existing_address = self.enclosing_code_first(conflict).unwrap_or(conflict);
        let existing = decode_instruction(&self.memory, existing_address);
        Error::AmbiguousDecode {
            existing_address,
            existing_mnemonic: existing.template,
            new_address,
            new_mnemonic: new_mnemonic.to_string(),
        }
    }

    /// First byte of the decoded instruction covering `addr`, scanning
    /// backwards at most four bytes (the maximum instruction length).
    pub(crate) fn enclosing_code_first(&self, addr: u16) -> Option<u16> {
        let mut a = addr;
        for _ in 0..4 {
            if self.memory.attr(a).contains(MemAttr::CODE_FIRST) {
                return Some(a);
            }
            a = a.wrapping_sub(1);
        }
        None
    }
}

impl Default for Disassembler {
    fn default() -> Self {
        Disassembler::new()
    }
}
