//! The label-refinement passes: interrupt detection, special labels,
//! self-modifying-code adjustment, flow-through references, LBL→SUB
//! promotion, local-label scoping and parent assignment.

use std::collections::BTreeSet;

use crate::error::Warning;
use crate::labels::LabelKind;
use crate::memory::{MemAttr, MEMORY_SIZE};
use crate::z80::decode_instruction;

use super::{Disassembler, Visited};

impl Disassembler {
    /// Pass 2: find interrupt entry points.
    ///
    /// A decoded instruction with no label whose predecessor is not
    /// code (or whose preceding instruction unconditionally ended the
    /// flow) was entered from outside the traced control flow — an
    /// interrupt handler or a trace-only entry. The SNA start address
    /// is exempt; it gets its own label in the next pass.
    pub(crate) fn find_interrupt_labels(&mut self) {
        let mut found = Vec::new();
        for addr in 0..MEMORY_SIZE as u32 {
            let addr = addr as u16;
            let attr = self.memory.attr(addr);
            if !attr.contains(MemAttr::CODE_FIRST) || !attr.contains(MemAttr::ASSIGNED) {
                continue;
            }
            if self.labels.contains(addr) || Some(addr) == self.sna_start() {
                continue;
            }
            let prev = addr.wrapping_sub(1);
            let prev_attr = self.memory.attr(prev);
            let flow_break = if !prev_attr.contains(MemAttr::ASSIGNED)
                || !prev_attr.contains(MemAttr::CODE)
            {
                true
            } else {
                match self.enclosing_code_first(prev) {
                    Some(first) => decode_instruction(&self.memory, first).is_stop(),
                    None => true,
                }
            };
            if flow_break {
                found.push(addr);
            }
        }
        for addr in found {
            let attr = self.memory.attr(addr);
            let label = self
                .labels
                .set_found(addr, &[], LabelKind::CodeLbl, attr);
            label.is_fixed = true;
            label.belongs_to_interrupt = true;
        }
    }

    /// Pass 3: label the SNA start address and every transition from
    /// unassigned to assigned memory.
    pub(crate) fn set_special_labels(&mut self) {
        if let Some(start) = self.sna_start() {
            if !self.labels.contains(start) {
                let attr = self.memory.attr(start);
                let label = self
                    .labels
                    .set_found(start, &[], LabelKind::CodeLbl, attr);
                label.is_fixed = true;
                label.name = Some(format!("SNA_LBL_MAIN_START_{start:04X}"));
            }
        }

        let mut prev_assigned = false;
        for addr in 0..MEMORY_SIZE as u32 {
            let addr = addr as u16;
            let assigned = self.memory.is_assigned(addr);
            if assigned && !prev_assigned && !self.labels.contains(addr) {
                let attr = self.memory.attr(addr);
                let label = self
                    .labels
                    .set_found(addr, &[], LabelKind::DataLbl, attr);
                label.name = Some(format!("BIN_START_{addr:04X}"));
            }
            prev_assigned = assigned;
        }
    }

    /// Pass 5: data labels that point inside a decoded instruction are
    /// self-modifying-code accesses. Move each to the instruction's
    /// first byte and record the (non-positive) offset from the
    /// original target so the renderer can print `anchor+N`.
    pub(crate) fn adjust_self_modifying_labels(&mut self) {
        let candidates: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind == LabelKind::DataLbl)
            .map(|(&a, _)| a)
            .collect();
        for addr in candidates {
            let attr = self.memory.attr(addr);
            if !attr.contains(MemAttr::CODE) || attr.contains(MemAttr::CODE_FIRST) {
                continue;
            }
            let Some(first) = self.enclosing_code_first(addr) else {
                continue;
            };
            let Some(old) = self.labels.remove(addr) else {
                continue;
            };
            let referrers: Vec<u16> = old.referrers.iter().copied().collect();
            let moved =
                self.labels
                    .set_found(first, &referrers, old.kind, self.memory.attr(first));
            if moved.name.is_none() {
                moved.name = old.name;
            }
            self.labels.set_offset(addr, first as i32 - addr as i32);
        }
    }

    /// Pass 6: when the flow of one top-level label runs straight into
    /// the next `CodeLbl`/`CodeSub`, record the last instruction before
    /// the boundary as a referrer of the label it falls into.
    pub(crate) fn add_flow_through_references(&mut self) {
        let starts: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind.is_top_code() && !l.is_equ)
            .map(|(&a, _)| a)
            .collect();
        for start in starts {
            let mut visited = Visited::new();
            let mut addr = start;
            loop {
                if !self.memory.attr(addr).contains(MemAttr::CODE_FIRST) || !visited.insert(addr)
                {
                    break;
                }
                let inst = decode_instruction(&self.memory, addr);
                if inst.is_stop() {
                    break;
                }
                let next = inst.next_address();
                if let Some(label) = self.labels.get(next) {
                    if (label.kind == LabelKind::CodeLbl || label.kind == LabelKind::CodeSub)
                        && next != start
                    {
                        self.labels.add_referrer(next, addr);
                        break;
                    }
                }
                addr = next;
            }
        }
    }

    /// Pass 7: promote a `CodeLbl` to `CodeSub` when its body reaches a
    /// return instruction (or flows into an existing subroutine).
    /// User-fixed entry points are subroutine roots by definition and
    /// promote unconditionally, so a routine that never returns (a main
    /// loop) still counts as one.
    pub(crate) fn turn_lbl_into_sub(&mut self) {
        let candidates: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind == LabelKind::CodeLbl)
            .map(|(&a, _)| a)
            .collect();
        for start in candidates {
            let fixed = match self.labels.get(start) {
                Some(l) if l.kind == LabelKind::CodeLbl && !l.is_equ => l.is_fixed,
                _ => continue,
            };
            if fixed || self.body_reaches_return(start) {
                if let Some(label) = self.labels.get_mut(start) {
                    label.kind = LabelKind::CodeSub;
                }
            }
        }
    }

    /// Forward walk over linear flow plus non-call branches, looking
    /// for any `RET`-family mnemonic. Reaching an address already
    /// classified as a subroutine short-circuits with success.
    fn body_reaches_return(&self, start: u16) -> bool {
        let mut visited = Visited::new();
        let mut stack = vec![start];
        while let Some(addr) = stack.pop() {
            if !visited.insert(addr) {
                continue;
            }
            if addr != start {
                if let Some(label) = self.labels.get(addr) {
                    if label.kind == LabelKind::CodeSub || label.kind == LabelKind::CodeRst {
                        return true;
                    }
                }
            }
            if !self.memory.attr(addr).contains(MemAttr::CODE_FIRST) {
                continue;
            }
            let inst = decode_instruction(&self.memory, addr);
            if inst.is_return() {
                return true;
            }
            if inst.is_branch() && !inst.is_call() {
                stack.push(inst.value);
            }
            if !inst.is_stop() {
                stack.push(inst.next_address());
            }
        }
        false
    }

    /// Pass 8: labels reachable from a top-level label whose referrers
    /// all lie inside that reachable set are demoted to local scope.
    /// A referrer at most 128 bytes after the label marks a loop head.
    pub(crate) fn find_local_labels_in_subroutines(&mut self) {
        let tops: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind.is_top_code() && !l.is_equ)
            .map(|(&a, _)| a)
            .collect();
        for start in tops {
            match self.labels.get(start) {
                Some(l) if l.kind.is_top_code() => {}
                _ => continue,
            }
            let body = self.reachable_set(start);
            for &addr in &body {
                if addr == start {
                    continue;
                }
                let Some(label) = self.labels.get(addr) else {
                    continue;
                };
                if label.is_fixed
                    || !(label.kind == LabelKind::CodeLbl || label.kind == LabelKind::CodeSub)
                {
                    continue;
                }
                if label.referrers.is_empty()
                    || !label.referrers.iter().all(|r| body.contains(r))
                {
                    continue;
                }
                let is_loop = label
                    .referrers
                    .iter()
                    .any(|&r| r >= addr && r.wrapping_sub(addr) <= 128);
                if let Some(label) = self.labels.get_mut(addr) {
                    label.kind = if is_loop {
                        LabelKind::CodeLocalLoop
                    } else {
                        LabelKind::CodeLocalLbl
                    };
                }
            }
        }
    }

    /// Instruction addresses reachable from `start` via linear flow and
    /// non-call branches. The walk crosses other labels (including
    /// subroutine heads) and stops only at stop instructions, unassigned
    /// or undecoded bytes, and already-visited addresses.
    fn reachable_set(&self, start: u16) -> BTreeSet<u16> {
        let mut set = BTreeSet::new();
        let mut visited = Visited::new();
        let mut stack = vec![start];
        while let Some(addr) = stack.pop() {
            if !visited.insert(addr) {
                continue;
            }
            let attr = self.memory.attr(addr);
            if !attr.contains(MemAttr::CODE_FIRST) || !attr.contains(MemAttr::ASSIGNED) {
                continue;
            }
            set.insert(addr);
            let inst = decode_instruction(&self.memory, addr);
            if inst.is_branch() && !inst.is_call() {
                stack.push(inst.value);
            }
            if !inst.is_stop() {
                stack.push(inst.next_address());
            }
        }
        set
    }

    /// Pass 9: assign every instruction byte to its owning top-level
    /// label, then drop referrers that resolve to the same parent
    /// (intra-label flow is not a cross-reference) — except calls, so
    /// self-recursion survives into the call graph. Warn about
    /// subroutines whose remaining callers all lie inside themselves.
    pub(crate) fn add_parent_references(&mut self) {
        self.parents = vec![None; MEMORY_SIZE];
        let tops: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind.is_top_code() && !l.is_equ)
            .map(|(&a, _)| a)
            .collect();

        for &start in &tops {
            let mut visited = Visited::new();
            let mut stack = vec![start];
            while let Some(addr) = stack.pop() {
                if !visited.insert(addr) {
                    continue;
                }
                if !self.memory.attr(addr).contains(MemAttr::CODE_FIRST) {
                    continue;
                }
                if addr != start {
                    if let Some(label) = self.labels.get(addr) {
                        // Another top-level label owns its own body;
                        // locals do not break the walk.
                        if label.kind.is_top_code() {
                            continue;
                        }
                    }
                }
                let inst = decode_instruction(&self.memory, addr);
                for i in 0..inst.length as u16 {
                    self.parents[addr.wrapping_add(i) as usize] = Some(start);
                }
                if inst.is_branch() && !inst.is_call() {
                    stack.push(inst.value);
                }
                if !inst.is_stop() {
                    stack.push(inst.next_address());
                }
            }
        }

        // Delete same-parent referrers, sparing calls.
        let addrs = self.labels.addresses();
        for addr in addrs {
            let own_parent = self.parents[addr as usize];
            let referrers: Vec<u16> = self
                .labels
                .get(addr)
                .map(|l| l.referrers.iter().copied().collect())
                .unwrap_or_default();
            for r in referrers {
                let same_parent = own_parent.is_some() && self.parents[r as usize] == own_parent;
                if !same_parent {
                    continue;
                }
                let keeps = self.memory.attr(r).contains(MemAttr::CODE_FIRST)
                    && decode_instruction(&self.memory, r).is_call();
                if !keeps {
                    if let Some(label) = self.labels.get_mut(addr) {
                        label.referrers.remove(&r);
                    }
                }
            }
        }

        // Warn about subroutines that only call themselves.
        let mut warned = Vec::new();
        for (&addr, label) in self.labels.iter() {
            if !(label.kind == LabelKind::CodeSub || label.kind == LabelKind::CodeRst) {
                continue;
            }
            if label.referrers.is_empty() {
                continue;
            }
            if label
                .referrers
                .iter()
                .all(|&r| self.parents[r as usize] == Some(addr))
            {
                warned.push(addr);
            }
        }
        for addr in warned {
            self.self_referencing.insert(addr);
            self.warn(Warning::SelfCallingSubroutine { address: addr });
        }
    }
}
