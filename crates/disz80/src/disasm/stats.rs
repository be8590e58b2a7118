//! Callee-list construction and per-subroutine statistics.

use crate::labels::LabelKind;
use crate::memory::MemAttr;
use crate::z80::decode_instruction;

use super::{Disassembler, Visited};

/// Size, instruction count and cyclomatic complexity of one label's
/// body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SubroutineStatistics {
    pub size_in_bytes: u32,
    pub count_of_instructions: u32,
    /// 1 + conditional branches + conditional returns along the
    /// reachable flow.
    pub cyclomatic_complexity: u32,
}

impl Disassembler {
    /// Pass 10a: resolve each referrer through the parent map and
    /// append the referenced label to the referring parent's callee
    /// list. Duplicates are kept; the call graph deduplicates edges.
    pub(crate) fn add_calls_list_to_labels(&mut self) {
        let tops: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind.is_top_code())
            .map(|(&a, _)| a)
            .collect();
        for callee in tops {
            let referrers: Vec<u16> = self
                .labels
                .get(callee)
                .map(|l| l.referrers.iter().copied().collect())
                .unwrap_or_default();
            for r in referrers {
                if let Some(parent) = self.parents[r as usize] {
                    if let Some(label) = self.labels.get_mut(parent) {
                        label.callees.push(callee);
                    }
                }
            }
        }
    }

    /// Pass 10b: walk each non-EQU top-level label's body and count
    /// bytes, instructions and decision points. The walk follows linear
    /// flow and non-call branches, and stops when it enters another
    /// subroutine.
    pub(crate) fn count_statistics(&mut self) {
        let tops: Vec<u16> = self
            .labels
            .iter()
            .filter(|(_, l)| l.kind.is_top_code() && !l.is_equ)
            .map(|(&a, _)| a)
            .collect();

        for start in tops {
            let mut stats = SubroutineStatistics {
                cyclomatic_complexity: 1,
                ..SubroutineStatistics::default()
            };
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
                if addr != start {
                    if let Some(label) = self.labels.get(addr) {
                        if label.kind == LabelKind::CodeSub || label.kind == LabelKind::CodeRst {
                            continue;
                        }
                    }
                }
                let inst = decode_instruction(&self.memory, addr);
                stats.size_in_bytes += inst.length as u32;
                stats.count_of_instructions += 1;
                if inst.is_conditional_branch() {
                    stats.cyclomatic_complexity += 1;
                }
                if inst.is_conditional_return() {
                    stats.cyclomatic_complexity += 1;
                }
                if inst.is_branch() && !inst.is_call() {
                    stack.push(inst.value);
                }
                if !inst.is_stop() {
                    stack.push(inst.next_address());
                }
            }
            self.statistics.insert(start, stats);
        }

        self.update_aggregates();
    }

    fn update_aggregates(&mut self) {
        let mut iter = self.statistics.values();
        let Some(&first) = iter.next() else {
            self.statistics_min = SubroutineStatistics::default();
            self.statistics_max = SubroutineStatistics::default();
            return;
        };
        let mut min = first;
        let mut max = first;
        for s in iter {
            min.size_in_bytes = min.size_in_bytes.min(s.size_in_bytes);
            min.count_of_instructions = min.count_of_instructions.min(s.count_of_instructions);
            min.cyclomatic_complexity = min.cyclomatic_complexity.min(s.cyclomatic_complexity);
            max.size_in_bytes = max.size_in_bytes.max(s.size_in_bytes);
            max.count_of_instructions = max.count_of_instructions.max(s.count_of_instructions);
            max.cyclomatic_complexity = max.cyclomatic_complexity.max(s.cyclomatic_complexity);
        }
        self.statistics_min = min;
        self.statistics_max = max;
    }
}
