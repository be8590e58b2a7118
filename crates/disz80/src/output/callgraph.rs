//! DOT call-graph export.
//!
//! One node per top-level code label. Node font size scales linearly
//! with cyclomatic complexity across the observed range; EQU labels are
//! shown grey with the minimal font. Entry/orphan nodes (no referrers)
//! are tinted lightyellow, subroutines that only call themselves
//! lightblue.

use std::collections::BTreeSet;

use crate::disasm::Disassembler;
use crate::labels::LabelKind;

const MIN_FONT_SIZE: f64 = 13.0;
const MAX_FONT_SIZE: f64 = 40.0;

/// Render the call graph as a DOT `digraph`.
pub fn generate_call_graph(dis: &Disassembler) -> String {
    let mut out = String::from("digraph Callgraph {\n");

    let min_cc = dis.statistics_min().cyclomatic_complexity;
    let max_cc = dis.statistics_max().cyclomatic_complexity;

    let mut no_referrers = Vec::new();
    let mut referenced_lbls = Vec::new();

    for (&addr, label) in dis.labels.iter() {
        if !label.kind.is_top_code() {
            continue;
        }
        let Some(name) = &label.name else { continue };

        if label.is_equ {
            out.push_str(&format!(
                "    \"{name}\" [fontsize=\"{MIN_FONT_SIZE}\", color=grey, fontcolor=grey];\n"
            ));
        } else {
            let stats = dis.statistics().get(&addr).copied().unwrap_or_default();
            let cc = stats.cyclomatic_complexity;
            let font_size = if max_cc > min_cc {
                MIN_FONT_SIZE
                    + (cc - min_cc) as f64 * (MAX_FONT_SIZE - MIN_FONT_SIZE)
                        / (max_cc - min_cc) as f64
            } else {
                MIN_FONT_SIZE
            };
            let mut attrs = format!(
                "fontsize=\"{font_size:.1}\", label=\"{name}\\nSize={}\\nCC={}\"",
                stats.size_in_bytes, cc
            );
            if dis.self_referencing().contains(&addr) {
                attrs.push_str(", style=filled, fillcolor=lightblue");
            } else if label.referrers.is_empty() {
                attrs.push_str(", style=filled, fillcolor=lightyellow");
            }
            out.push_str(&format!("    \"{name}\" [{attrs}];\n"));
        }

        if label.referrers.is_empty() {
            no_referrers.push(name.clone());
        } else if label.kind == LabelKind::CodeLbl {
            referenced_lbls.push(name.clone());
        }

        let mut emitted = BTreeSet::new();
        for &callee in &label.callees {
            if !emitted.insert(callee) {
                continue;
            }
            if let Some(callee_name) = dis.labels.get(callee).and_then(|l| l.name.as_ref()) {
                out.push_str(&format!("    \"{name}\" -> \"{callee_name}\";\n"));
            }
        }
    }

    if !no_referrers.is_empty() {
        out.push_str(&rank_row(&no_referrers));
    }
    if !referenced_lbls.is_empty() {
        out.push_str(&rank_row(&referenced_lbls));
    }

    out.push_str("}\n");
    out
}

fn rank_row(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|n| format!("\"{n}\";")).collect();
    format!("    {{ rank=same; {} }}\n", quoted.join(" "))
}
