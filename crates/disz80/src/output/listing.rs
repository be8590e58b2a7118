//! Assembly-listing generation.
//!
//! The listing opens with an `EQU` preamble for labels outside the
//! loaded image, then walks the address space: an `ORG` directive at
//! every transition into assigned memory, label lines with optional
//! reference comments, four-column instruction lines, and `DEFB` lines
//! for assigned bytes that were never decoded (which are marked `DATA`
//! as they are emitted).

use crate::disasm::Disassembler;
use crate::labels::{Label, LabelKind};
use crate::memory::{MemAttr, MEMORY_SIZE};
use crate::z80::decode_instruction;

use super::formatter::{format_bytes, format_mnemonic, hex_byte_text, RenderContext};

/// Options controlling the listing output.
#[derive(Debug, Clone)]
pub struct ListingOptions {
    /// Render mnemonics and directives in lowercase.
    pub opcodes_lower_case: bool,
    /// Blank lines between code blocks.
    pub number_of_lines_between_blocks: usize,
    pub add_references_to_subroutines: bool,
    pub add_references_to_absolute_labels: bool,
    pub add_references_to_rst_labels: bool,
    pub add_references_to_data_labels: bool,
    /// Include the raw-byte column.
    pub add_opcode_bytes: bool,
    /// Column widths, in characters (the bytes column is counted in
    /// byte slots of three characters each).
    pub clmns_address: usize,
    pub clmns_bytes: usize,
    pub clmns_opcode_first_part: usize,
    pub clmns_opcode_total: usize,
}

impl Default for ListingOptions {
    fn default() -> Self {
        ListingOptions {
            opcodes_lower_case: true,
            number_of_lines_between_blocks: 2,
            add_references_to_subroutines: true,
            add_references_to_absolute_labels: true,
            add_references_to_rst_labels: true,
            add_references_to_data_labels: true,
            add_opcode_bytes: true,
            clmns_address: 5,
            clmns_bytes: 4,
            clmns_opcode_first_part: 5,
            clmns_opcode_total: 16,
        }
    }
}

/// Generate the complete listing.
///
/// Takes the disassembler mutably: bytes emitted as `DEFB` are marked
/// with the `DATA` attribute.
pub fn generate_listing(dis: &mut Disassembler, options: &ListingOptions) -> Vec<String> {
    let mut lines = Vec::new();

    emit_equ_preamble(dis, options, &mut lines);

    let mut addr: u32 = 0;
    let mut in_block = false;
    let mut first_block = true;
    while addr < MEMORY_SIZE as u32 {
        let a = addr as u16;
        if !dis.memory.is_assigned(a) {
            in_block = false;
            addr += 1;
            continue;
        }

        if !in_block {
            if !first_block {
                for _ in 0..options.number_of_lines_between_blocks {
                    lines.push(String::new());
                }
            }
            first_block = false;
            in_block = true;
            lines.push(org_line(a, options));
        }

        if let Some(label) = dis.labels.get(a) {
            if !label.is_equ {
                lines.push(label_line(dis, label, options));
            }
        }

        if dis.memory.attr(a).contains(MemAttr::CODE_FIRST) {
            let inst = decode_instruction(&dis.memory, a);
            let text = format_mnemonic(
                &inst,
                &RenderContext::new(&dis.labels),
                options.opcodes_lower_case,
            );
            let bytes = format_bytes(&dis.memory, a, inst.length);
            lines.push(code_line(a, &bytes, &text, None, options));
            addr += inst.length as u32;
        } else {
            // Assigned but never decoded: data.
            dis.memory.or_attr(a, 1, MemAttr::DATA);
            let byte = dis.memory.read_byte(a);
            let directive = directive_case("DEFB", options);
            let text = format!("{directive} {}", hex_byte_text(byte));
            let comment = byte_conversion_comment(byte);
            lines.push(code_line(
                a,
                &format!("{byte:02X}"),
                &text,
                Some(&comment),
                options,
            ));
            addr += 1;
        }
    }

    lines
}

fn emit_equ_preamble(dis: &Disassembler, options: &ListingOptions, lines: &mut Vec<String>) {
    let mut any = false;
    for (&addr, label) in dis.labels.iter() {
        if !label.is_equ {
            continue;
        }
        let Some(name) = &label.name else { continue };
        let directive = directive_case("EQU", options);
        let mut line = format!("{name}: {directive} {addr} ; {addr:04X}h.");
        if let Some(refs) = reference_comment(dis, label, options) {
            line.push(' ');
            line.push_str(&refs);
        }
        lines.push(line);
        any = true;
    }
    if any {
        lines.push(String::new());
    }
}

fn org_line(addr: u16, options: &ListingOptions) -> String {
    let directive = directive_case("ORG", options);
    let indent = " ".repeat(options.clmns_address + if options.add_opcode_bytes {
        options.clmns_bytes * 3
    } else {
        0
    });
    format!("{indent}{directive} {addr} ; {addr:04X}h")
}

fn label_line(dis: &Disassembler, label: &Label, options: &ListingOptions) -> String {
    let name = label.name.as_deref().unwrap_or("");
    let mut line = format!("{name}:");
    if let Some(refs) = reference_comment(dis, label, options) {
        line.push_str(" ; ");
        line.push_str(&refs);
    }
    line
}

/// Caller list for a label, as `parent[addr]` entries, gated by the
/// per-kind reference options.
fn reference_comment(
    dis: &Disassembler,
    label: &Label,
    options: &ListingOptions,
) -> Option<String> {
    let enabled = match label.kind {
        LabelKind::CodeSub => options.add_references_to_subroutines,
        LabelKind::CodeLbl | LabelKind::CodeLocalLbl | LabelKind::CodeLocalLoop => {
            options.add_references_to_absolute_labels
        }
        LabelKind::CodeRst => options.add_references_to_rst_labels,
        _ => options.add_references_to_data_labels,
    };
    if !enabled || label.referrers.is_empty() {
        return None;
    }
    let callers: Vec<String> = label
        .referrers
        .iter()
        .map(|&r| match dis.parent(r).and_then(|p| dis.labels.get(p)) {
            Some(parent) => match &parent.name {
                Some(name) => format!("{name}[{r:04X}h]"),
                None => format!("{r:04X}h"),
            },
            None => format!("{r:04X}h"),
        })
        .collect();
    Some(format!(
        "{} reference{}: {}",
        callers.len(),
        if callers.len() == 1 { "" } else { "s" },
        callers.join(", ")
    ))
}

fn code_line(
    addr: u16,
    bytes: &str,
    opcode: &str,
    comment: Option<&str>,
    options: &ListingOptions,
) -> String {
    let mut line = format!("{:<width$}", format!("{addr:04X}"), width = options.clmns_address);
    if options.add_opcode_bytes {
        line.push_str(&format!("{bytes:<width$}", width = options.clmns_bytes * 3));
    }
    line.push_str(&pad_opcode(opcode, options));
    if let Some(c) = comment {
        let pad = options.clmns_opcode_total.saturating_sub(opcode.len());
        line.push_str(&" ".repeat(pad.max(1)));
        line.push_str("; ");
        line.push_str(c);
    }
    line
}

/// Pad the mnemonic word so operands line up.
fn pad_opcode(text: &str, options: &ListingOptions) -> String {
    match text.split_once(' ') {
        Some((mnemonic, operands)) => format!(
            "{mnemonic:<width$} {operands}",
            width = options.clmns_opcode_first_part
        ),
        None => text.to_string(),
    }
}

fn directive_case(directive: &str, options: &ListingOptions) -> String {
    if options.opcodes_lower_case {
        directive.to_lowercase()
    } else {
        directive.to_string()
    }
}

fn byte_conversion_comment(byte: u8) -> String {
    if byte.is_ascii_graphic() || byte == b' ' {
        format!("{byte}, '{}'", byte as char)
    } else {
        format!("{byte}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_for(origin: u16, bytes: &[u8], entry: u16) -> Vec<String> {
        let mut dis = Disassembler::new();
        dis.load_bin(origin, bytes);
        dis.set_code_label(entry, None);
        dis.analyze().unwrap();
        generate_listing(&mut dis, &ListingOptions::default())
    }

    #[test]
    fn simple_subroutine_listing() {
        let lines = listing_for(0x8000, &[0x3E, 0x05, 0xC9], 0x8000);
        let text = lines.join("\n");
        assert!(text.contains("org 32768 ; 8000h"), "{text}");
        assert!(text.contains("SUB1:"), "{text}");
        assert!(text.contains("ld    a,05h"), "{text}");
        assert!(text.contains("ret"), "{text}");
    }

    #[test]
    fn data_bytes_render_as_defb_and_get_marked() {
        let mut dis = Disassembler::new();
        // RET followed by two data bytes.
        dis.load_bin(0x8000, &[0xC9, 0x41, 0x00]);
        dis.set_code_label(0x8000, None);
        dis.analyze().unwrap();
        let lines = generate_listing(&mut dis, &ListingOptions::default());
        let text = lines.join("\n");
        assert!(text.contains("defb 41h"), "{text}");
        assert!(text.contains("'A'"), "{text}");
        assert!(dis.memory.attr(0x8001).contains(MemAttr::DATA));
        assert!(!dis.memory.attr(0x8000).contains(MemAttr::DATA));
    }

    #[test]
    fn equ_preamble_for_out_of_image_targets() {
        let lines = listing_for(0x8000, &[0xC3, 0x00, 0x90], 0x8000);
        // JP 0x9000 with nothing loaded there. The jumper is SUB1; the
        // foreign target is SUB2 and renders as an EQU with its caller.
        let text = lines.join("\n");
        assert!(
            text.contains("SUB2: equ 36864 ; 9000h. 1 reference: SUB1[8000h]"),
            "{text}"
        );
    }

    #[test]
    fn blocks_are_separated_by_blank_lines() {
        let mut dis = Disassembler::new();
        dis.load_bin(0x8000, &[0xC9]);
        dis.load_bin(0x9000, &[0xC9]);
        dis.set_code_label(0x8000, None);
        dis.set_code_label(0x9000, None);
        dis.analyze().unwrap();
        let lines = generate_listing(&mut dis, &ListingOptions::default());
        let orgs: Vec<usize> = lines
            .iter()
            .enumerate()
            .filter(|(_, l)| l.contains("org "))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(orgs.len(), 2);
        // Two blank lines precede the second block.
        assert_eq!(lines[orgs[1] - 1], "");
        assert_eq!(lines[orgs[1] - 2], "");
    }
}
