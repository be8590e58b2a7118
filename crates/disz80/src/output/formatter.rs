//! Single-instruction rendering: sentinel substitution, label lookup
//! and number formatting.

use crate::labels::{LabelKind, LabelStore};
use crate::memory::Memory;
use crate::z80::{Immediate, Instruction};

/// Borrow of the label store handed down into rendering, so immediate
/// values can be shown as label names (including offset labels with
/// their `+N`/`-N` suffixes).
pub struct RenderContext<'a> {
    labels: &'a LabelStore,
}

impl<'a> RenderContext<'a> {
    pub fn new(labels: &'a LabelStore) -> Self {
        RenderContext { labels }
    }

    fn lookup(&self, value: u16) -> Option<String> {
        self.labels.resolve_name(value)
    }
}

/// Render a decoded instruction's mnemonic, substituting immediates.
///
/// Lower-casing is applied to the template before substitution so label
/// names keep their case.
pub fn format_mnemonic(inst: &Instruction, ctx: &RenderContext<'_>, lowercase: bool) -> String {
    let template = if lowercase {
        inst.template.to_lowercase()
    } else {
        inst.template.clone()
    };

    let bytes = template.as_bytes();
    let mut out = String::with_capacity(template.len() + 8);
    let mut immediates = inst.immediates.iter();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'#' {
            let wide = bytes.get(i + 1) == Some(&b'n') && bytes.get(i + 2) == Some(&b'n');
            i += if wide { 3 } else { 2 };
            match immediates.next() {
                Some(Immediate::Word(w)) => out.push_str(&word_text(*w, inst, ctx)),
                Some(Immediate::Target(t)) => {
                    out.push_str(&ctx.lookup(*t).unwrap_or_else(|| hex_word_text(*t)))
                }
                Some(Immediate::Byte(b)) => out.push_str(&hex_byte_text(*b)),
                Some(Immediate::Index(d)) => out.push_str(&format!("{d:+}")),
                None => {}
            }
            continue;
        }
        out.push(bytes[i] as char);
        i += 1;
    }
    out
}

/// A word immediate is shown as a label only when it denotes an
/// address: branch targets and data references. A constant that merely
/// happens to collide with a label address stays numeric.
fn word_text(w: u16, inst: &Instruction, ctx: &RenderContext<'_>) -> String {
    let address_like = matches!(
        inst.value_kind,
        LabelKind::CodeLbl | LabelKind::CodeSub | LabelKind::DataLbl
    );
    if address_like && w == inst.value {
        if let Some(name) = ctx.lookup(w) {
            return name;
        }
    }
    hex_word_text(w)
}

/// Classic assembler hex spelling: a trailing `h`, with a leading zero
/// when the first digit is a letter.
pub fn hex_byte_text(b: u8) -> String {
    pad_hex(format!("{b:02X}h"))
}

pub fn hex_word_text(w: u16) -> String {
    pad_hex(format!("{w:04X}h"))
}

fn pad_hex(s: String) -> String {
    if s.as_bytes()[0].is_ascii_alphabetic() {
        format!("0{s}")
    } else {
        s
    }
}

/// Hex pairs of an instruction's raw bytes, e.g. `"3E 05"`.
pub fn format_bytes(mem: &Memory, addr: u16, len: u8) -> String {
    let mut out = String::with_capacity(len as usize * 3);
    for i in 0..len as u16 {
        if i > 0 {
            out.push(' ');
        }
        out.push_str(&format!("{:02X}", mem.read_byte(addr.wrapping_add(i))));
    }
    out
}
