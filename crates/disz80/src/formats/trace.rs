//! MAME trace (.tr) reader.
//!
//! A trace is an ASCII log whose interesting lines begin with a
//! five-character field: four hex digits followed by `:` — the address
//! of an executed instruction. Everything else on the line is ignored.

/// Extract the executed addresses from a trace file.
///
/// Returns the deduplicated set in ascending order, ready to seed the
/// disassembly queue.
pub fn parse_trace(text: &str) -> Vec<u16> {
    let mut addresses: Vec<u16> = text
        .lines()
        .filter_map(parse_line_address)
        .collect();
    addresses.sort_unstable();
    addresses.dedup();
    addresses
}

fn parse_line_address(line: &str) -> Option<u16> {
    let bytes = line.as_bytes();
    if bytes.len() < 5 || bytes[4] != b':' {
        return None;
    }
    if !bytes[..4].iter().all(|b| b.is_ascii_hexdigit()) {
        return None;
    }
    u16::from_str_radix(&line[..4], 16).ok()
}
