/// End-to-end pipeline tests over small hand-assembled images.

use disz80::{
    generate_listing, Disassembler, Error, LabelKind, ListingOptions, Warning,
};

fn analyzed(origin: u16, bytes: &[u8], entry: u16) -> Disassembler {
    let mut dis = Disassembler::new();
    dis.load_bin(origin, bytes);
    dis.set_code_label(entry, None);
    dis.analyze().unwrap();
    dis
}

// ─── Scenario: single RET subroutine ─────────────────────────────────

#[test]
fn single_ret_subroutine() {
    let dis = analyzed(0x0000, &[0x3E, 0x05, 0xC9], 0x0000); // LD A,5 ; RET
    let label = dis.labels.get(0x0000).unwrap();
    assert_eq!(label.kind, LabelKind::CodeSub);
    assert_eq!(label.name.as_deref(), Some("SUB1"));

    let stats = dis.statistics()[&0x0000];
    assert_eq!(stats.size_in_bytes, 3);
    assert_eq!(stats.count_of_instructions, 2);
    assert_eq!(stats.cyclomatic_complexity, 1);
}

// ─── Scenario: conditional branch raises complexity ──────────────────

#[test]
fn djnz_loop_raises_complexity() {
    let dis = analyzed(0x0000, &[0x06, 0x03, 0x10, 0xFE], 0x0000); // LD B,3 ; DJNZ -2
    let entry = dis.labels.get(0x0000).unwrap();
    assert_eq!(entry.kind, LabelKind::CodeSub);
    assert_eq!(entry.name.as_deref(), Some("SUB1"));

    let stats = dis.statistics()[&0x0000];
    assert_eq!(stats.cyclomatic_complexity, 2);

    let head = dis.labels.get(0x0002).unwrap();
    assert_eq!(head.kind, LabelKind::CodeLocalLoop);
    assert_eq!(head.name.as_deref(), Some(".sub1_loop"));
}

// ─── Scenario: LBL becomes SUB via JP ────────────────────────────────

#[test]
fn jump_target_promotes_through_ret() {
    // JP 0x0005 ; (two data bytes) ; RET
    let dis = analyzed(0x0000, &[0xC3, 0x05, 0x00, 0x00, 0x00, 0xC9], 0x0000);
    let entry = dis.labels.get(0x0000).unwrap();
    assert_eq!(entry.kind, LabelKind::CodeSub);

    // The jump target was promoted to a subroutine by the reachable
    // RET, then scoped local: its only referrer is the jump inside the
    // entry's body.
    let target = dis.labels.get(0x0005).unwrap();
    assert_eq!(target.kind, LabelKind::CodeLocalLbl);
    assert_eq!(target.name.as_deref(), Some(".sub1_l"));

    // The data gap was never decoded.
    assert!(dis.labels.get(0x0003).is_none());
}

// ─── Scenario: self-modifying data access ────────────────────────────

#[test]
fn self_modifying_access_moves_to_opcode_start() {
    // LD A,(0x1001) ; NOP ; LD A,7 ; RET — the data pointer hits the
    // immediate byte of the load at 0x1000.
    let mut dis = Disassembler::new();
    dis.load_bin(0x0FFC, &[0x3A, 0x01, 0x10, 0x00, 0x3E, 0x07, 0xC9]);
    dis.set_code_label(0x0FFC, None);
    dis.analyze().unwrap();

    // The label moved from 0x1001 to the instruction start.
    assert!(dis.labels.get(0x1001).is_none());
    let moved = dis.labels.get(0x1000).unwrap();
    assert_eq!(moved.kind, LabelKind::DataLbl);
    assert_eq!(moved.name.as_deref(), Some("SELF_MOD1"));
    // The accessor sits in the same subroutine, so the parent pass
    // cleaned the reference away.
    assert!(moved.referrers.is_empty());

    assert_eq!(dis.labels.offset(0x1001), Some(-1));

    let listing = generate_listing(&mut dis, &ListingOptions::default()).join("\n");
    assert!(listing.contains("ld    a,(SELF_MOD1+1)"), "{listing}");
}

// ─── Scenario: ambiguous overlap aborts ──────────────────────────────

#[test]
fn overlapping_decodes_abort_in_either_order() {
    for entries in [[0x0000u16, 0x0001], [0x0001, 0x0000]] {
        let mut dis = Disassembler::new();
        dis.load_bin(0x0000, &[0x3E, 0x3E, 0xC9]);
        for e in entries {
            dis.set_code_label(e, None);
        }
        let err = dis.analyze().unwrap_err();
        match err {
            Error::AmbiguousDecode {
                existing_mnemonic,
                new_mnemonic,
                existing_address,
                new_address,
            } => {
                assert_eq!(existing_mnemonic, "LD A,#n");
                assert_eq!(new_mnemonic, "LD A,#n");
                assert_ne!(existing_address, new_address);
            }
            other => panic!("expected ambiguity, got {other:?}"),
        }
    }
}

// ─── Scenario: interrupt discovery via trace ─────────────────────────

#[test]
fn trace_entries_become_interrupt_labels() {
    let mut dis = Disassembler::new();
    dis.load_bin(0x0038, &[0xC9]); // RET
    dis.load_bin(0x0100, &[0x3E, 0x01, 0xC9]); // LD A,1 ; RET
    dis.load_trace("0100: ld a,01h\n0038: ret\n0100: ld a,01h\n");
    dis.analyze().unwrap();

    let isr = dis.labels.get(0x0038).unwrap();
    assert!(isr.belongs_to_interrupt);
    assert_eq!(isr.name.as_deref(), Some("INTRPT1"));

    let second = dis.labels.get(0x0100).unwrap();
    assert!(second.belongs_to_interrupt);
    assert_eq!(second.name.as_deref(), Some("INTRPT2"));

    // No label in the middle of either handler.
    assert!(dis.labels.get(0x0102).is_none());
}

// ─── RST handling ────────────────────────────────────────────────────

#[test]
fn rst_creates_page_zero_label() {
    let mut dis = Disassembler::new();
    dis.load_bin(0x0008, &[0xC9]); // RST 08h handler
    dis.load_bin(0x8000, &[0xCF, 0xC9]); // RST 08h ; RET
    dis.set_code_label(0x8000, None);
    dis.analyze().unwrap();

    let rst = dis.labels.get(0x0008).unwrap();
    assert_eq!(rst.kind, LabelKind::CodeRst);
    assert_eq!(rst.name.as_deref(), Some("RST08"));
    assert!(rst.referrers.contains(&0x8000));
}

// ─── Jump tables ─────────────────────────────────────────────────────

#[test]
fn jump_table_entries_are_fixed_labels() {
    let mut dis = Disassembler::new();
    // Table at 0x9000: 0x8000, 0x8001. Handlers: RET, RET.
    dis.load_bin(0x8000, &[0xC9, 0xC9]);
    dis.load_bin(0x9000, &[0x00, 0x80, 0x01, 0x80]);
    dis.set_jmp_table(0x9000, 2);
    dis.analyze().unwrap();

    for addr in [0x8000u16, 0x8001] {
        let label = dis.labels.get(addr).unwrap();
        assert!(label.is_fixed);
        assert_eq!(label.kind, LabelKind::CodeSub);
    }
    assert_eq!(
        dis.labels.get(0x8000).unwrap().name.as_deref(),
        Some("SUB1")
    );
    assert_eq!(
        dis.labels.get(0x8001).unwrap().name.as_deref(),
        Some("SUB2")
    );
}

// ─── Snapshot input ──────────────────────────────────────────────────

#[test]
fn sna_start_is_recovered_and_labelled() {
    let mut data = vec![0u8; 27 + 0xC000];
    // SP = 0xFF00; the pushed start address is 0x8000.
    data[23] = 0x00;
    data[24] = 0xFF;
    let sp_index = 27 + (0xFF00 - 0x4000);
    data[sp_index] = 0x00; // low byte at SP
    data[sp_index - 1] = 0x80; // high byte at SP-1
    // RET at 0x8000.
    data[27 + (0x8000 - 0x4000)] = 0xC9;

    let mut dis = Disassembler::new();
    dis.load_sna(&data).unwrap();
    dis.analyze().unwrap();

    assert_eq!(dis.sna_start(), Some(0x8000));
    let label = dis.labels.get(0x8000).unwrap();
    assert_eq!(label.name.as_deref(), Some("SNA_LBL_MAIN_START_8000"));
    assert!(label.is_fixed);
    // The image start got its transition label.
    assert_eq!(
        dis.labels.get(0x4000).unwrap().name.as_deref(),
        Some("BIN_START_4000")
    );
}

// ─── Flow off the image edge ─────────────────────────────────────────

#[test]
fn branch_arithmetic_wraps_at_top_of_memory() {
    let mut dis = Disassembler::new();
    dis.load_bin(0xFFFE, &[0x18, 0x00]); // JR +0 → wraps to 0x0000
    dis.load_bin(0x0000, &[0xC9]);
    dis.set_code_label(0xFFFE, None);
    dis.analyze().unwrap();

    assert!(dis.labels.contains(0x0000));
    let stats = dis.statistics();
    assert!(stats.contains_key(&0xFFFE));
}

#[test]
fn running_into_unassigned_memory_warns() {
    let mut dis = Disassembler::new();
    dis.load_bin(0x8000, &[0x00, 0x00]); // NOPs, then nothing
    dis.set_code_label(0x8000, None);
    dis.analyze().unwrap();
    assert_eq!(
        dis.warnings(),
        &[Warning::UnassignedAddress { address: 0x8002 }]
    );
}

// ─── Self-recursion ──────────────────────────────────────────────────

#[test]
fn self_calling_subroutine_is_warned() {
    let mut dis = Disassembler::new();
    dis.load_bin(
        0x8000,
        &[
            0xC9, // RET (entry)
            0x3E, 0x01, // LD A,1       <- SUB2, called only from below
            0xCD, 0x01, 0x80, // CALL 0x8001
            0xC9, // RET
        ],
    );
    dis.set_code_label(0x8000, None);
    dis.set_code_label(0x8001, None);
    dis.analyze().unwrap();

    assert!(dis
        .warnings()
        .iter()
        .any(|w| matches!(w, Warning::SelfCallingSubroutine { address: 0x8001 })));
    assert!(dis.self_referencing().contains(&0x8001));
    // The recursive call edge survives for the call graph.
    let label = dis.labels.get(0x8001).unwrap();
    assert!(label.referrers.contains(&0x8003));
}
