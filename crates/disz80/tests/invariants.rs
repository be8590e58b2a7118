/// Structural invariants that must hold after a full analysis, plus
/// determinism of the generated outputs.

use disz80::{
    decode_instruction, generate_call_graph, generate_listing, Disassembler, LabelKind,
    ListingOptions, MemAttr,
};

/// A small but varied program: nested calls, a conditional loop, a
/// data access, an RST and a stretch of data bytes.
fn sample() -> Disassembler {
    let mut dis = Disassembler::new();
    dis.load_bin(0x0008, &[0xC9]); // RST 08h handler
    dis.load_bin(
        0x8000,
        &[
            0x06, 0x04, // 8000 LD B,4
            0xCD, 0x10, 0x80, // 8002 CALL 0x8010
            0x10, 0xFB, // 8005 DJNZ 0x8002
            0xCF, // 8007 RST 08h
            0xC9, // 8008 RET
        ],
    );
    dis.load_bin(
        0x8010,
        &[
            0x3A, 0x20, 0x80, // 8010 LD A,(0x8020)
            0xC8, // 8013 RET Z
            0x3C, // 8014 INC A
            0x32, 0x20, 0x80, // 8015 LD (0x8020),A
            0xC9, // 8018 RET
        ],
    );
    dis.load_bin(0x8020, &[0x2A, 0x00]); // data
    dis.set_code_label(0x8000, None);
    dis.analyze().unwrap();
    dis
}

#[test]
fn every_code_byte_is_covered_by_one_instruction() {
    let dis = sample();
    for addr in 0..0x10000u32 {
        let addr = addr as u16;
        if !dis.memory.attr(addr).contains(MemAttr::CODE) {
            continue;
        }
        // Find the covering instruction start within the maximum
        // instruction length.
        let mut covers = 0;
        for back in 0..4u16 {
            let first = addr.wrapping_sub(back);
            if dis.memory.attr(first).contains(MemAttr::CODE_FIRST) {
                let inst = decode_instruction(&dis.memory, first);
                if back < inst.length as u16 {
                    covers += 1;
                }
                break;
            }
        }
        assert_eq!(covers, 1, "no unique covering instruction for {addr:04X}");
    }
}

#[test]
fn code_first_implies_code() {
    let dis = sample();
    for addr in 0..0x10000u32 {
        let attr = dis.memory.attr(addr as u16);
        if attr.contains(MemAttr::CODE_FIRST) {
            assert!(attr.contains(MemAttr::CODE));
        }
    }
}

#[test]
fn no_label_refers_to_itself() {
    let dis = sample();
    for (&addr, label) in dis.labels.iter() {
        assert!(
            !label.referrers.contains(&addr),
            "label {addr:04X} refers to itself"
        );
    }
}

#[test]
fn local_labels_have_parents() {
    let dis = sample();
    for (&addr, label) in dis.labels.iter() {
        if label.kind.is_local() {
            assert!(
                dis.parent(addr).is_some(),
                "local label {addr:04X} has no parent"
            );
        }
    }
}

#[test]
fn complexity_is_at_least_one() {
    let dis = sample();
    assert!(!dis.statistics().is_empty());
    for (addr, stats) in dis.statistics() {
        assert!(
            stats.cyclomatic_complexity >= 1,
            "label {addr:04X} has CC 0"
        );
        assert!(stats.size_in_bytes >= 1);
        assert!(stats.count_of_instructions >= 1);
    }
    assert!(
        dis.statistics_min().cyclomatic_complexity
            <= dis.statistics_max().cyclomatic_complexity
    );
}

#[test]
fn assigned_names_are_unique() {
    let dis = sample();
    let mut seen = std::collections::BTreeSet::new();
    for (&addr, label) in dis.labels.iter() {
        let Some(name) = &label.name else {
            panic!("label {addr:04X} was never named");
        };
        assert!(seen.insert(name.clone()), "duplicate name {name}");
    }
}

#[test]
fn sample_classifications() {
    let dis = sample();
    assert_eq!(dis.labels.get(0x8000).unwrap().kind, LabelKind::CodeSub);
    assert_eq!(dis.labels.get(0x8010).unwrap().kind, LabelKind::CodeSub);
    assert_eq!(dis.labels.get(0x0008).unwrap().kind, LabelKind::CodeRst);
    assert_eq!(dis.labels.get(0x8020).unwrap().kind, LabelKind::DataLbl);
    // The DJNZ back edge is a local loop inside the entry.
    assert_eq!(
        dis.labels.get(0x8002).unwrap().kind,
        LabelKind::CodeLocalLoop
    );
    assert_eq!(
        dis.labels.get(0x8002).unwrap().name.as_deref(),
        Some(".sub1_loop")
    );
    // RET Z adds a decision point: LD/CALL/DJNZ loop body plus the
    // conditional return in the callee are separate bodies.
    let callee = dis.statistics()[&0x8010];
    assert_eq!(callee.cyclomatic_complexity, 2);
    let entry = dis.statistics()[&0x8000];
    assert_eq!(entry.cyclomatic_complexity, 2);
}

#[test]
fn analysis_is_deterministic() {
    let render = || {
        let mut dis = sample();
        let listing = generate_listing(&mut dis, &ListingOptions::default()).join("\n");
        let graph = generate_call_graph(&dis);
        (listing, graph)
    };
    let (listing_a, graph_a) = render();
    let (listing_b, graph_b) = render();
    assert_eq!(listing_a, listing_b);
    assert_eq!(graph_a, graph_b);
}

#[test]
fn relative_branch_window_distinguishes_loop_from_local() {
    // A forward JR inside a subroutine: local label, not a loop.
    let mut dis = Disassembler::new();
    dis.load_bin(
        0x8000,
        &[
            0x28, 0x01, // 8000 JR Z,0x8003
            0x3C, // 8002 INC A
            0xC9, // 8003 RET
        ],
    );
    dis.set_code_label(0x8000, None);
    dis.analyze().unwrap();
    let label = dis.labels.get(0x8003).unwrap();
    assert_eq!(label.kind, LabelKind::CodeLocalLbl);
    assert_eq!(label.name.as_deref(), Some(".sub1_l"));
}
