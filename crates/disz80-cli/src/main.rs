use clap::Parser;
use std::process;

/// Static Z80 disassembler
#[derive(Parser)]
#[command(name = "disz80", version, about)]
struct Cli {
    /// Load a raw binary: ORIGIN:PATH (origin decimal or 0x/h hex)
    #[arg(long = "bin", value_name = "ORIGIN:PATH")]
    bins: Vec<String>,

    /// Load a ZX Spectrum 48K snapshot
    #[arg(long)]
    sna: Option<String>,

    /// Load a MAME trace file with executed addresses
    #[arg(long)]
    tr: Option<String>,

    /// Entry point: ADDR or ADDR:NAME (repeatable)
    #[arg(long = "codelabel", value_name = "ADDR[:NAME]")]
    code_labels: Vec<String>,

    /// Jump table: ADDR:COUNT little-endian words, each a code label
    #[arg(long = "jmptable", value_name = "ADDR:COUNT")]
    jmp_tables: Vec<String>,

    /// Write the listing to a file instead of stdout
    #[arg(short, long)]
    out: Option<String>,

    /// Write a DOT call graph to this file
    #[arg(long)]
    callgraph: Option<String>,

    /// Use uppercase mnemonics (LD instead of ld)
    #[arg(long)]
    uppercase: bool,

    /// Blank lines between code blocks
    #[arg(long, default_value_t = 2)]
    block_gap: usize,

    /// Omit reference comments on labels
    #[arg(long)]
    no_references: bool,

    /// Hide the raw-byte column
    #[arg(long)]
    no_bytes: bool,

    /// Show additional log output
    #[arg(short, long)]
    verbose: bool,
}

fn main() {
    let cli = Cli::parse();

    let level = if cli.verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Warn
    };
    if let Err(e) = simple_logger::SimpleLogger::new().with_level(level).init() {
        eprintln!("Failed to initialise logging: {e}");
    }

    let mut dis = disz80::Disassembler::new();

    for spec in &cli.bins {
        let (origin, path) = match spec.split_once(':') {
            Some((origin, path)) => (parse_addr(origin), path),
            None => {
                eprintln!("--bin expects ORIGIN:PATH, got '{spec}'");
                process::exit(1);
            }
        };
        let Some(origin) = origin else {
            eprintln!("Bad origin in '{spec}'");
            process::exit(1);
        };
        let data = read_file(path);
        dis.load_bin(origin, &data);
    }

    if let Some(path) = &cli.sna {
        let data = read_file(path);
        if let Err(e) = dis.load_sna(&data) {
            eprintln!("Error reading '{path}': {e}");
            process::exit(1);
        }
    }

    if let Some(path) = &cli.tr {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) => {
                eprintln!("Error reading '{path}': {e}");
                process::exit(1);
            }
        };
        dis.load_trace(&text);
    }

    for spec in &cli.code_labels {
        let (addr, name) = match spec.split_once(':') {
            Some((addr, name)) => (parse_addr(addr), Some(name.to_string())),
            None => (parse_addr(spec), None),
        };
        let Some(addr) = addr else {
            eprintln!("Bad address in --codelabel '{spec}'");
            process::exit(1);
        };
        dis.set_code_label(addr, name);
    }

    for spec in &cli.jmp_tables {
        let parsed = spec
            .split_once(':')
            .and_then(|(a, c)| Some((parse_addr(a)?, c.parse::<u16>().ok()?)));
        let Some((addr, count)) = parsed else {
            eprintln!("--jmptable expects ADDR:COUNT, got '{spec}'");
            process::exit(1);
        };
        dis.set_jmp_table(addr, count);
    }

    if let Err(e) = dis.analyze() {
        eprintln!("Disassembly failed: {e}");
        process::exit(1);
    }

    let options = disz80::ListingOptions {
        opcodes_lower_case: !cli.uppercase,
        number_of_lines_between_blocks: cli.block_gap,
        add_references_to_subroutines: !cli.no_references,
        add_references_to_absolute_labels: !cli.no_references,
        add_references_to_rst_labels: !cli.no_references,
        add_references_to_data_labels: !cli.no_references,
        add_opcode_bytes: !cli.no_bytes,
        ..disz80::ListingOptions::default()
    };

    let listing = disz80::generate_listing(&mut dis, &options);
    let text: String = listing.iter().map(|l| format!("{l}\n")).collect();

    if let Some(path) = &cli.out {
        if let Err(e) = std::fs::write(path, &text) {
            eprintln!("Error writing '{path}': {e}");
            process::exit(1);
        }
    } else {
        print!("{text}");
    }

    if let Some(path) = &cli.callgraph {
        let dot = disz80::generate_call_graph(&dis);
        if let Err(e) = std::fs::write(path, &dot) {
            eprintln!("Error writing '{path}': {e}");
            process::exit(1);
        }
    }
}

fn read_file(path: &str) -> Vec<u8> {
    match std::fs::read(path) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("Error reading '{path}': {e}");
            process::exit(1);
        }
    }
}

/// Parse an address as decimal, `0x` hex or trailing-`h` hex.
fn parse_addr(s: &str) -> Option<u16> {
    let s = s.trim();
    if let Some(hex) = s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
        return u16::from_str_radix(hex, 16).ok();
    }
    if let Some(hex) = s.strip_suffix('h').or_else(|| s.strip_suffix('H')) {
        return u16::from_str_radix(hex, 16).ok();
    }
    s.parse().ok()
}
