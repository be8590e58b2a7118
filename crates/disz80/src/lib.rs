pub mod disasm;
pub mod error;
pub mod formats;
pub mod labels;
pub mod memory;
pub mod output;
pub mod z80;

pub use disasm::{Disassembler, NamingOptions, SubroutineStatistics};
pub use error::{Error, Warning};
pub use formats::{parse_sna, parse_trace, FormatError};
pub use labels::{Label, LabelKind, LabelStore};
pub use memory::{MemAttr, Memory, MEMORY_SIZE};
pub use output::callgraph::generate_call_graph;
pub use output::formatter::{format_mnemonic, RenderContext};
pub use output::listing::{generate_listing, ListingOptions};
pub use z80::{decode_instruction, Instruction};
