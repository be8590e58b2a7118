//! Output back ends: the assembly listing and the DOT call graph.

pub mod callgraph;
pub mod formatter;
pub mod listing;

pub use callgraph::generate_call_graph;
pub use formatter::{format_mnemonic, RenderContext};
pub use listing::{generate_listing, ListingOptions};
