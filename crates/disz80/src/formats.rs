//! Input readers: raw binaries, ZX Spectrum snapshots, MAME traces.

pub mod error;
pub mod sna;
pub mod trace;

pub use error::FormatError;
pub use sna::{parse_sna, Snapshot, SNA_HEADER_LEN, SNA_RAM_LEN, SNA_RAM_START};
pub use trace::parse_trace;
