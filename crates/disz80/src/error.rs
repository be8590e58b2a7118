use std::fmt;

use crate::formats::error::FormatError;

/// Unified error type for the disz80 library.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// The same byte was decoded as part of two different instructions
    /// (a branch into the middle of an instruction, or overlapping
    /// decode paths). The only fatal analysis error; the disassembler
    /// retains its partial state.
    AmbiguousDecode {
        existing_address: u16,
        existing_mnemonic: String,
        new_address: u16,
        new_mnemonic: String,
    },
    Format(FormatError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AmbiguousDecode {
                existing_address,
                existing_mnemonic,
                new_address,
                new_mnemonic,
            } => {
                write!(
                    f,
                    "ambiguous disassembly: '{new_mnemonic}' at {new_address:04X}h overlaps \
                     '{existing_mnemonic}' at {existing_address:04X}h"
                )
            }
            Error::Format(e) => write!(f, "input format error: {e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<FormatError> for Error {
    fn from(e: FormatError) -> Self {
        Error::Format(e)
    }
}

/// Recoverable analysis findings, collected on the disassembler and
/// mirrored to the `log` facade.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A control-flow trace ran into a byte that was never loaded from
    /// an input image.
    UnassignedAddress { address: u16 },
    /// A subroutine whose only remaining callers lie inside itself.
    SelfCallingSubroutine { address: u16 },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnassignedAddress { address } => {
                write!(f, "tried to disassemble unassigned memory at {address:04X}h")
            }
            Warning::SelfCallingSubroutine { address } => {
                write!(f, "subroutine at {address:04X}h is only called by itself")
            }
        }
    }
}
