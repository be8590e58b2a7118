use std::fmt;

/// Errors while reading an input file format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FormatError {
    /// The .sna file is smaller than header + 48 KiB image.
    SnaTooShort { len: usize, needed: usize },
    /// The snapshot's stack pointer does not point into the 48 KiB RAM
    /// image, so no start address can be recovered.
    SnaStackOutOfRange { sp: u16 },
}

impl fmt::Display for FormatError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormatError::SnaTooShort { len, needed } => {
                write!(f, "sna file is {len} bytes, need {needed}")
            }
            FormatError::SnaStackOutOfRange { sp } => {
                write!(f, "sna stack pointer {sp:04X}h lies outside RAM")
            }
        }
    }
}

impl std::error::Error for FormatError {}
