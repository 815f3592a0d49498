use std::fmt::{Display, Formatter, Result as FmtResult};

use libc::c_int;

/// Wrapping a freshly opened descriptor into a handle failed. The descriptor is already closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConstructionError {
    /// The open flags contain bits which are not understood.
    UnsupportedFlags(c_int),
}

impl super::Error for ConstructionError {}

impl std::error::Error for ConstructionError {}

impl Display for ConstructionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str("Error during handle construction: ")?;
        match self {
            ConstructionError::UnsupportedFlags(flags) => {
                write!(f, "Unsupported open flags {:#o}", flags)
            }
        }
    }
}
