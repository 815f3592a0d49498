/// A raw descriptor number handed out by an embedded volume.
///
/// Deliberately neither `Clone` nor `Copy`: whoever holds it owns the open file.
#[derive(Debug, PartialOrd, PartialEq, Eq, Ord, Hash)]
pub struct RawDescriptor(pub u64);

impl From<u64> for RawDescriptor {
    fn from(raw_value: u64) -> Self {
        RawDescriptor(raw_value)
    }
}

/// The state of the native descriptor owned by a handle.
#[derive(Debug)]
pub(crate) enum Descriptor<F> {
    Open(F),
    Closed,
}

impl<F> Descriptor<F> {
    pub fn as_open(&self) -> Option<&F> {
        match self {
            Descriptor::Open(fd) => Some(fd),
            Descriptor::Closed => None,
        }
    }

    /// Mark the descriptor as closed, handing out the open one (if any) for the native close.
    pub fn take(&mut self) -> Option<F> {
        match std::mem::replace(self, Descriptor::Closed) {
            Descriptor::Open(fd) => Some(fd),
            Descriptor::Closed => None,
        }
    }

    pub fn is_closed(&self) -> bool {
        matches!(self, Descriptor::Closed)
    }
}

#[cfg(test)]
mod tests {
    use super::Descriptor;

    #[test]
    fn test_take_once() {
        let mut descriptor = Descriptor::Open(42);
        assert_eq!(descriptor.as_open(), Some(&42));
        assert_eq!(descriptor.take(), Some(42));
        assert!(descriptor.is_closed());
        assert_eq!(descriptor.take(), None);
        assert_eq!(descriptor.as_open(), None);
    }
}
