/// Device enumeration used as the backend half of a dispatch key.
///
/// Only host memory ships with this crate. Out-of-tree backends identify their memory with
/// [`Device::External`] and register themselves in a [`Dispatcher`](crate::Dispatcher).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Device {
    /// Host memory.
    #[default]
    Cpu,
    /// A device served by an externally registered backend.
    External {
        /// The name of the backend family, e.g. `"pinned"` or `"pool"`.
        backend: &'static str,
        /// The ordinal of the device within its family.
        ordinal: usize,
    },
}

impl Device {
    /// Creates an external device key.
    pub const fn external(backend: &'static str, ordinal: usize) -> Self {
        Device::External { backend, ordinal }
    }

    /// Returns the device type as a string.
    pub fn device_type(&self) -> &str {
        match self {
            Device::Cpu => "cpu",
            Device::External { backend, .. } => backend,
        }
    }

    /// Returns the device ordinal if applicable.
    pub fn ordinal(&self) -> Option<usize> {
        match self {
            Device::Cpu => None,
            Device::External { ordinal, .. } => Some(*ordinal),
        }
    }

    /// Returns true if the device is host memory.
    pub fn is_cpu(&self) -> bool {
        matches!(self, Device::Cpu)
    }
}

impl std::fmt::Display for Device {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Device::Cpu => write!(f, "cpu"),
            Device::External { backend, ordinal } => write!(f, "{backend}:{ordinal}"),
        }
    }
}
