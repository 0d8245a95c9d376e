//! Device descriptor object pool seam.
//!
//! Building the pool tree is the application's business; the client only
//! needs its labels and its serialized bytes.

use crate::codec::Label;

/// A device descriptor object pool (DDOP)
pub trait ObjectPool: Send + Sync {
    /// Whether the pool can be serialized and uploaded
    fn is_valid(&self) -> bool;

    /// Structure label of the device object
    fn structure_label(&self) -> Label;

    /// Localization label of the device object
    fn localization_label(&self) -> Label;

    /// Binary form sent in the object-pool transfer
    fn serialize(&self) -> Vec<u8>;
}

/// Pool held as already-serialized bytes plus its two labels
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedObjectPool {
    structure_label: Label,
    localization_label: Label,
    data: Vec<u8>,
}

impl SerializedObjectPool {
    /// Create from labels and serialized bytes
    pub fn new(structure_label: Label, localization_label: Label, data: Vec<u8>) -> Self {
        Self {
            structure_label,
            localization_label,
            data,
        }
    }

    /// Serialized size in bytes
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Whether the pool has no bytes
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl ObjectPool for SerializedObjectPool {
    fn is_valid(&self) -> bool {
        !self.data.is_empty()
    }

    fn structure_label(&self) -> Label {
        self.structure_label
    }

    fn localization_label(&self) -> Label {
        self.localization_label
    }

    fn serialize(&self) -> Vec<u8> {
        self.data.clone()
    }
}
