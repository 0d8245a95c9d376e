//! In-memory bus for tests and simulation.
//!
//! [`VirtualCanBus`] records every frame the client sends and parks bulk
//! transfers until the test (or a scripted server) completes them.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use super::{BulkTransfer, CanBus, ControlFunction, TransferCompleteCallback};

/// A frame handed to the virtual bus
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentFrame {
    /// PGN
    pub pgn: u32,
    /// Destination address
    pub destination: u8,
    /// Data bytes
    pub data: Vec<u8>,
}

struct PendingTransfer {
    pgn: u32,
    destination: u8,
    data: Vec<u8>,
    on_complete: TransferCompleteCallback,
}

/// Recording CAN bus with scriptable acceptance
pub struct VirtualCanBus {
    sent: Mutex<Vec<SentFrame>>,
    transfers: Mutex<VecDeque<PendingTransfer>>,
    accept_sends: AtomicBool,
    accept_transfers: AtomicBool,
}

impl std::fmt::Debug for VirtualCanBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VirtualCanBus")
            .field("sent", &self.sent.lock().len())
            .field("pending_transfers", &self.transfers.lock().len())
            .field("accept_sends", &self.accept_sends.load(Ordering::SeqCst))
            .finish()
    }
}

impl Default for VirtualCanBus {
    fn default() -> Self {
        Self::new()
    }
}

impl VirtualCanBus {
    /// Bus that accepts every send and transfer
    pub fn new() -> Self {
        Self {
            sent: Mutex::new(Vec::new()),
            transfers: Mutex::new(VecDeque::new()),
            accept_sends: AtomicBool::new(true),
            accept_transfers: AtomicBool::new(true),
        }
    }

    /// Make subsequent sends succeed or fail
    pub fn set_accept_sends(&self, accept: bool) {
        self.accept_sends.store(accept, Ordering::SeqCst);
    }

    /// Make subsequent transfer starts succeed or fail
    pub fn set_accept_transfers(&self, accept: bool) {
        self.accept_transfers.store(accept, Ordering::SeqCst);
    }

    /// Copy of every accepted frame so far
    pub fn sent_frames(&self) -> Vec<SentFrame> {
        self.sent.lock().clone()
    }

    /// Remove and return every accepted frame so far
    pub fn take_sent(&self) -> Vec<SentFrame> {
        std::mem::take(&mut *self.sent.lock())
    }

    /// Most recent accepted frame
    pub fn last_sent(&self) -> Option<SentFrame> {
        self.sent.lock().last().cloned()
    }

    /// Transfers started but not yet completed
    pub fn pending_transfers(&self) -> usize {
        self.transfers.lock().len()
    }

    /// Finish the oldest pending transfer, returning its PGN, destination and data
    pub fn complete_transfer(&self, success: bool) -> Option<(u32, u8, Vec<u8>)> {
        // Pop before calling back so the callback may start a new transfer
        let transfer = self.transfers.lock().pop_front()?;
        (transfer.on_complete)(success);
        Some((transfer.pgn, transfer.destination, transfer.data))
    }
}

impl CanBus for VirtualCanBus {
    fn send(&self, pgn: u32, destination: u8, data: &[u8]) -> bool {
        if !self.accept_sends.load(Ordering::SeqCst) {
            return false;
        }
        self.sent.lock().push(SentFrame {
            pgn,
            destination,
            data: data.to_vec(),
        });
        true
    }
}

impl BulkTransfer for VirtualCanBus {
    fn begin_transfer(
        &self,
        pgn: u32,
        destination: u8,
        data: Vec<u8>,
        on_complete: TransferCompleteCallback,
    ) -> bool {
        if !self.accept_transfers.load(Ordering::SeqCst) {
            return false;
        }
        self.transfers.lock().push_back(PendingTransfer {
            pgn,
            destination,
            data,
            on_complete,
        });
        true
    }
}

/// Control function with a settable address
#[derive(Debug, Default)]
pub struct VirtualControlFunction {
    address: Mutex<Option<u8>>,
}

impl VirtualControlFunction {
    /// Function that has claimed `address`
    pub fn new(address: u8) -> Self {
        Self {
            address: Mutex::new(Some(address)),
        }
    }

    /// Function that has not claimed an address
    pub fn unclaimed() -> Self {
        Self::default()
    }

    /// Claim or lose an address
    pub fn set_address(&self, address: Option<u8>) {
        *self.address.lock() = address;
    }
}

impl ControlFunction for VirtualControlFunction {
    fn address(&self) -> Option<u8> {
        *self.address.lock()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_records_frames() {
        let bus = VirtualCanBus::new();
        assert!(bus.send(0xCB00, 0xF7, &[1, 2, 3]));
        bus.set_accept_sends(false);
        assert!(!bus.send(0xCB00, 0xF7, &[4]));

        let sent = bus.take_sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].data, vec![1, 2, 3]);
        assert!(bus.sent_frames().is_empty());
    }

    #[test]
    fn test_complete_transfer() {
        let bus = VirtualCanBus::new();
        let done = Arc::new(AtomicBool::new(false));
        let flag = done.clone();
        assert!(bus.begin_transfer(
            0xCB00,
            0xF7,
            vec![0x61, 9],
            Box::new(move |ok| flag.store(ok, Ordering::SeqCst)),
        ));
        assert_eq!(bus.pending_transfers(), 1);

        let (pgn, dest, data) = bus.complete_transfer(true).unwrap();
        assert_eq!((pgn, dest), (0xCB00, 0xF7));
        assert_eq!(data, vec![0x61, 9]);
        assert!(done.load(Ordering::SeqCst));
        assert!(bus.complete_transfer(true).is_none());
    }

    #[test]
    fn test_control_function_address() {
        let cf = VirtualControlFunction::unclaimed();
        assert!(!cf.is_address_valid());
        cf.set_address(Some(0x83));
        assert!(cf.is_address_valid());
        cf.set_address(Some(0xFE));
        assert!(!cf.is_address_valid());
    }
}
