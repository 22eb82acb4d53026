//! Outbound queue: a fixed pool of packet slots, each owning its content
//! inline. Slots are claimed at enqueue and released on delivery, cancel,
//! or attempt exhaustion; the pool never allocates.
use crate::core::{PacketBuffer, MAX_PACKETS};
use crate::error::EnqueueError;
use crate::protocol::transport::frame::HeaderFlags;

//==================================================================================SLOT_STATE

/// Lifecycle state of a queue slot. Discriminants are the wire-level codes
/// of the protocol, so a state dump reads like a bus trace.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u16)]
pub enum SlotState {
    /// Slot available for enqueue.
    Free = 0,
    /// Last attempt was acknowledged.
    Ack = 6,
    /// Receiver rejected the last attempt (CRC failure on its end).
    Nak = 21,
    /// Armed and waiting for its due time.
    ToBeSent = 74,
    /// Medium was busy at the last attempt.
    Busy = 666,
    /// Last attempt got no usable response.
    Fail = 0x100,
}

//==================================================================================PENDING_PACKET

/// One queue entry.
#[derive(Debug, Clone, Copy)]
pub struct PendingPacket {
    pub state: SlotState,
    /// Destination device id.
    pub destination: u8,
    /// Header snapshotted at enqueue.
    pub header: HeaderFlags,
    /// Pre-serialized body: the header-dependent prefix plus the payload.
    pub content: PacketBuffer,
    /// Time of the last attempt (µs).
    pub registration: u64,
    /// Attempts consumed since the last (re)arming.
    pub attempts: u8,
    /// Repeat interval (µs); `0` means one-shot.
    pub timing: u32,
}

impl PendingPacket {
    /// Create a slot in the free state.
    const fn new() -> Self {
        Self {
            state: SlotState::Free,
            destination: 0,
            header: HeaderFlags::new(0),
            content: PacketBuffer::new(),
            registration: 0,
            attempts: 0,
            timing: 0,
        }
    }

    /// Release the slot and make it available again.
    fn reset(&mut self) {
        self.state = SlotState::Free;
        self.destination = 0;
        self.header = HeaderFlags::new(0);
        self.content.clear();
        self.registration = 0;
        self.attempts = 0;
        self.timing = 0;
    }
}

//==================================================================================OUTBOUND_QUEUE

/// Fixed pool of [`MAX_PACKETS`] slots, visited in index order by the
/// scheduler.
#[derive(Debug, Clone, Copy)]
pub struct OutboundQueue {
    slots: [PendingPacket; MAX_PACKETS],
}

impl Default for OutboundQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl OutboundQueue {
    /// Instantiate the queue with every slot free.
    pub const fn new() -> Self {
        Self {
            slots: [PendingPacket::new(); MAX_PACKETS],
        }
    }

    /// Claim the lowest free slot for a prepared body.
    ///
    /// The caller has already validated the body against the frame limit;
    /// the queue only accounts for slot capacity.
    pub fn insert(
        &mut self,
        destination: u8,
        header: HeaderFlags,
        body: &[u8],
        timing: u32,
        now: u64,
    ) -> Result<usize, EnqueueError> {
        for (index, slot) in self.slots.iter_mut().enumerate() {
            if slot.state == SlotState::Free {
                slot.state = SlotState::ToBeSent;
                slot.destination = destination;
                slot.header = header;
                slot.content.copy_from_slice(body);
                slot.registration = now;
                slot.attempts = 0;
                slot.timing = timing;
                return Ok(index);
            }
        }

        Err(EnqueueError::PacketsBufferFull {
            capacity: MAX_PACKETS,
        })
    }

    /// Release a slot. Out-of-range indices are ignored.
    pub fn remove(&mut self, index: usize) {
        if let Some(slot) = self.slots.get_mut(index) {
            slot.reset();
        }
    }

    /// Inspect a slot.
    pub fn slot(&self, index: usize) -> Option<&PendingPacket> {
        self.slots.get(index)
    }

    /// Mutable access to a slot.
    pub fn slot_mut(&mut self, index: usize) -> Option<&mut PendingPacket> {
        self.slots.get_mut(index)
    }

    /// Whether a slot still holds an undelivered packet.
    pub fn is_pending(&self, index: usize) -> bool {
        self.slots
            .get(index)
            .is_some_and(|slot| slot.state != SlotState::Free)
    }
}
