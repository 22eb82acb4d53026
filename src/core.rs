//! Shared protocol data types and constants: wire symbols, reserved
//! addresses, buffer sizing, communication modes, bus identifiers, and the
//! fixed-capacity frame buffer used by queue slots and the receive engine.

//==================================================================================SYMBOLS

/// Synchronous acknowledgement symbol emitted after a valid frame.
pub const ACK: u8 = 6;
/// Negative acknowledgement symbol emitted after a CRC failure.
pub const NAK: u8 = 21;
/// Single-byte probe payload used by the device-id acquisition scan.
pub const ACQUIRE_ID: u8 = 63;
/// Out-of-band sentinel returned by the strategy on timeout or noise.
/// Does not fit in an octet, so it can never shadow real data.
pub const FAIL: u16 = 0x100;

//==================================================================================ADDRESSES

/// Reserved destination address delivered to every device on the bus.
pub const BROADCAST: u8 = 0;
/// Reserved address of a device that has not acquired an id yet.
pub const NOT_ASSIGNED: u8 = 255;

//==================================================================================LIMITS

/// Attempts granted to a slot before the connection is declared lost.
pub const MAX_ATTEMPTS: u8 = 125;

/// Number of fixed slots in the outbound queue.
pub const MAX_PACKETS: usize = 10;

/// Upper bound on a whole frame (header, prefix, payload, and CRC).
/// Raise it when the target has memory to spare; every queue slot and the
/// receive scratch buffer carry this many bytes inline.
pub const PACKET_MAX_LENGTH: usize = 50;

//==================================================================================MODE

/// Physical channel arrangement of the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommunicationMode {
    /// One-way channel: no acknowledgement is ever solicited or awaited.
    Simplex = 150,
    /// Transmit and receive share one wire, never simultaneously.
    HalfDuplex = 151,
}

//==================================================================================BUS_ID

/// Four-byte identifier separating logically distinct buses that share one
/// physical medium. Equality is byte-wise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BusId(pub [u8; 4]);

impl BusId {
    /// Sentinel of an isolated/local bus; its bytes are omitted from local
    /// frames to reduce overhead.
    pub const LOCALHOST: BusId = BusId([0, 0, 0, 0]);

    /// Whether this id denotes an isolated bus rather than a shared medium.
    #[inline]
    pub fn is_localhost(&self) -> bool {
        *self == Self::LOCALHOST
    }
}

impl From<[u8; 4]> for BusId {
    fn from(bytes: [u8; 4]) -> Self {
        Self(bytes)
    }
}

//==================================================================================PACKET_BUFFER

/// Fixed-capacity byte buffer sized for one frame. Queue slots and the
/// receive engine own one inline; the crate performs no allocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacketBuffer {
    pub len: usize,
    pub data: [u8; PACKET_MAX_LENGTH],
}

impl Default for PacketBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl PacketBuffer {
    /// Create an empty buffer.
    pub const fn new() -> Self {
        Self {
            len: 0,
            data: [0; PACKET_MAX_LENGTH],
        }
    }

    /// Number of valid bytes stored.
    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    /// Checks whether the buffer is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Reset the buffer.
    #[inline]
    pub fn clear(&mut self) {
        self.len = 0;
    }

    /// Copy bytes into the buffer and update `len`. Input longer than the
    /// capacity is truncated.
    #[inline]
    pub fn copy_from_slice(&mut self, slice: &[u8]) {
        let clamped = slice.len().min(PACKET_MAX_LENGTH);
        self.data[..clamped].copy_from_slice(&slice[..clamped]);
        self.len = clamped;
    }

    /// Append one byte. Returns `false` when the buffer is full.
    #[inline]
    pub fn push(&mut self, byte: u8) -> bool {
        if self.len >= PACKET_MAX_LENGTH {
            return false;
        }
        self.data[self.len] = byte;
        self.len += 1;
        true
    }

    /// Immutable view over the populated bytes.
    #[inline]
    pub fn as_slice(&self) -> &[u8] {
        &self.data[..self.len]
    }

    /// Mutable view over the populated bytes.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [u8] {
        &mut self.data[..self.len]
    }
}
