//! On-wire layout of a frame: header flag bits, the optional bus/sender
//! prefix, full-frame assembly with trailing CRC, and metadata extraction
//! for received frames.
use crate::core::{BusId, PacketBuffer, PACKET_MAX_LENGTH};
use crate::infra::crc;

//==================================================================================HEADER_FLAGS

/// Frame carries bus-id fields (shared-medium frame).
pub const MODE_BIT: u8 = 1;
/// Frame carries the sender address (and sender bus id when shared).
pub const SENDER_INFO_BIT: u8 = 2;
/// Receiver must emit a synchronous ACK/NAK.
pub const ACK_REQUEST_BIT: u8 = 4;

/// One-byte header bitfield. The upper four bits are reserved: zero on
/// transmit, ignored on receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HeaderFlags(u8);

impl HeaderFlags {
    /// Wrap raw header bits, clearing the reserved upper half.
    pub const fn new(bits: u8) -> Self {
        Self(bits & 0x0F)
    }

    /// Compose a header from the controller configuration.
    pub const fn from_config(shared: bool, sender_info: bool, ack_request: bool) -> Self {
        let mut bits = 0;
        if shared {
            bits |= MODE_BIT;
        }
        if sender_info {
            bits |= SENDER_INFO_BIT;
        }
        if ack_request {
            bits |= ACK_REQUEST_BIT;
        }
        Self(bits)
    }

    /// Raw bit value as placed on the wire.
    #[inline]
    pub const fn bits(self) -> u8 {
        self.0
    }

    /// Whether the frame addresses a shared medium and carries bus ids.
    #[inline]
    pub const fn is_shared(self) -> bool {
        self.0 & MODE_BIT != 0
    }

    /// Whether the frame carries the sender address.
    #[inline]
    pub const fn includes_sender_info(self) -> bool {
        self.0 & SENDER_INFO_BIT != 0
    }

    /// Whether the receiver must answer with a synchronous ACK/NAK.
    #[inline]
    pub const fn requests_ack(self) -> bool {
        self.0 & ACK_REQUEST_BIT != 0
    }

    /// Length of the header-dependent prefix between the fixed header and
    /// the payload: receiver bus id, then sender bus id and sender id when
    /// present.
    pub const fn prefix_len(self) -> usize {
        if self.is_shared() {
            if self.includes_sender_info() {
                9
            } else {
                4
            }
        } else if self.includes_sender_info() {
            1
        } else {
            0
        }
    }
}

//==================================================================================LAYOUT

/// Fixed framing bytes around the body: destination, length, header, CRC.
pub const FRAME_OVERHEAD: usize = 4;

/// Offset of the first payload byte inside a frame with this header.
#[inline]
pub const fn payload_offset(header: HeaderFlags) -> usize {
    3 + header.prefix_len()
}

/// Append the header-dependent prefix to a body under construction.
pub fn write_prefix(
    header: HeaderFlags,
    receiver_bus_id: BusId,
    sender_bus_id: BusId,
    sender_id: u8,
    out: &mut PacketBuffer,
) {
    if header.is_shared() {
        for byte in receiver_bus_id.0 {
            out.push(byte);
        }
        if header.includes_sender_info() {
            for byte in sender_bus_id.0 {
                out.push(byte);
            }
            out.push(sender_id);
        }
    } else if header.includes_sender_info() {
        out.push(sender_id);
    }
}

/// Assemble the on-wire image of a prepared body: destination, length
/// (the total frame byte count), header, body, trailing CRC.
///
/// Returns the total frame length, or `None` when the body would overflow
/// [`PACKET_MAX_LENGTH`].
pub fn compose_frame(
    destination: u8,
    header: HeaderFlags,
    body: &[u8],
    out: &mut PacketBuffer,
) -> Option<usize> {
    let total = body.len() + FRAME_OVERHEAD;
    if total >= PACKET_MAX_LENGTH {
        return None;
    }

    out.clear();
    out.push(destination);
    out.push(total as u8);
    out.push(header.bits());
    for byte in body {
        out.push(*byte);
    }
    out.push(crc::compute(out.as_slice()));

    Some(total)
}

/// Serialize a complete frame from payload and addressing in one step.
pub fn encode(
    destination: u8,
    payload: &[u8],
    header: HeaderFlags,
    receiver_bus_id: BusId,
    sender_bus_id: BusId,
    sender_id: u8,
    out: &mut PacketBuffer,
) -> Option<usize> {
    let mut body = PacketBuffer::new();
    write_prefix(header, receiver_bus_id, sender_bus_id, sender_id, &mut body);
    for byte in payload {
        if !body.push(*byte) {
            return None;
        }
    }
    compose_frame(destination, header, body.as_slice(), out)
}

//==================================================================================PACKET_INFO

/// Metadata of the most recently accepted inbound frame. Overwritten on
/// each accept; read by the application from within the receive callback
/// and by `reply()`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PacketInfo {
    pub header: HeaderFlags,
    pub receiver_id: u8,
    /// Populated when the header carries [`MODE_BIT`].
    pub receiver_bus_id: BusId,
    /// Populated when the header carries [`SENDER_INFO_BIT`].
    pub sender_id: u8,
    /// Populated when the header carries both bits.
    pub sender_bus_id: BusId,
}

impl PacketInfo {
    /// Parse the addressing metadata out of a raw frame.
    ///
    /// The slice must hold at least the fixed header and the prefix its
    /// flag byte announces; the receive engine guarantees this by
    /// validating the length byte before accepting a frame.
    pub fn from_frame(frame: &[u8]) -> Self {
        let header = HeaderFlags::new(frame[2]);
        let mut info = Self {
            header,
            receiver_id: frame[0],
            ..Self::default()
        };

        if header.is_shared() {
            info.receiver_bus_id = BusId([frame[3], frame[4], frame[5], frame[6]]);
            if header.includes_sender_info() {
                info.sender_bus_id = BusId([frame[7], frame[8], frame[9], frame[10]]);
                info.sender_id = frame[11];
            }
        } else if header.includes_sender_info() {
            info.sender_id = frame[3];
        }

        info
    }
}
