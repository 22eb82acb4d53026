//! Receive engine: incremental frame parse with early filtering, CRC
//! verification, and synchronous ACK/NAK emission.
use crate::core::{
    CommunicationMode, PacketBuffer, ACK, BROADCAST, FAIL, NAK, PACKET_MAX_LENGTH,
};
use crate::infra::crc;
use crate::protocol::transport::frame::{self, HeaderFlags, FRAME_OVERHEAD};
use crate::protocol::transport::traits::strategy::BusStrategy;
use crate::protocol::transport::LinkConfig;

/// Result of one receive pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RxOutcome {
    /// A valid frame addressed to us was read into the buffer.
    Ack,
    /// A complete frame arrived but failed CRC verification.
    Nak,
    /// Traffic for somebody else (address, shared flag, or bus mismatch).
    Busy,
    /// The channel timed out or the frame was structurally invalid.
    Fail,
}

/// Read one frame from the strategy into `frame_buf`.
///
/// The parse short-circuits as early as the addressing bytes allow, so
/// foreign traffic costs at most seven byte reads. On a complete frame the
/// ACK/NAK response is emitted here, before the caller dispatches the
/// payload to the application.
pub fn receive_frame<S: BusStrategy>(
    strategy: &mut S,
    config: &LinkConfig,
    frame_buf: &mut PacketBuffer,
) -> RxOutcome {
    frame_buf.clear();
    let mut expected_len = PACKET_MAX_LENGTH;
    let mut running_crc = 0u8;
    let mut shared = false;
    let mut requests_ack = false;
    let mut index = 0usize;

    while index < expected_len {
        let state = strategy.receive_byte();
        if state == FAIL {
            return RxOutcome::Fail;
        }
        let byte = state as u8;
        frame_buf.push(byte);

        match index {
            0 => {
                if byte != config.device_id && byte != BROADCAST && !config.router {
                    return RxOutcome::Busy;
                }
            }
            1 => {
                if (byte as usize) > FRAME_OVERHEAD && (byte as usize) < PACKET_MAX_LENGTH {
                    expected_len = byte as usize;
                } else {
                    return RxOutcome::Fail;
                }
            }
            2 => {
                let header = HeaderFlags::new(byte);
                shared = header.is_shared();
                requests_ack = header.requests_ack();
                // Keep private and shared buses apart.
                if shared != config.shared && !config.router {
                    return RxOutcome::Busy;
                }
                // A header whose prefix does not fit the announced length
                // is malformed regardless of its CRC.
                if frame::payload_offset(header) + 1 > expected_len {
                    return RxOutcome::Fail;
                }
            }
            3..=6 => {
                // Bus-id equality keeps parallel buses on one medium
                // apart: id 1 on bus 1 must not take a frame for id 1 on
                // bus 2.
                if config.shared && shared && !config.router && config.bus_id.0[index - 3] != byte
                {
                    return RxOutcome::Busy;
                }
            }
            _ => {}
        }

        running_crc = crc::update(byte, running_crc);
        index += 1;
    }

    let data = frame_buf.as_slice();
    let respond = requests_ack
        && data[0] != BROADCAST
        && config.mode != CommunicationMode::Simplex
        && bus_scope_matches(config, data, shared);

    if running_crc == 0 {
        if respond {
            strategy.send_response(ACK);
        }
        RxOutcome::Ack
    } else {
        if respond {
            strategy.send_response(NAK);
        }
        RxOutcome::Nak
    }
}

/// Acknowledgements cross the medium only inside our own bus scope: a
/// private bus always qualifies, a shared one only when the frame carries
/// our bus id.
fn bus_scope_matches(config: &LinkConfig, data: &[u8], shared: bool) -> bool {
    if !config.shared {
        return true;
    }
    shared && data.len() >= 7 && data[3..7] == config.bus_id.0
}
