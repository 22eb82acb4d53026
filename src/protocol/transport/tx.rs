//! Transmit engine: one packet's wire transaction, from carrier sense to
//! the synchronous acknowledgement.
use crate::core::{CommunicationMode, PacketBuffer, ACK, BROADCAST, FAIL, NAK};
use crate::protocol::transport::frame::{self, HeaderFlags};
use crate::protocol::transport::traits::{clock::Clock, strategy::BusStrategy};
use crate::protocol::transport::{LinkConfig, COLLISION_MAX_DELAY_US};

/// Result of a single transmission attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TxOutcome {
    /// Frame delivered (or fired without acknowledgement: broadcast,
    /// simplex, or acknowledge disabled).
    Ack,
    /// Receiver saw the frame but rejected it (CRC failure on its end).
    Nak,
    /// Medium was not idle; nothing was sent.
    Busy,
    /// No usable response came back.
    Fail,
}

/// Drive one attempt for a prepared body.
///
/// The body must already contain the header-dependent prefix; the engine
/// wraps it with destination, length, header, and trailing CRC. The length
/// byte is the total frame byte count.
pub fn transmit_frame<S: BusStrategy, C: Clock>(
    strategy: &mut S,
    clock: &mut C,
    config: &LinkConfig,
    destination: u8,
    body: &[u8],
    header: HeaderFlags,
) -> TxOutcome {
    if config.mode != CommunicationMode::Simplex && !strategy.can_start() {
        return TxOutcome::Busy;
    }

    let mut wire = PacketBuffer::new();
    if frame::compose_frame(destination, header, body, &mut wire).is_none() {
        // Enqueue validates sizes; an oversized body here is a logic error
        // upstream and must not reach the medium.
        return TxOutcome::Fail;
    }
    for byte in wire.as_slice() {
        strategy.send_byte(*byte);
    }

    if !config.acknowledge
        || destination == BROADCAST
        || config.mode == CommunicationMode::Simplex
    {
        return TxOutcome::Ack;
    }

    let response = strategy.receive_response();
    if response == ACK as u16 {
        return TxOutcome::Ack;
    }
    if response == FAIL {
        return TxOutcome::Fail;
    }

    // NAK or garbled symbol: resample a random slot so the colliding
    // masters do not retry in lockstep.
    let pause = clock.rand_range(COLLISION_MAX_DELAY_US);
    clock.delay_micros(pause);

    if response == NAK as u16 {
        TxOutcome::Nak
    } else {
        TxOutcome::Fail
    }
}
