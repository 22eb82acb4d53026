//! Scheduler scenarios: due-time gating with cubic backoff, outcome
//! handling, attempt exhaustion, repeat-scheduled slots, and enqueue
//! rejections.
mod helpers {
    include!("../../helpers/mod.rs");
}

use std::sync::Mutex;

use helpers::{encoded_frame, MockClock, MockStrategy};
use wirebus::core::{BusId, ACK, MAX_PACKETS, NAK};
use wirebus::error::{BusError, EnqueueError};
use wirebus::protocol::bus::queue::SlotState;
use wirebus::protocol::bus::Bus;
use wirebus::protocol::transport::frame::ACK_REQUEST_BIT;

#[test]
fn test_begin_applies_a_bounded_startup_delay() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);

    bus.begin();

    // The mock clock always draws the largest legal value: 999 ms.
    assert_eq!(clock.now(), 999 * 1_000);
    assert!(strategy.sent().is_empty());
}

#[test]
fn test_acknowledged_one_shot_is_auto_deleted() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);

    let slot = bus.send(12, b"@").unwrap();
    strategy.script_response(ACK as u16);
    clock.advance(2);
    bus.update();

    let expected = encoded_frame(
        12,
        b"@",
        ACK_REQUEST_BIT,
        BusId::LOCALHOST,
        BusId::LOCALHOST,
        12,
    );
    assert_eq!(strategy.sent(), expected);
    assert_eq!(bus.packet_state(slot), Some(SlotState::Free));
}

#[test]
fn test_acknowledge_disabled_succeeds_without_response() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);
    bus.set_acknowledge(false);

    let slot = bus.send(12, b"@").unwrap();
    clock.advance(2);
    bus.update();

    let sent = strategy.sent();
    assert_eq!(sent[2], 0, "no flag is set when acknowledge is off");
    assert_eq!(bus.packet_state(slot), Some(SlotState::Free));
    assert_eq!(strategy.pending_responses(), 0);
}

#[test]
fn test_busy_channel_defers_transmission() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);

    strategy.set_idle(false);
    let slot = bus.send(12, b"@").unwrap();
    clock.advance(2);
    bus.update();

    assert_eq!(bus.packet_state(slot), Some(SlotState::Busy));
    assert!(strategy.sent().is_empty());

    strategy.set_idle(true);
    strategy.script_response(ACK as u16);
    bus.update();

    assert_eq!(bus.packet_state(slot), Some(SlotState::Free));
    assert_eq!(strategy.sent().len(), 5);
}

#[test]
fn test_retry_spacing_grows_cubically() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 7);

    // Every response attempt times out.
    bus.send(7, b"@").unwrap();
    let frame_len = 5;

    clock.advance(1); // t = 1 µs, past timing + 0³
    bus.update();
    assert_eq!(strategy.sent().len(), frame_len);

    bus.update(); // still t = 1: attempt 2 is gated at 1³ µs
    assert_eq!(strategy.sent().len(), frame_len);

    clock.advance(1); // t = 2 > 1
    bus.update();
    assert_eq!(strategy.sent().len(), 2 * frame_len);

    clock.advance(1); // t = 3, attempt 3 is gated at 2³ = 8 µs
    bus.update();
    assert_eq!(strategy.sent().len(), 2 * frame_len);

    clock.advance(6); // t = 9 > 8
    bus.update();
    assert_eq!(strategy.sent().len(), 3 * frame_len);
}

#[test]
fn test_connection_lost_after_attempt_exhaustion() {
    static ERRORS: Mutex<Vec<BusError>> = Mutex::new(Vec::new());
    fn recorder(error: BusError) {
        ERRORS.lock().unwrap().push(error);
    }

    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);
    bus.set_error(recorder);

    let slot = bus.send(7, b"@").unwrap();

    // Each tick is far enough in the future to clear every backoff gate.
    for _ in 0..130 {
        clock.advance(2_000_000);
        bus.update();
    }

    assert_eq!(
        ERRORS.lock().unwrap().as_slice(),
        &[BusError::ConnectionLost { device_id: 7 }]
    );
    assert_eq!(bus.packet_state(slot), Some(SlotState::Free));
    // 125 allowed attempts plus the one that crossed the limit.
    assert_eq!(strategy.sent().len(), 126 * 5);
}

#[test]
fn test_repeat_scheduled_slot_rearms_after_ack() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);

    let slot = bus.send_repeatedly(12, b"@", 1000).unwrap();
    strategy.script_responses(ACK as u16, 2);

    clock.advance(1001);
    bus.update();
    assert_eq!(bus.packet_state(slot), Some(SlotState::ToBeSent));
    assert_eq!(strategy.sent().len(), 5);

    clock.advance(1001);
    bus.update();
    assert_eq!(strategy.sent().len(), 10);

    bus.remove(slot);
    assert_eq!(bus.packet_state(slot), Some(SlotState::Free));
}

#[test]
fn test_nak_leaves_slot_for_the_next_tick() {
    let strategy = MockStrategy::new();
    let clock = MockClock::new();
    let mut bus = Bus::with_id(strategy.clone(), clock.clone(), 12);

    let slot = bus.send(12, b"@").unwrap();
    strategy.script_response(NAK as u16);
    clock.advance(1);
    bus.update();

    assert_eq!(bus.packet_state(slot), Some(SlotState::Nak));

    strategy.script_response(ACK as u16);
    bus.update();
    assert_eq!(bus.packet_state(slot), Some(SlotState::Free));
}

#[test]
fn test_oversized_content_is_rejected_at_enqueue() {
    static ERRORS: Mutex<Vec<BusError>> = Mutex::new(Vec::new());
    fn recorder(error: BusError) {
        ERRORS.lock().unwrap().push(error);
    }

    let strategy = MockStrategy::new();
    let mut bus = Bus::with_id(strategy.clone(), MockClock::new(), 12);
    bus.set_error(recorder);

    // 3 header bytes + 46 payload bytes + CRC hit the frame ceiling.
    let payload = [0u8; 46];
    assert_eq!(
        bus.send(12, &payload),
        Err(EnqueueError::ContentTooLong { length: 50 })
    );
    assert_eq!(
        ERRORS.lock().unwrap().as_slice(),
        &[BusError::ContentTooLong { length: 50 }]
    );
    assert_eq!(bus.packet_state(0), Some(SlotState::Free));

    // One byte less fits.
    assert_eq!(bus.send(12, &payload[..45]), Ok(0));
}

#[test]
fn test_full_queue_is_rejected_at_enqueue() {
    static ERRORS: Mutex<Vec<BusError>> = Mutex::new(Vec::new());
    fn recorder(error: BusError) {
        ERRORS.lock().unwrap().push(error);
    }

    let strategy = MockStrategy::new();
    let mut bus = Bus::with_id(strategy.clone(), MockClock::new(), 12);
    bus.set_error(recorder);

    for _ in 0..MAX_PACKETS {
        bus.send(12, b"@").unwrap();
    }

    assert_eq!(
        bus.send(12, b"@"),
        Err(EnqueueError::PacketsBufferFull {
            capacity: MAX_PACKETS
        })
    );
    assert_eq!(
        ERRORS.lock().unwrap().as_slice(),
        &[BusError::PacketsBufferFull {
            capacity: MAX_PACKETS
        }]
    );
}
