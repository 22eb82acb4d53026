// Test doubles simulating the byte channel and the clock during
// integration tests.
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use wirebus::core::{BusId, PacketBuffer, FAIL};
use wirebus::protocol::transport::frame::{self, HeaderFlags};
use wirebus::protocol::transport::traits::{clock::Clock, strategy::BusStrategy};

//==================================================================================MOCK_STRATEGY

#[derive(Default)]
#[allow(dead_code)]
/// Shared state behind a [`MockStrategy`] handle.
pub struct StrategyState {
    pub idle: bool,
    pub inbound: VecDeque<u16>,
    pub responses: VecDeque<u16>,
    pub sent: Vec<u8>,
    pub responses_emitted: Vec<u8>,
}

#[derive(Clone)]
#[allow(dead_code)]
/// In-memory byte channel reproducing the `BusStrategy` contract. Cloning
/// yields a handle onto the same wire, so tests keep one while the bus
/// controller owns the other.
pub struct MockStrategy {
    state: Rc<RefCell<StrategyState>>,
}

#[allow(dead_code)]
impl MockStrategy {
    /// Idle channel with nothing scripted: reads time out with `FAIL`.
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(StrategyState {
                idle: true,
                ..StrategyState::default()
            })),
        }
    }

    /// Script data bytes for `receive_byte`.
    pub fn feed(&self, bytes: &[u8]) {
        let mut state = self.state.borrow_mut();
        state.inbound.extend(bytes.iter().map(|byte| *byte as u16));
    }

    /// Script a raw channel value (e.g. the `FAIL` sentinel).
    pub fn feed_raw(&self, value: u16) {
        self.state.borrow_mut().inbound.push_back(value);
    }

    /// Script one value for `receive_response`.
    pub fn script_response(&self, value: u16) {
        self.state.borrow_mut().responses.push_back(value);
    }

    /// Script the same response `count` times.
    pub fn script_responses(&self, value: u16, count: usize) {
        let mut state = self.state.borrow_mut();
        for _ in 0..count {
            state.responses.push_back(value);
        }
    }

    /// Drive the carrier sense.
    pub fn set_idle(&self, idle: bool) {
        self.state.borrow_mut().idle = idle;
    }

    /// Bytes the bus wrote on the wire so far.
    pub fn sent(&self) -> Vec<u8> {
        self.state.borrow().sent.clone()
    }

    /// Drain the wire capture, returning what was written.
    pub fn take_sent(&self) -> Vec<u8> {
        std::mem::take(&mut self.state.borrow_mut().sent)
    }

    /// ACK/NAK symbols the bus emitted.
    pub fn responses_emitted(&self) -> Vec<u8> {
        self.state.borrow().responses_emitted.clone()
    }

    /// Scripted responses not yet consumed.
    pub fn pending_responses(&self) -> usize {
        self.state.borrow().responses.len()
    }
}

impl BusStrategy for MockStrategy {
    fn can_start(&mut self) -> bool {
        self.state.borrow().idle
    }

    fn send_byte(&mut self, byte: u8) {
        self.state.borrow_mut().sent.push(byte);
    }

    fn receive_byte(&mut self) -> u16 {
        self.state.borrow_mut().inbound.pop_front().unwrap_or(FAIL)
    }

    fn send_response(&mut self, response: u8) {
        self.state.borrow_mut().responses_emitted.push(response);
    }

    fn receive_response(&mut self) -> u16 {
        self.state.borrow_mut().responses.pop_front().unwrap_or(FAIL)
    }
}

//==================================================================================MOCK_CLOCK

#[allow(dead_code)]
/// Shared state behind a [`MockClock`] handle.
pub struct ClockState {
    pub now: u64,
    pub auto_advance: u64,
}

#[derive(Clone)]
#[allow(dead_code)]
/// Manually driven clock. With an auto-advance step every `micros()` read
/// moves time forward, which lets busy-wait loops in the library make
/// progress without a real timer.
pub struct MockClock {
    state: Rc<RefCell<ClockState>>,
}

#[allow(dead_code)]
impl MockClock {
    /// Clock frozen at zero; tests advance it explicitly.
    pub fn new() -> Self {
        Self::with_auto_advance(0)
    }

    /// Clock advancing by `step` microseconds on every read.
    pub fn with_auto_advance(step: u64) -> Self {
        Self {
            state: Rc::new(RefCell::new(ClockState {
                now: 0,
                auto_advance: step,
            })),
        }
    }

    /// Move time forward.
    pub fn advance(&self, micros: u64) {
        self.state.borrow_mut().now += micros;
    }

    /// Current simulated time.
    pub fn now(&self) -> u64 {
        self.state.borrow().now
    }
}

impl Clock for MockClock {
    fn micros(&mut self) -> u64 {
        let mut state = self.state.borrow_mut();
        state.now += state.auto_advance;
        state.now
    }

    fn delay_micros(&mut self, duration: u32) {
        self.state.borrow_mut().now += duration as u64;
    }

    fn rand_range(&mut self, bound: u32) -> u32 {
        // Deterministic: always the largest legal draw, so tests observe
        // the worst-case delay.
        bound.saturating_sub(1)
    }
}

//==================================================================================FRAME_BUILDING

#[allow(dead_code)]
/// Encode a complete frame the way a peer device would put it on the wire.
pub fn encoded_frame(
    destination: u8,
    payload: &[u8],
    header_bits: u8,
    receiver_bus_id: BusId,
    sender_bus_id: BusId,
    sender_id: u8,
) -> Vec<u8> {
    let mut buffer = PacketBuffer::new();
    frame::encode(
        destination,
        payload,
        HeaderFlags::new(header_bits),
        receiver_bus_id,
        sender_bus_id,
        sender_id,
        &mut buffer,
    )
    .expect("test frame must fit");
    buffer.as_slice().to_vec()
}
