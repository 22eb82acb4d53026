//! Bus controller: owns the two ports, the outbound queue, the
//! configuration, and the application callbacks. The host drives it
//! cooperatively with `update()` and `receive()`; the controller never
//! spawns and never allocates.
use crate::core::{
    BusId, CommunicationMode, PacketBuffer, ACQUIRE_ID, BROADCAST, MAX_ATTEMPTS, MAX_PACKETS,
    NOT_ASSIGNED, PACKET_MAX_LENGTH,
};
use crate::error::{AcquireIdError, BusError, EnqueueError};
use crate::protocol::bus::queue::{OutboundQueue, PendingPacket, SlotState};
use crate::protocol::transport::frame::{self, HeaderFlags, PacketInfo};
use crate::protocol::transport::rx::{receive_frame, RxOutcome};
use crate::protocol::transport::traits::{clock::Clock, strategy::BusStrategy};
use crate::protocol::transport::tx::{transmit_frame, TxOutcome};
use crate::protocol::transport::{LinkConfig, INITIAL_MAX_DELAY_MS, MAX_ID_SCAN_TIME_US};

pub mod queue;

//==================================================================================CALLBACKS

/// Invoked for every accepted frame, between the wire acknowledgement and
/// the return of `receive()`.
pub type Receiver = fn(payload: &[u8], info: &PacketInfo);

/// Invoked for asynchronous failures (attempt exhaustion, enqueue
/// rejections, id-scan failure).
pub type ErrorCallback = fn(error: BusError);

fn default_receiver(_payload: &[u8], _info: &PacketInfo) {}

fn default_error(_error: BusError) {}

//==================================================================================BUS

/// Multi-master bus endpoint over a byte-channel strategy `S` and a clock
/// port `C`.
///
/// Defaults: half-duplex, acknowledge on, auto-delete on, sender info off,
/// router off, shared iff the bus id differs from
/// [`BusId::LOCALHOST`].
pub struct Bus<S: BusStrategy, C: Clock> {
    strategy: S,
    clock: C,
    queue: OutboundQueue,
    last_packet_info: PacketInfo,
    device_id: u8,
    bus_id: BusId,
    mode: CommunicationMode,
    shared: bool,
    router: bool,
    acknowledge: bool,
    include_sender_info: bool,
    auto_delete: bool,
    input_pin: u8,
    output_pin: u8,
    receiver: Receiver,
    error: ErrorCallback,
}

impl<S: BusStrategy, C: Clock> Bus<S, C> {
    /// Create an endpoint with no device id yet (acquire one with
    /// [`Bus::acquire_id`]).
    pub fn new(strategy: S, clock: C) -> Self {
        Self::with_bus(strategy, clock, BusId::LOCALHOST, NOT_ASSIGNED)
    }

    /// Create an endpoint on an isolated bus with a known device id.
    pub fn with_id(strategy: S, clock: C, device_id: u8) -> Self {
        Self::with_bus(strategy, clock, BusId::LOCALHOST, device_id)
    }

    /// Create an endpoint on a specific bus with a known device id.
    pub fn with_bus(strategy: S, clock: C, bus_id: BusId, device_id: u8) -> Self {
        Self {
            strategy,
            clock,
            queue: OutboundQueue::new(),
            last_packet_info: PacketInfo::default(),
            device_id,
            bus_id,
            mode: CommunicationMode::HalfDuplex,
            shared: !bus_id.is_localhost(),
            router: false,
            acknowledge: true,
            include_sender_info: false,
            auto_delete: true,
            input_pin: NOT_ASSIGNED,
            output_pin: NOT_ASSIGNED,
            receiver: default_receiver,
            error: default_error,
        }
    }

    /// Random startup pause bounded by [`INITIAL_MAX_DELAY_MS`], so that
    /// devices powering up together do not collide on their first frames.
    pub fn begin(&mut self) {
        let pause_ms = self.clock.rand_range(INITIAL_MAX_DELAY_MS);
        self.clock.delay_micros(pause_ms.saturating_mul(1_000));
    }

    //==================================================================================SEND

    /// Enqueue a one-shot packet for a device on our own bus.
    pub fn send(&mut self, destination: u8, payload: &[u8]) -> Result<usize, EnqueueError> {
        let bus_id = self.bus_id;
        self.dispatch(destination, bus_id, payload, 0, None)
    }

    /// Enqueue a one-shot packet for a device on another bus sharing the
    /// medium.
    pub fn send_to_bus(
        &mut self,
        destination: u8,
        bus_id: BusId,
        payload: &[u8],
    ) -> Result<usize, EnqueueError> {
        self.dispatch(destination, bus_id, payload, 0, None)
    }

    /// Enqueue a packet retransmitted every `timing` microseconds until
    /// [`Bus::remove`] is called on the returned slot.
    pub fn send_repeatedly(
        &mut self,
        destination: u8,
        payload: &[u8],
        timing: u32,
    ) -> Result<usize, EnqueueError> {
        let bus_id = self.bus_id;
        self.dispatch(destination, bus_id, payload, timing, None)
    }

    /// Repeat-scheduled variant of [`Bus::send_to_bus`].
    pub fn send_repeatedly_to_bus(
        &mut self,
        destination: u8,
        bus_id: BusId,
        payload: &[u8],
        timing: u32,
    ) -> Result<usize, EnqueueError> {
        self.dispatch(destination, bus_id, payload, timing, None)
    }

    /// Enqueue with an explicit header instead of the one composed from
    /// the controller configuration.
    pub fn send_with_header(
        &mut self,
        destination: u8,
        bus_id: BusId,
        payload: &[u8],
        timing: u32,
        header: HeaderFlags,
    ) -> Result<usize, EnqueueError> {
        self.dispatch(destination, bus_id, payload, timing, Some(header))
    }

    /// Answer the sender of the last accepted frame, typically from within
    /// the receive callback.
    ///
    /// Returns `None` when the last frame carried no usable sender
    /// identity (no sender info, or a broadcast sender) or when the
    /// enqueue failed; enqueue failures also reach the error callback.
    pub fn reply(&mut self, payload: &[u8]) -> Option<usize> {
        if self.last_packet_info.sender_id == BROADCAST {
            return None;
        }
        let destination = self.last_packet_info.sender_id;
        let bus_id = self.last_packet_info.sender_bus_id;
        self.dispatch(destination, bus_id, payload, 0, None).ok()
    }

    /// Cancel a pending or repeat-scheduled packet and free its slot.
    pub fn remove(&mut self, slot: usize) {
        self.queue.remove(slot);
    }

    /// Compose the header, serialize the body, and claim a queue slot.
    fn dispatch(
        &mut self,
        destination: u8,
        receiver_bus_id: BusId,
        payload: &[u8],
        timing: u32,
        custom_header: Option<HeaderFlags>,
    ) -> Result<usize, EnqueueError> {
        let header = custom_header.unwrap_or(HeaderFlags::from_config(
            self.shared,
            self.include_sender_info,
            self.acknowledge,
        ));

        let total = frame::payload_offset(header) + payload.len() + 1;
        if total >= PACKET_MAX_LENGTH {
            return self.reject(EnqueueError::ContentTooLong { length: total });
        }

        let mut body = PacketBuffer::new();
        frame::write_prefix(
            header,
            receiver_bus_id,
            self.bus_id,
            self.device_id,
            &mut body,
        );
        for byte in payload {
            body.push(*byte);
        }

        let now = self.clock.micros();
        match self
            .queue
            .insert(destination, header, body.as_slice(), timing, now)
        {
            Ok(slot) => Ok(slot),
            Err(err) => self.reject(err),
        }
    }

    /// Surface an enqueue failure through the error callback and the
    /// return value alike.
    fn reject(&mut self, err: EnqueueError) -> Result<usize, EnqueueError> {
        (self.error)(err.into());
        Err(err)
    }

    //==================================================================================SCHEDULER

    /// Scheduler tick: walk the slots in index order and drive every
    /// due packet through one transmission attempt.
    ///
    /// The due time of a slot is `registration + timing + attempts³`
    /// microseconds: one-shot packets retry aggressively with cubically
    /// growing spacing, repeat-scheduled ones add their base period.
    pub fn update(&mut self) {
        for index in 0..MAX_PACKETS {
            let Some(packet) = self.queue.slot(index).copied() else {
                continue;
            };
            if packet.state == SlotState::Free {
                continue;
            }

            let now = self.clock.micros();
            let due = packet.timing as u64 + (packet.attempts as u64).pow(3);
            if now.wrapping_sub(packet.registration) <= due {
                continue;
            }

            let config = self.link_config();
            let outcome = transmit_frame(
                &mut self.strategy,
                &mut self.clock,
                &config,
                packet.destination,
                packet.content.as_slice(),
                packet.header,
            );

            match outcome {
                TxOutcome::Ack => self.settle_delivered(index, &packet),
                TxOutcome::Fail => self.settle_failed(index, &packet),
                TxOutcome::Nak => self.set_state(index, SlotState::Nak),
                TxOutcome::Busy => self.set_state(index, SlotState::Busy),
            }
        }
    }

    /// Acknowledged attempt: drop one-shot slots (when auto-delete is on)
    /// or re-arm repeat-scheduled ones.
    fn settle_delivered(&mut self, index: usize, packet: &PendingPacket) {
        if packet.timing == 0 {
            if self.auto_delete {
                self.queue.remove(index);
            } else {
                self.set_state(index, SlotState::Ack);
            }
        } else {
            self.rearm(index);
        }
    }

    /// Failed attempt: count it, and past [`MAX_ATTEMPTS`] either adopt
    /// the probed id (acquisition probe) or report the lost connection.
    fn settle_failed(&mut self, index: usize, packet: &PendingPacket) {
        let attempts = packet.attempts.saturating_add(1);
        if let Some(slot) = self.queue.slot_mut(index) {
            slot.state = SlotState::Fail;
            slot.attempts = attempts;
        }

        if attempts <= MAX_ATTEMPTS {
            return;
        }

        if is_acquire_probe(packet) {
            // Silence across every attempt proves the probed id unused:
            // claim it.
            self.device_id = packet.destination;
            self.queue.remove(index);
            return;
        }

        #[cfg(feature = "defmt")]
        defmt::warn!(
            "Connection lost with device {} after {} attempts",
            packet.destination,
            attempts
        );
        (self.error)(BusError::ConnectionLost {
            device_id: packet.destination,
        });

        if packet.timing == 0 {
            if self.auto_delete {
                self.queue.remove(index);
            }
        } else {
            self.rearm(index);
        }
    }

    /// Re-arm a repeat-scheduled slot for its next period.
    fn rearm(&mut self, index: usize) {
        let now = self.clock.micros();
        if let Some(slot) = self.queue.slot_mut(index) {
            slot.state = SlotState::ToBeSent;
            slot.attempts = 0;
            slot.registration = now;
        }
    }

    fn set_state(&mut self, index: usize, state: SlotState) {
        if let Some(slot) = self.queue.slot_mut(index) {
            slot.state = state;
        }
    }

    //==================================================================================RECEIVE

    /// Try to receive one frame. On success the packet metadata is stored
    /// for [`Bus::reply`] and the payload is dispatched to the receiver
    /// callback, after the wire acknowledgement has been emitted.
    pub fn receive(&mut self) -> RxOutcome {
        let mut frame_buf = PacketBuffer::new();
        let config = self.link_config();
        let outcome = receive_frame(&mut self.strategy, &config, &mut frame_buf);

        if outcome == RxOutcome::Ack {
            let data = frame_buf.as_slice();
            self.last_packet_info = PacketInfo::from_frame(data);
            let offset = frame::payload_offset(self.last_packet_info.header);
            let payload = data.get(offset..data.len() - 1).unwrap_or(&[]);
            (self.receiver)(payload, &self.last_packet_info);
        }

        outcome
    }

    /// Poll [`Bus::receive`] for up to `duration` microseconds, stopping
    /// early on an accepted frame. Returns the last observed outcome.
    pub fn receive_for(&mut self, duration: u64) -> RxOutcome {
        let start = self.clock.micros();
        let mut outcome = RxOutcome::Fail;
        while self.clock.micros().wrapping_sub(start) <= duration {
            outcome = self.receive();
            if outcome == RxOutcome::Ack {
                return outcome;
            }
        }
        outcome
    }

    //==================================================================================ID_ACQUISITION

    /// Scan addresses `1..=254` for an unused device id and adopt it.
    ///
    /// Each candidate is probed with a single-byte [`ACQUIRE_ID`] packet:
    /// an acknowledged probe proves the id is taken and the scan moves on,
    /// while a probe that exhausts its attempts in silence proves the id
    /// free, at which point the scheduler claims it. Fails when the
    /// [`MAX_ID_SCAN_TIME_US`] window closes first.
    pub fn acquire_id(&mut self) -> Result<u8, AcquireIdError> {
        let start = self.clock.micros();
        let probe = [ACQUIRE_ID];

        for candidate in 1..NOT_ASSIGNED {
            if self.clock.micros().wrapping_sub(start) >= MAX_ID_SCAN_TIME_US {
                break;
            }

            #[cfg(feature = "defmt")]
            defmt::debug!("Probing device id {}", candidate);

            let Ok(slot) = self.send(candidate, &probe) else {
                return self.acquisition_failed();
            };

            while self.queue.is_pending(slot)
                && self.clock.micros().wrapping_sub(start) < MAX_ID_SCAN_TIME_US
            {
                self.update();
            }

            if self.device_id != NOT_ASSIGNED {
                #[cfg(feature = "defmt")]
                defmt::info!("Adopted device id {}", self.device_id);
                return Ok(self.device_id);
            }
        }

        self.acquisition_failed()
    }

    fn acquisition_failed(&mut self) -> Result<u8, AcquireIdError> {
        #[cfg(feature = "defmt")]
        defmt::warn!("Device id acquisition failed");
        (self.error)(BusError::IdAcquisitionFail);
        Err(AcquireIdError::NoFreeId)
    }

    //==================================================================================CONFIGURATION

    /// Current device id (watch out for id collisions when setting it by
    /// hand).
    pub fn device_id(&self) -> u8 {
        self.device_id
    }

    /// Set the device id.
    pub fn set_id(&mut self, device_id: u8) {
        self.device_id = device_id;
    }

    /// Current bus id.
    pub fn bus_id(&self) -> BusId {
        self.bus_id
    }

    /// Set the bus id; any id other than [`BusId::LOCALHOST`] switches the
    /// endpoint to shared-medium framing.
    pub fn set_bus_id(&mut self, bus_id: BusId) {
        self.bus_id = bus_id;
        self.shared = !bus_id.is_localhost();
    }

    /// Configure synchronous acknowledgement solicitation.
    pub fn set_acknowledge(&mut self, enabled: bool) {
        self.acknowledge = enabled;
    }

    /// Set the communication mode.
    pub fn set_communication_mode(&mut self, mode: CommunicationMode) {
        self.mode = mode;
    }

    /// Enable communication with devices on other bus ids sharing the
    /// medium, or isolate this endpoint from third-party traffic.
    pub fn set_shared_network(&mut self, shared: bool) {
        self.shared = shared;
    }

    /// Include our sender identity in outgoing packets so receivers can
    /// answer with [`Bus::reply`]. Off by default to keep frames short.
    pub fn include_sender_info(&mut self, enabled: bool) {
        self.include_sender_info = enabled;
    }

    /// Configure automatic slot release for delivered or undeliverable
    /// one-shot packets.
    pub fn set_packet_auto_deletion(&mut self, enabled: bool) {
        self.auto_delete = enabled;
    }

    /// Router mode: receive every frame regardless of address and bus id.
    pub fn set_router(&mut self, enabled: bool) {
        self.router = enabled;
    }

    /// Use one communication pin for both directions.
    pub fn set_pin(&mut self, pin: u8) {
        self.input_pin = pin;
        self.output_pin = pin;
    }

    /// Use a pair of communication pins. Leaving one side
    /// [`NOT_ASSIGNED`] degrades the endpoint to simplex.
    pub fn set_pins(&mut self, input_pin: u8, output_pin: u8) {
        self.input_pin = input_pin;
        self.output_pin = output_pin;

        if input_pin == NOT_ASSIGNED || output_pin == NOT_ASSIGNED {
            self.mode = CommunicationMode::Simplex;
        }
    }

    /// Recorded input pin handle.
    pub fn input_pin(&self) -> u8 {
        self.input_pin
    }

    /// Recorded output pin handle.
    pub fn output_pin(&self) -> u8 {
        self.output_pin
    }

    /// Install the frame receiver callback.
    pub fn set_receiver(&mut self, receiver: Receiver) {
        self.receiver = receiver;
    }

    /// Install the error callback.
    pub fn set_error(&mut self, error: ErrorCallback) {
        self.error = error;
    }

    /// Metadata of the last accepted frame.
    pub fn last_packet_info(&self) -> &PacketInfo {
        &self.last_packet_info
    }

    /// State of a queue slot, for cooperative polling of a pending send.
    pub fn packet_state(&self, slot: usize) -> Option<SlotState> {
        self.queue.slot(slot).map(|packet| packet.state)
    }

    fn link_config(&self) -> LinkConfig {
        LinkConfig {
            device_id: self.device_id,
            bus_id: self.bus_id,
            mode: self.mode,
            shared: self.shared,
            router: self.router,
            acknowledge: self.acknowledge,
        }
    }
}

/// Whether a slot carries the single-byte id-acquisition probe.
fn is_acquire_probe(packet: &PendingPacket) -> bool {
    let prefix = packet.header.prefix_len();
    packet.content.len() == prefix + 1 && packet.content.as_slice()[prefix] == ACQUIRE_ID
}
