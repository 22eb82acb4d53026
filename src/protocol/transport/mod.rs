//! Transport layer: frame wire layout, the transmit and receive engines,
//! and the abstraction traits they consume.
//!
//! ## Timing constants
//!
//! These constants bound the randomized delays the stack uses to keep
//! colliding masters apart on a shared medium.
use crate::core::{BusId, CommunicationMode};

pub mod frame;
pub mod rx;
pub mod traits;
pub mod tx;

/// Maximum random startup delay (ms).
///
/// Applied once by `begin()`: devices powering up together would otherwise
/// probe the medium in lockstep and collide on their very first frames.
pub const INITIAL_MAX_DELAY_MS: u32 = 1000;

/// Maximum random delay after a collision (µs).
///
/// Drawn fresh after every NAK or garbled acknowledgement so that two
/// masters that collided once resample different slots on the retry.
pub const COLLISION_MAX_DELAY_US: u32 = 16;

/// Window granted to a full device-id scan (µs).
///
/// Probing all 254 candidate addresses with attempt exhaustion on the free
/// one fits comfortably inside five seconds on the supported line codings;
/// a bus slower than that should raise this bound.
pub const MAX_ID_SCAN_TIME_US: u64 = 5_000_000;

//==================================================================================LINK_CONFIG

/// Wire-facing snapshot of the controller configuration, handed to the
/// engines so they stay independent from the controller type.
#[derive(Debug, Clone, Copy)]
pub struct LinkConfig {
    /// Our own device id.
    pub device_id: u8,
    /// Our own bus id.
    pub bus_id: BusId,
    /// Physical channel arrangement.
    pub mode: CommunicationMode,
    /// Whether we operate on a shared medium (bus-id fields on the wire).
    pub shared: bool,
    /// Router mode: address and bus-id filtering disabled.
    pub router: bool,
    /// Whether we solicit synchronous acknowledgements.
    pub acknowledge: bool,
}
