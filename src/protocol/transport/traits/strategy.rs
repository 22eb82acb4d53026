//! Minimal abstraction for the byte-level channel. Allows the stack to
//! plug into various line codings (bit-banged single wire, oversampled
//! radio, a test double) without knowing their timings.

/// Contract for carrier sensing and synchronous byte exchange.
///
/// Every operation blocks within a bounded, strategy-defined timeout.
/// Values wider than one octet use [`FAIL`](crate::core::FAIL) as the
/// out-of-band failure sentinel.
pub trait BusStrategy {
    /// Carrier sense: `true` iff the medium appears idle and a
    /// transmission can start.
    fn can_start(&mut self) -> bool;

    /// Transmit one octet.
    fn send_byte(&mut self, byte: u8);

    /// Retrieve one octet: `0..=255` on success,
    /// [`FAIL`](crate::core::FAIL) on timeout or noise.
    fn receive_byte(&mut self) -> u16;

    /// Emit a raw control symbol ([`ACK`](crate::core::ACK) or
    /// [`NAK`](crate::core::NAK)).
    fn send_response(&mut self, response: u8);

    /// Await a control symbol: the observed value, or
    /// [`FAIL`](crate::core::FAIL) when none arrives in time.
    fn receive_response(&mut self) -> u16;
}
