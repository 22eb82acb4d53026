//! Clock abstraction providing the timing and randomness primitives
//! required by the scheduler, collision avoidance, and the id scan.

/// Monotonic time, bounded sleep, and uniform randomness.
///
/// Seeding the random source is a construction-time concern of the
/// implementation (an ADC read, a hardware RNG, a fixed seed in tests).
pub trait Clock {
    /// Monotonic microsecond counter.
    fn micros(&mut self) -> u64;

    /// Block for `duration` microseconds.
    fn delay_micros(&mut self, duration: u32);

    /// Uniform random value in `[0, bound)`. `bound` is never zero at the
    /// call sites in this crate.
    fn rand_range(&mut self, bound: u32) -> u32;
}
