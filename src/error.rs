//! Error definitions shared across library modules.
//! Local resource failures are surfaced synchronously at enqueue; wire
//! conditions stay in the slot state and never reach these types.
use thiserror_no_std::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failures detected while inserting a packet into the outbound queue.
pub enum EnqueueError {
    /// Prefix, payload, and CRC would not fit inside one frame.
    #[error("Content too long: {length} bytes")]
    ContentTooLong { length: usize },

    /// No memory available for the packet content. Queue slots carry a
    /// fixed inline buffer, so this kind is kept for the error taxonomy but
    /// is never raised by this implementation.
    #[error("Memory full")]
    MemoryFull,

    /// Every slot of the outbound queue is occupied.
    #[error("Packets buffer full: {capacity} slots")]
    PacketsBufferFull { capacity: usize },
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Failure of the device-id acquisition scan.
pub enum AcquireIdError {
    /// The scan window closed without adopting an id.
    #[error("No unused device id was found")]
    NoFreeId,
}

//==================================================================================BUS_ERROR

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
/// Conditions reported through the controller's error callback, each
/// carrying the datum of the original numeric `(code, data)` pair.
pub enum BusError {
    /// A packet exhausted its attempts toward this destination.
    #[error("Connection lost with device {device_id}")]
    ConnectionLost { device_id: u8 },

    /// Enqueue failed because every slot was occupied.
    #[error("Packets buffer full: {capacity} slots")]
    PacketsBufferFull { capacity: usize },

    /// Enqueue failed for lack of content memory (never raised with inline
    /// slot buffers, see [`EnqueueError::MemoryFull`]).
    #[error("Memory full")]
    MemoryFull,

    /// Enqueue rejected an oversized content.
    #[error("Content too long: {length} bytes")]
    ContentTooLong { length: usize },

    /// The device-id scan ended without adopting an id.
    #[error("Device id acquisition failed")]
    IdAcquisitionFail,
}

impl From<EnqueueError> for BusError {
    fn from(err: EnqueueError) -> Self {
        match err {
            EnqueueError::ContentTooLong { length } => BusError::ContentTooLong { length },
            EnqueueError::MemoryFull => BusError::MemoryFull,
            EnqueueError::PacketsBufferFull { capacity } => {
                BusError::PacketsBufferFull { capacity }
            }
        }
    }
}
