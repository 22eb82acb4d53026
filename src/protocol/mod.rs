//! Protocol logic: byte-channel transport (framing and engines) and the
//! bus controller with its scheduler and id acquisition.
pub mod bus;
pub mod transport;
