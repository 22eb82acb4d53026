//! `wirebus` library: a multi-master serial bus stack for `no_std`
//! environments. Up to 254 addressable devices exchange short CRC-checked
//! frames over a shared medium, with collision avoidance, synchronous
//! acknowledgement, retransmission with cubic backoff, and dynamic
//! device-id acquisition. The byte-level line coding and the clock are
//! abstracted behind traits so the core runs unchanged on any target.
#![no_std]
//==================================================================================
/// Shared protocol data types and constants.
pub mod core;
/// Domain errors (enqueue rejections, id acquisition, callback codes).
pub mod error;
/// Infrastructure shared by the protocol layers (CRC-8).
pub mod infra;
/// Protocol implementation: transport engines and the bus controller.
pub mod protocol;
//==================================================================================
