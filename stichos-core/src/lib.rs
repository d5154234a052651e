//! Line serialization between an interrupt-context producer and a
//! task-context consumer
//!
//! This crate frames a continuous byte stream (bytes arriving one at a
//! time, e.g. from a UART receive interrupt) into discrete,
//! length-bounded line records and hands completed records to a
//! lower-priority consumer:
//!
//! - [`ring::LineRing`] - lock-free SPSC ring of fixed-capacity line
//!   slots with an incremental-write/commit producer API and a
//!   pop-oldest consumer API
//! - [`rx::LineFramer`] - byte-at-a-time assembler that drives the
//!   producer half from a receive path, committing on a terminator byte
//!
//! The surrounding system supplies the byte source, the wake signal
//! used to rouse the consumer after each commit, and the two execution
//! contexts; none of those touch the ring's internals.

#![cfg_attr(not(any(test, feature = "std")), no_std)]

extern crate alloc;

pub mod ring;
pub mod rx;

// Re-export key types at crate root for convenience
pub use ring::{Error, LineGuard, LineReader, LineRing, LineWriter, WriteHandle, LINE_TERMINATOR};
pub use rx::{ByteSource, FeedStatus, LineFramer, DEFAULT_TERMINATOR};
