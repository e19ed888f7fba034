//! NATS transport for the Hexwatch world-state mirror.
//!
//! The world source answers JSON requests on three subjects (room list,
//! layout, terrain) and publishes one JSON entities message per tick on a
//! fourth. [`NatsConnector`] implements
//! [`SourceConnector`](hexwatch_core::source::SourceConnector) on top of
//! that contract; [`codec`] holds the decoding and error classification.

pub mod codec;
pub mod connector;

pub use connector::{NatsConnector, NatsSource};
