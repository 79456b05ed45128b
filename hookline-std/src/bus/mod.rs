//! Bus client implementations.
//!
//! - [`InMemoryBus`] - In-process bus over tokio channels
//! - [`NatsConnector`] / [`NatsBus`] - NATS adapter (`nats` feature)

pub mod memory;
#[cfg(feature = "nats")]
pub mod nats;

pub use memory::InMemoryBus;
#[cfg(feature = "nats")]
pub use nats::{NatsBus, NatsConnector};
