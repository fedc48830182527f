//! NetGuard Record Model
//!
//! Defines the packet record written by the capture engine and read back by
//! every consumer.

mod record;

pub use record::{NewRecord, PacketRecord, Protocol, RecordError, RecordId};
