//! NetGuard capture support
//!
//! This crate provides:
//! - Frame decoding down to the transport header (Ethernet, VLAN, SLL, raw IP)
//! - Classification of decoded frames into protocol and flags
//! - `CaptureSource` abstraction with a scripted implementation for testing
//! - Live pcap capture behind the `pcap` feature
//! - Synthetic frame builders for tests behind the `test-support` feature

pub mod classify;
pub mod frame;
pub mod source;
#[cfg(any(test, feature = "test-support"))]
pub mod synth;

#[cfg(feature = "pcap")]
pub mod live;

pub use classify::{classify, render_tcp_flags, tcp_flags, Classification};
pub use frame::{decode, DecodeError, Frame, Ipv4Layer, LayerInfo, LinkType, Transport};
pub use source::{
    CaptureError, CaptureSource, Next, ScriptStep, ScriptedOpener, ScriptedSource, SourceOpener,
    DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SNAPLEN,
};

#[cfg(feature = "pcap")]
pub use live::{PcapOpener, PcapSource};
