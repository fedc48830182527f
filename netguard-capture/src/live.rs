//! Live capture through libpcap.

use pcap::{Active, Capture, Device};

use crate::frame::{Frame, LinkType};
use crate::source::{
    CaptureError, CaptureSource, Next, SourceOpener, DEFAULT_POLL_TIMEOUT_MS, DEFAULT_SNAPLEN,
};

fn link_type(dlt: pcap::Linktype) -> LinkType {
    match dlt.0 {
        1 => LinkType::Ethernet,
        113 => LinkType::LinuxSll,
        12 | 101 | 228 => LinkType::RawIp,
        other => LinkType::Unknown(other),
    }
}

fn open_error(device: &str, err: pcap::Error) -> CaptureError {
    let reason = err.to_string();
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("not permitted") {
        CaptureError::InsufficientPermissions {
            device: device.to_string(),
        }
    } else {
        CaptureError::Open {
            device: device.to_string(),
            reason,
        }
    }
}

/// Live capture on one network device.
pub struct PcapSource {
    device: String,
    link_type: LinkType,
    capture: Capture<Active>,
}

impl CaptureSource for PcapSource {
    fn next_frame(&mut self) -> Result<Next, CaptureError> {
        match self.capture.next_packet() {
            Ok(packet) => Ok(Next::Frame(Frame {
                link_type: self.link_type,
                data: packet.data.to_vec(),
                wire_len: packet.header.len,
            })),
            Err(pcap::Error::TimeoutExpired) => Ok(Next::Timeout),
            Err(pcap::Error::NoMorePackets) => Ok(Next::Closed),
            Err(e) => Err(CaptureError::Read(e.to_string())),
        }
    }

    fn describe(&self) -> String {
        format!("pcap:{}", self.device)
    }
}

/// Opens live captures with fixed settings.
#[derive(Debug, Clone)]
pub struct PcapOpener {
    /// Device name; `None` picks pcap's default device.
    pub device: Option<String>,
    pub snaplen: i32,
    pub poll_timeout_ms: i32,
    pub promiscuous: bool,
}

impl Default for PcapOpener {
    fn default() -> Self {
        Self {
            device: None,
            snaplen: DEFAULT_SNAPLEN,
            poll_timeout_ms: DEFAULT_POLL_TIMEOUT_MS,
            promiscuous: true,
        }
    }
}

impl PcapOpener {
    pub fn new(device: Option<String>) -> Self {
        Self {
            device,
            ..Self::default()
        }
    }

    fn resolve_device(&self) -> Result<String, CaptureError> {
        if let Some(device) = &self.device {
            return Ok(device.clone());
        }
        Device::lookup()
            .map_err(|e| CaptureError::Open {
                device: "default".to_string(),
                reason: e.to_string(),
            })?
            .map(|d| d.name)
            .ok_or(CaptureError::NoDevice)
    }
}

impl SourceOpener for PcapOpener {
    type Source = PcapSource;

    fn open(&self) -> Result<PcapSource, CaptureError> {
        let device = self.resolve_device()?;
        let capture = Capture::from_device(device.as_str())
            .map_err(|e| open_error(&device, e))?
            .promisc(self.promiscuous)
            .snaplen(self.snaplen)
            .timeout(self.poll_timeout_ms)
            .open()
            .map_err(|e| open_error(&device, e))?;

        Ok(PcapSource {
            link_type: link_type(capture.get_datalink()),
            device,
            capture,
        })
    }
}
