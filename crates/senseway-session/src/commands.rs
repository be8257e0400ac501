//! Single-request commands understood by the application firmware.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use serde::Serialize;
use senseway_frame::{Frame, MessageId, Status, BROADCAST_ID};
use tracing::{debug, info, warn};

use crate::correlator::{Conversation, ResponseMatch};
use crate::error::{Result, SessionError};
use crate::mac::MacAddress;
use crate::session::Session;
use crate::telemetry::{decode_metric, Axes, Metric, TelemetrySnapshot};

/// Payload of a MAC address query.
const MAC_QUERY: [u8; 5] = [0; 5];

/// Application firmware version of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct FirmwareVersion {
    pub major: u8,
    pub minor: u8,
    pub patch: u8,
}

impl FirmwareVersion {
    /// Decode a get-version reply: patch, minor, major.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        match payload {
            [patch, minor, major, ..] => Ok(Self {
                major: *major,
                minor: *minor,
                patch: *patch,
            }),
            _ => Err(SessionError::ProtocolMismatch(format!(
                "version reply has {} bytes, expected 3",
                payload.len()
            ))),
        }
    }
}

impl fmt::Display for FirmwareVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// A node that answered a discovery broadcast.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DiscoveredNode {
    pub id: u8,
    pub mac: MacAddress,
}

/// Status byte at the start of a reply payload.
pub(crate) fn status_of(frame: &Frame) -> Option<Status> {
    frame.payload.first().copied().and_then(Status::from_u8)
}

/// Check an acknowledgment of the form `[status, mac...]`.
pub(crate) fn verify_ack(frame: &Frame, mac: &MacAddress) -> Result<()> {
    match status_of(frame) {
        Some(Status::Success) => {}
        status => {
            return Err(SessionError::ProtocolMismatch(format!(
                "acknowledgment carries status {}",
                status.map_or_else(|| "none".to_string(), |status| status.to_string())
            )))
        }
    }
    match MacAddress::from_prefix(frame.payload.get(1..).unwrap_or_default()) {
        Some(echoed) if echoed == *mac => Ok(()),
        Some(echoed) => Err(SessionError::ProtocolMismatch(format!(
            "acknowledgment from {echoed}, expected {mac}"
        ))),
        None => Err(SessionError::ProtocolMismatch(
            "acknowledgment is missing the MAC address".to_string(),
        )),
    }
}

impl Conversation<'_> {
    fn command(&mut self, device_id: u8, message: MessageId, payload: &[u8]) -> Result<Frame> {
        let timeout = self.session().config().command_timeout;
        self.send_and_wait(device_id, message, payload, timeout)
    }

    /// Query the application firmware version.
    pub fn get_version(&mut self, device_id: u8) -> Result<FirmwareVersion> {
        let frame = self.command(device_id, MessageId::GetVersion, &[])?;
        FirmwareVersion::decode(&frame.payload)
    }

    /// Query the hardware address.
    pub fn get_mac_address(&mut self, device_id: u8) -> Result<MacAddress> {
        let frame = self.command(device_id, MessageId::AutoAddressingInit, &MAC_QUERY)?;
        MacAddress::from_prefix(&frame.payload).ok_or_else(|| {
            SessionError::ProtocolMismatch(format!(
                "MAC reply has {} bytes, expected {}",
                frame.payload.len(),
                MacAddress::LEN
            ))
        })
    }

    /// Query every vibration metric at once.
    pub fn get_all_telemetry(&mut self, device_id: u8) -> Result<TelemetrySnapshot> {
        let frame = self.command(device_id, MessageId::GetAllTelemetry, &[])?;
        TelemetrySnapshot::decode(&frame.payload)
    }

    /// Query one vibration metric.
    pub fn get_metric(&mut self, device_id: u8, metric: Metric) -> Result<Axes> {
        let message = metric.message_id().ok_or_else(|| {
            SessionError::InvalidParameter(format!("{metric} can only be read from a telemetry snapshot"))
        })?;
        let frame = self.command(device_id, message, &[])?;
        decode_metric(&frame.payload)
    }

    /// Broadcast a MAC query and collect every answer until the bus stays
    /// quiet for `quiet_period`.
    pub fn discover(&mut self, quiet_period: Duration) -> Result<Vec<DiscoveredNode>> {
        self.send(BROADCAST_ID, MessageId::AutoAddressingInit, &MAC_QUERY)?;

        let expect = ResponseMatch::message(MessageId::AutoAddressingInit);
        let mut nodes = BTreeMap::new();
        loop {
            let frame = match self.recv(expect, quiet_period) {
                Ok(frame) => frame,
                Err(SessionError::Timeout(_)) => break,
                Err(err) => return Err(err),
            };
            let Some(mac) = MacAddress::from_prefix(&frame.payload) else {
                warn!(from = frame.transmitter_id, len = frame.payload.len(), "ignoring short discovery reply");
                continue;
            };
            debug!(id = frame.transmitter_id, %mac, "node answered discovery");
            if let Some(previous) = nodes.insert(frame.transmitter_id, mac) {
                if previous != mac {
                    warn!(id = frame.transmitter_id, %previous, %mac, "two nodes share one id");
                }
            }
        }

        Ok(nodes
            .into_iter()
            .map(|(id, mac)| DiscoveredNode { id, mac })
            .collect())
    }

    /// Give the node with hardware address `mac` a new bus id.
    ///
    /// The reply may come from either id, so only the message id and the
    /// echoed MAC are checked.
    pub fn set_device_id(&mut self, device_id: u8, mac: &MacAddress, new_id: u8) -> Result<()> {
        if matches!(new_id, senseway_frame::BOOTLOADER_ID | BROADCAST_ID) {
            return Err(SessionError::InvalidParameter(format!(
                "id {new_id:#04X} is reserved"
            )));
        }
        let mut payload = mac.as_bytes().to_vec();
        payload.push(new_id);

        let message = MessageId::AutoAddressingSetNewId;
        self.send(device_id, message, &payload)?;
        let timeout = self.session().config().command_timeout;
        let frame = self.recv(ResponseMatch::message(message), timeout)?;
        verify_ack(&frame, mac)?;
        info!(%mac, from = device_id, to = new_id, "device id assigned");
        Ok(())
    }

    /// Ask a node to confirm its addressing state.
    pub fn integrity_check(&mut self, device_id: u8) -> Result<()> {
        let frame = self.command(device_id, MessageId::AutoAddressingIntegrityCheck, &[])?;
        match status_of(&frame) {
            Some(Status::Success) => Ok(()),
            status => Err(SessionError::ProtocolMismatch(format!(
                "integrity check failed with status {status:?}"
            ))),
        }
    }
}

impl Session {
    /// See [`Conversation::get_version`].
    pub fn get_version(&self, device_id: u8) -> Result<FirmwareVersion> {
        self.conversation().get_version(device_id)
    }

    /// See [`Conversation::get_mac_address`].
    pub fn get_mac_address(&self, device_id: u8) -> Result<MacAddress> {
        self.conversation().get_mac_address(device_id)
    }

    /// See [`Conversation::get_all_telemetry`].
    pub fn get_all_telemetry(&self, device_id: u8) -> Result<TelemetrySnapshot> {
        self.conversation().get_all_telemetry(device_id)
    }

    /// See [`Conversation::get_metric`].
    pub fn get_metric(&self, device_id: u8, metric: Metric) -> Result<Axes> {
        self.conversation().get_metric(device_id, metric)
    }

    /// See [`Conversation::discover`].
    pub fn discover(&self, quiet_period: Duration) -> Result<Vec<DiscoveredNode>> {
        self.conversation().discover(quiet_period)
    }

    /// See [`Conversation::set_device_id`].
    pub fn set_device_id(&self, device_id: u8, mac: &MacAddress, new_id: u8) -> Result<()> {
        self.conversation().set_device_id(device_id, mac, new_id)
    }

    /// See [`Conversation::integrity_check`].
    pub fn integrity_check(&self, device_id: u8) -> Result<()> {
        self.conversation().integrity_check(device_id)
    }
}
