//! Message ids and reserved bus addresses.
//!
//! Ids 0-3 are served by the bootloader during firmware update.
//! Ids 10-25 are served by the application firmware.

/// Address reserved for the firmware-update bootloader.
pub const BOOTLOADER_ID: u8 = 0xFE;

/// Address every node accepts.
pub const BROADCAST_ID: u8 = 0xFF;

/// Address the host uses as transmitter unless configured otherwise.
pub const DEFAULT_HOST_ID: u8 = 13;

/// Stable wire values of the bus message ids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MessageId {
    EnterFirmwareUpdaterMode = 0,
    FirmwarePacketStart = 1,
    FirmwarePacket = 2,
    FirmwarePacketEnd = 3,
    GetVersion = 10,
    AutoAddressingInit = 11,
    AutoAddressingSetNewId = 12,
    StartBatchMeasurement = 13,
    GetBatchMeasurement = 14,
    GetClearance = 15,
    GetCrest = 16,
    GetGrms = 17,
    GetKurtosis = 18,
    GetSkewness = 19,
    GetBatchMeasurementChunk = 20,
    AutoAddressingIntegrityCheck = 21,
    GetAllTelemetry = 22,
    GetVrms = 23,
    GetPeak = 24,
    GetSum = 25,
}

impl MessageId {
    /// Every known id, in wire order.
    pub const ALL: [MessageId; 20] = [
        MessageId::EnterFirmwareUpdaterMode,
        MessageId::FirmwarePacketStart,
        MessageId::FirmwarePacket,
        MessageId::FirmwarePacketEnd,
        MessageId::GetVersion,
        MessageId::AutoAddressingInit,
        MessageId::AutoAddressingSetNewId,
        MessageId::StartBatchMeasurement,
        MessageId::GetBatchMeasurement,
        MessageId::GetClearance,
        MessageId::GetCrest,
        MessageId::GetGrms,
        MessageId::GetKurtosis,
        MessageId::GetSkewness,
        MessageId::GetBatchMeasurementChunk,
        MessageId::AutoAddressingIntegrityCheck,
        MessageId::GetAllTelemetry,
        MessageId::GetVrms,
        MessageId::GetPeak,
        MessageId::GetSum,
    ];

    /// Look up a wire value.
    pub fn from_u8(value: u8) -> Option<Self> {
        Self::ALL.iter().copied().find(|id| *id as u8 == value)
    }

    /// Wire value.
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Human-readable name, matching the device firmware's message table.
    pub fn name(self) -> &'static str {
        match self {
            MessageId::EnterFirmwareUpdaterMode => "ENTER_FIRMWARE_UPDATER_MODE",
            MessageId::FirmwarePacketStart => "FIRMWARE_PACKET_START",
            MessageId::FirmwarePacket => "FIRMWARE_PACKET",
            MessageId::FirmwarePacketEnd => "FIRMWARE_PACKET_END",
            MessageId::GetVersion => "GET_VERSION",
            MessageId::AutoAddressingInit => "AUTO_ADDRESSING_INIT",
            MessageId::AutoAddressingSetNewId => "AUTO_ADDRESSING_SET_NEW_ID",
            MessageId::StartBatchMeasurement => "START_BATCH_MEASUREMENT",
            MessageId::GetBatchMeasurement => "GET_BATCH_MEASUREMENT",
            MessageId::GetClearance => "GET_CLEARANCE",
            MessageId::GetCrest => "GET_CREST",
            MessageId::GetGrms => "GET_GRMS",
            MessageId::GetKurtosis => "GET_KURTOSIS",
            MessageId::GetSkewness => "GET_SKEWNESS",
            MessageId::GetBatchMeasurementChunk => "GET_BATCH_MEASUREMENT_CHUNK",
            MessageId::AutoAddressingIntegrityCheck => "AUTO_ADDRESSING_INTEGRITY_CHECK",
            MessageId::GetAllTelemetry => "GET_ALL_TELEMETRY",
            MessageId::GetVrms => "GET_VRMS",
            MessageId::GetPeak => "GET_PEAK",
            MessageId::GetSum => "GET_SUM",
        }
    }
}

impl From<MessageId> for u8 {
    fn from(id: MessageId) -> Self {
        id as u8
    }
}

/// Returns a human-readable name for a raw message id.
pub fn message_name(id: u8) -> &'static str {
    MessageId::from_u8(id).map_or("UNKNOWN", MessageId::name)
}

/// Returns true if the id is handled by the bootloader.
pub fn is_bootloader_message(id: u8) -> bool {
    id <= MessageId::FirmwarePacketEnd as u8
}
