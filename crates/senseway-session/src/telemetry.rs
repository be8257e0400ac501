//! Vibration metrics reported by a node.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;
use senseway_frame::{MessageId, Status};

use crate::error::{Result, SessionError};

/// One value per accelerometer axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct Axes {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

impl Axes {
    /// Bytes on the wire: three little-endian `f64`.
    pub const WIRE_SIZE: usize = 24;

    fn decode(bytes: &[u8]) -> Self {
        let at = |i: usize| {
            let mut raw = [0u8; 8];
            raw.copy_from_slice(&bytes[i * 8..i * 8 + 8]);
            f64::from_le_bytes(raw)
        };
        Self {
            x: at(0),
            y: at(1),
            z: at(2),
        }
    }
}

/// Named vibration metric.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Metric {
    Clearance,
    Crest,
    Grms,
    Kurtosis,
    Skewness,
    Vrms,
    Peak,
    Sum,
    PeakToPeak,
}

impl Metric {
    /// Snapshot order.
    pub const ALL: [Metric; 9] = [
        Metric::Clearance,
        Metric::Crest,
        Metric::Grms,
        Metric::Kurtosis,
        Metric::Skewness,
        Metric::Vrms,
        Metric::Peak,
        Metric::Sum,
        Metric::PeakToPeak,
    ];

    /// Message that queries this metric alone. Peak-to-peak is only
    /// available as part of a telemetry snapshot.
    pub fn message_id(self) -> Option<MessageId> {
        match self {
            Metric::Clearance => Some(MessageId::GetClearance),
            Metric::Crest => Some(MessageId::GetCrest),
            Metric::Grms => Some(MessageId::GetGrms),
            Metric::Kurtosis => Some(MessageId::GetKurtosis),
            Metric::Skewness => Some(MessageId::GetSkewness),
            Metric::Vrms => Some(MessageId::GetVrms),
            Metric::Peak => Some(MessageId::GetPeak),
            Metric::Sum => Some(MessageId::GetSum),
            Metric::PeakToPeak => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Metric::Clearance => "clearance",
            Metric::Crest => "crest",
            Metric::Grms => "grms",
            Metric::Kurtosis => "kurtosis",
            Metric::Skewness => "skewness",
            Metric::Vrms => "vrms",
            Metric::Peak => "peak",
            Metric::Sum => "sum",
            Metric::PeakToPeak => "peak-to-peak",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Metric {
    type Err = SessionError;

    fn from_str(s: &str) -> Result<Self> {
        let wanted = s.to_ascii_lowercase().replace('_', "-");
        Metric::ALL
            .into_iter()
            .find(|metric| metric.name() == wanted)
            .ok_or_else(|| SessionError::InvalidParameter(format!("unknown metric: {s:?}")))
    }
}

/// Decoded reply to a get-all-telemetry request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TelemetrySnapshot {
    /// Device status byte.
    pub status: u8,
    /// Degrees Celsius.
    pub temperature: f64,
    /// Calibrated sampling frequency in Hz.
    pub sampling_frequency: u32,
    pub clearance: Axes,
    pub crest: Axes,
    pub grms: Axes,
    pub kurtosis: Axes,
    pub skewness: Axes,
    pub vrms: Axes,
    pub peak: Axes,
    pub sum: Axes,
    pub peak_to_peak: Axes,
}

impl TelemetrySnapshot {
    /// Payload size of a complete snapshot.
    pub const WIRE_SIZE: usize = 1 + 2 + 4 + 9 * Axes::WIRE_SIZE;

    /// Decode a get-all-telemetry payload.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        if payload.len() < Self::WIRE_SIZE {
            return Err(SessionError::ProtocolMismatch(format!(
                "telemetry payload has {} bytes, expected {}",
                payload.len(),
                Self::WIRE_SIZE
            )));
        }
        let status = payload[0];
        if !Status::from_u8(status).is_some_and(Status::is_ok) {
            return Err(SessionError::ProtocolMismatch(format!(
                "telemetry reply carries status {status}"
            )));
        }

        let temperature = u16::from_le_bytes([payload[1], payload[2]]);
        let sampling_frequency = u32::from_le_bytes([payload[3], payload[4], payload[5], payload[6]]);
        let axes = |index: usize| {
            let start = 7 + index * Axes::WIRE_SIZE;
            Axes::decode(&payload[start..start + Axes::WIRE_SIZE])
        };

        Ok(Self {
            status,
            temperature: f64::from(temperature) / 100.0,
            sampling_frequency,
            clearance: axes(0),
            crest: axes(1),
            grms: axes(2),
            kurtosis: axes(3),
            skewness: axes(4),
            vrms: axes(5),
            peak: axes(6),
            sum: axes(7),
            peak_to_peak: axes(8),
        })
    }

    /// Value of one metric.
    pub fn metric(&self, metric: Metric) -> Axes {
        match metric {
            Metric::Clearance => self.clearance,
            Metric::Crest => self.crest,
            Metric::Grms => self.grms,
            Metric::Kurtosis => self.kurtosis,
            Metric::Skewness => self.skewness,
            Metric::Vrms => self.vrms,
            Metric::Peak => self.peak,
            Metric::Sum => self.sum,
            Metric::PeakToPeak => self.peak_to_peak,
        }
    }
}

/// Decode a single-metric reply: `[status, x, y, z]`.
pub(crate) fn decode_metric(payload: &[u8]) -> Result<Axes> {
    let status = payload.first().copied();
    if !status.and_then(Status::from_u8).is_some_and(Status::is_ok) {
        return Err(SessionError::ProtocolMismatch(format!(
            "metric reply carries status {status:?}"
        )));
    }
    if payload.len() < 1 + Axes::WIRE_SIZE {
        return Err(SessionError::ProtocolMismatch(format!(
            "metric payload has {} bytes, expected {}",
            payload.len(),
            1 + Axes::WIRE_SIZE
        )));
    }
    Ok(Axes::decode(&payload[1..1 + Axes::WIRE_SIZE]))
}

#[cfg(test)]
pub(crate) fn encode_snapshot(temperature: u16, frequency: u32, fill: impl Fn(usize) -> Axes) -> Vec<u8> {
    let mut payload = vec![Status::Success as u8];
    payload.extend_from_slice(&temperature.to_le_bytes());
    payload.extend_from_slice(&frequency.to_le_bytes());
    for index in 0..9 {
        let axes = fill(index);
        for value in [axes.x, axes.y, axes.z] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
    }
    payload
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(index: usize) -> Axes {
        let base = index as f64;
        Axes {
            x: base + 0.25,
            y: base + 0.5,
            z: base + 0.75,
        }
    }

    #[test]
    fn decodes_full_snapshot() {
        let payload = encode_snapshot(2550, 12_800, sample);
        assert_eq!(payload.len(), TelemetrySnapshot::WIRE_SIZE);

        let snapshot = TelemetrySnapshot::decode(&payload).unwrap();
        assert!((snapshot.temperature - 25.50).abs() < 1e-9);
        assert_eq!(snapshot.sampling_frequency, 12_800);
        for (index, metric) in Metric::ALL.into_iter().enumerate() {
            assert_eq!(snapshot.metric(metric), sample(index), "{metric}");
        }
    }

    #[test]
    fn short_payload_is_a_mismatch() {
        let payload = encode_snapshot(2550, 12_800, sample);
        let err = TelemetrySnapshot::decode(&payload[..100]).unwrap_err();
        assert!(matches!(err, SessionError::ProtocolMismatch(_)));
    }

    #[test]
    fn error_status_is_a_mismatch() {
        let mut payload = encode_snapshot(2550, 12_800, sample);
        payload[0] = Status::Error as u8;
        assert!(TelemetrySnapshot::decode(&payload).is_err());

        payload[0] = Status::Data as u8;
        assert!(TelemetrySnapshot::decode(&payload).is_ok());
    }

    #[test]
    fn metric_names_round_trip() {
        for metric in Metric::ALL {
            assert_eq!(metric.name().parse::<Metric>().unwrap(), metric);
        }
        assert_eq!("PEAK_TO_PEAK".parse::<Metric>().unwrap(), Metric::PeakToPeak);
        assert!("rms".parse::<Metric>().is_err());
    }

    #[test]
    fn only_peak_to_peak_lacks_a_message() {
        let without: Vec<_> = Metric::ALL
            .into_iter()
            .filter(|metric| metric.message_id().is_none())
            .collect();
        assert_eq!(without, vec![Metric::PeakToPeak]);
        assert_eq!(Metric::Sum.message_id(), Some(MessageId::GetSum));
    }

    #[test]
    fn metric_reply_decodes_one_triple() {
        let mut payload = vec![Status::Success as u8];
        for value in [1.5f64, -2.0, 0.125] {
            payload.extend_from_slice(&value.to_le_bytes());
        }
        let axes = decode_metric(&payload).unwrap();
        assert_eq!(axes, Axes { x: 1.5, y: -2.0, z: 0.125 });

        assert!(decode_metric(&payload[..10]).is_err());
        assert!(decode_metric(&[]).is_err());
    }
}
