//! Batch accelerometer measurements.

use std::fmt;
use std::time::Duration;

use serde::Serialize;
use senseway_frame::{MessageId, Status};
use tracing::{debug, info};

use crate::correlator::{Conversation, ResponseMatch};
use crate::error::{Result, SessionError};
use crate::session::Session;

/// Exclusive upper bound on the samples of one batch.
pub const MAX_SAMPLE_COUNT: u32 = 1_000_000;

/// Bytes per sample on the wire: X, Y, Z as little-endian `i16`.
pub const SAMPLE_SIZE: usize = 6;

/// Chunk header: status and data length.
const CHUNK_HEADER: usize = 2;

/// Accelerometer full-scale range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum AccelRange {
    G2,
    G4,
    G8,
    G16,
}

impl AccelRange {
    /// Wire code.
    pub fn code(self) -> u8 {
        match self {
            AccelRange::G2 => 0,
            AccelRange::G4 => 1,
            AccelRange::G8 => 2,
            AccelRange::G16 => 3,
        }
    }

    /// Full scale in g.
    pub fn g(self) -> u32 {
        2 << self.code()
    }
}

impl TryFrom<u32> for AccelRange {
    type Error = SessionError;

    /// Accepts the full scale in g: 2, 4, 8 or 16.
    fn try_from(g: u32) -> Result<Self> {
        match g {
            2 => Ok(AccelRange::G2),
            4 => Ok(AccelRange::G4),
            8 => Ok(AccelRange::G8),
            16 => Ok(AccelRange::G16),
            other => Err(SessionError::InvalidParameter(format!(
                "range must be 2, 4, 8 or 16 g, got {other}"
            ))),
        }
    }
}

impl fmt::Display for AccelRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}G", self.g())
    }
}

/// Accelerometer sampling rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SampleRate {
    Hz800,
    Hz1600,
    Hz3200,
    Hz6400,
    Hz12800,
}

impl SampleRate {
    /// Wire code.
    pub fn code(self) -> u8 {
        match self {
            SampleRate::Hz800 => 0,
            SampleRate::Hz1600 => 1,
            SampleRate::Hz3200 => 2,
            SampleRate::Hz6400 => 3,
            SampleRate::Hz12800 => 4,
        }
    }

    pub fn hz(self) -> u32 {
        800 << self.code()
    }
}

impl TryFrom<u32> for SampleRate {
    type Error = SessionError;

    fn try_from(hz: u32) -> Result<Self> {
        match hz {
            800 => Ok(SampleRate::Hz800),
            1600 => Ok(SampleRate::Hz1600),
            3200 => Ok(SampleRate::Hz3200),
            6400 => Ok(SampleRate::Hz6400),
            12800 => Ok(SampleRate::Hz12800),
            other => Err(SessionError::InvalidParameter(format!(
                "frequency must be 800, 1600, 3200, 6400 or 12800 Hz, got {other}"
            ))),
        }
    }
}

impl fmt::Display for SampleRate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} Hz", self.hz())
    }
}

/// Parameters of one batch measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MeasurementRequest {
    pub range: AccelRange,
    pub rate: SampleRate,
    pub sample_count: u32,
    /// Wait for the node to report completion.
    pub notify_on_end: bool,
}

impl MeasurementRequest {
    /// Check the sample count; range and rate are valid by construction.
    pub fn validate(&self) -> Result<()> {
        validate_sample_count(self.sample_count)
    }

    /// Wire payload: range, rate, sample count (u32 LE), notify flag.
    pub fn payload(&self) -> [u8; 7] {
        let count = self.sample_count.to_le_bytes();
        [
            self.range.code(),
            self.rate.code(),
            count[0],
            count[1],
            count[2],
            count[3],
            u8::from(self.notify_on_end),
        ]
    }

    /// Upper bound on how long the node takes to finish.
    pub fn timeout(&self) -> Duration {
        measurement_timeout(self.sample_count, self.rate)
    }
}

/// Time allowed for a batch: acquisition time plus 100 ms per sample.
pub fn measurement_timeout(sample_count: u32, rate: SampleRate) -> Duration {
    let samples = f64::from(sample_count);
    Duration::from_secs_f64(samples / f64::from(rate.hz()) + 0.1 * samples)
}

fn validate_sample_count(sample_count: u32) -> Result<()> {
    if sample_count == 0 || sample_count >= MAX_SAMPLE_COUNT {
        return Err(SessionError::InvalidParameter(format!(
            "sample count must be between 1 and {}, got {sample_count}",
            MAX_SAMPLE_COUNT - 1
        )));
    }
    Ok(())
}

/// Samples downloaded from a node, scaled to physical units.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct BatchMeasurement {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
    pub z: Vec<f64>,
}

impl BatchMeasurement {
    pub fn len(&self) -> usize {
        self.x.len()
    }

    pub fn is_empty(&self) -> bool {
        self.x.is_empty()
    }
}

/// Decode interleaved X, Y, Z `i16` samples and scale them.
///
/// Trailing bytes that do not form a whole sample are ignored.
pub fn decode_samples(bytes: &[u8], coefficient: f64) -> BatchMeasurement {
    let count = bytes.len() / SAMPLE_SIZE;
    let mut out = BatchMeasurement {
        x: Vec::with_capacity(count),
        y: Vec::with_capacity(count),
        z: Vec::with_capacity(count),
    };
    let value = |lo: u8, hi: u8| f64::from(i16::from_le_bytes([lo, hi])) * coefficient;
    for sample in bytes.chunks_exact(SAMPLE_SIZE) {
        out.x.push(value(sample[0], sample[1]));
        out.y.push(value(sample[2], sample[3]));
        out.z.push(value(sample[4], sample[5]));
    }
    out
}

impl Conversation<'_> {
    /// Ask a node to start a batch measurement.
    ///
    /// With `notify_on_end` the call waits for the completion report for at
    /// most [`measurement_timeout`]; otherwise it returns once the request
    /// is written.
    pub fn start_batch_measurement(&mut self, device_id: u8, request: &MeasurementRequest) -> Result<()> {
        request.validate()?;
        info!(
            device = device_id,
            range = %request.range,
            rate = %request.rate,
            samples = request.sample_count,
            "starting batch measurement"
        );

        let message = MessageId::StartBatchMeasurement;
        self.send(device_id, message, &request.payload())?;
        if !request.notify_on_end {
            return Ok(());
        }

        let frame = self.recv(ResponseMatch::for_request(device_id, message), request.timeout())?;
        match frame.payload.first().copied().and_then(Status::from_u8) {
            Some(Status::Success) => Ok(()),
            other => Err(SessionError::ProtocolMismatch(format!(
                "measurement completion carries status {}",
                other.map_or_else(|| "none".to_string(), |status| status.to_string())
            ))),
        }
    }

    /// Download the samples of the last batch and scale them by `coefficient`.
    pub fn read_measurement(&mut self, device_id: u8, sample_count: u32, coefficient: f64) -> Result<BatchMeasurement> {
        validate_sample_count(sample_count)?;
        let expected = sample_count as usize * SAMPLE_SIZE;
        let end = u32::try_from(expected)
            .map_err(|_| SessionError::InvalidParameter(format!("sample count {sample_count} too large")))?;

        let mut payload = [0u8; 8];
        payload[4..].copy_from_slice(&end.to_le_bytes());
        self.send(device_id, MessageId::GetBatchMeasurement, &payload)?;

        let expect = ResponseMatch::for_request(device_id, MessageId::GetBatchMeasurementChunk);
        let timeout = self.session().config().command_timeout;
        let mut data = Vec::with_capacity(expected);
        let mut chunks = 0usize;
        while data.len() < expected {
            let frame = self.recv(expect, timeout)?;
            chunks += 1;
            append_chunk(&mut data, &frame.payload, chunks)?;
        }
        data.truncate(expected);
        debug!(device = device_id, chunks, bytes = data.len(), "measurement downloaded");

        Ok(decode_samples(&data, coefficient))
    }
}

fn append_chunk(data: &mut Vec<u8>, payload: &[u8], index: usize) -> Result<()> {
    let status = payload.first().copied().and_then(Status::from_u8);
    if !status.is_some_and(Status::is_ok) {
        return Err(SessionError::ProtocolMismatch(format!(
            "measurement chunk {index} carries status {status:?}"
        )));
    }
    let len = payload.get(1).copied().unwrap_or(0) as usize;
    if len == 0 || CHUNK_HEADER + len > payload.len() {
        return Err(SessionError::ProtocolMismatch(format!(
            "measurement chunk {index} declares {len} bytes but carries {}",
            payload.len().saturating_sub(CHUNK_HEADER)
        )));
    }
    data.extend_from_slice(&payload[CHUNK_HEADER..CHUNK_HEADER + len]);
    Ok(())
}

impl Session {
    /// See [`Conversation::start_batch_measurement`].
    pub fn start_batch_measurement(&self, device_id: u8, request: &MeasurementRequest) -> Result<()> {
        self.conversation().start_batch_measurement(device_id, request)
    }

    /// See [`Conversation::read_measurement`].
    pub fn read_measurement(&self, device_id: u8, sample_count: u32, coefficient: f64) -> Result<BatchMeasurement> {
        self.conversation()
            .read_measurement(device_id, sample_count, coefficient)
    }
}
