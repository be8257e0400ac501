use std::time::Duration;

use serde::Serialize;
use senseway_frame::{MessageId, BOOTLOADER_ID};
use tracing::{debug, error, info, warn};

use super::image::{Chunk, FirmwareImage};
use super::observer::{UpdateEvent, UpdateObserver, UpdatePhase};
use super::retry::{RetryDecision, RetryPolicy};
use crate::commands::{verify_ack, FirmwareVersion};
use crate::correlator::{Conversation, ResponseMatch};
use crate::error::{Result, SessionError};
use crate::mac::MacAddress;
use crate::session::Session;

/// Line rate used while talking to the bootloader.
pub const DEFAULT_UPDATE_BAUD_RATE: u32 = 1_000_000;

/// Firmware update tuning.
#[derive(Debug, Clone)]
pub struct UpdateConfig {
    /// Line rate for the bootloader exchange.
    pub update_baud_rate: u32,
    /// Address the bootloader answers on.
    pub bootloader_id: u8,
    /// Wait for the node to confirm it entered the bootloader.
    pub enter_timeout: Duration,
    /// Wait for start and end acknowledgments.
    pub phase_timeout: Duration,
    /// Wait for each packet acknowledgment.
    pub chunk_timeout: Duration,
    pub retry: RetryPolicy,
    /// Pause after the update before querying the new version.
    pub settle_delay: Duration,
}

impl Default for UpdateConfig {
    fn default() -> Self {
        Self {
            update_baud_rate: DEFAULT_UPDATE_BAUD_RATE,
            bootloader_id: BOOTLOADER_ID,
            enter_timeout: Duration::from_secs(1),
            phase_timeout: Duration::from_secs(1),
            chunk_timeout: Duration::from_secs(1),
            retry: RetryPolicy::default(),
            settle_delay: Duration::from_secs(5),
        }
    }
}

/// Outcome of a successful firmware update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpdateReport {
    pub image_size: usize,
    pub chunk_count: u16,
    /// Packet attempts beyond the first, over the whole image.
    pub retries: u32,
    /// Version reported after the update, if the node answered.
    pub version: Option<FirmwareVersion>,
}

fn failed(phase: UpdatePhase, chunk: Option<u16>) -> impl FnOnce(SessionError) -> SessionError {
    move |source| SessionError::UpdateFailed {
        phase,
        chunk,
        source: Box::new(source),
    }
}

impl Conversation<'_> {
    /// Flash `image` onto the node at `device_id` whose hardware address is
    /// `mac`.
    ///
    /// The port runs at the update line rate from entering the bootloader
    /// until the end acknowledgment, and is back at its previous rate when
    /// this returns, whatever the outcome. Each packet is attempted up to
    /// the retry policy's limit; the first packet that exhausts it aborts
    /// the update and nothing after it is sent.
    pub fn update_firmware(
        &mut self,
        device_id: u8,
        mac: &MacAddress,
        image: &FirmwareImage,
        config: &UpdateConfig,
        observer: &mut dyn UpdateObserver,
    ) -> Result<UpdateReport> {
        info!(
            device = device_id,
            %mac,
            bytes = image.total_size(),
            chunks = image.chunk_count(),
            "starting firmware update"
        );
        observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::Idle));

        let retries = match self.flash(device_id, mac, image, config, observer) {
            Ok(retries) => retries,
            Err(err) => {
                error!(device = device_id, %err, "firmware update failed");
                observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::Failed));
                observer.on_event(UpdateEvent::Finished { success: false });
                return Err(err);
            }
        };
        observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::Done));
        info!(device = device_id, retries, "firmware transferred");

        debug!(delay = ?config.settle_delay, "waiting for node to boot");
        std::thread::sleep(config.settle_delay);
        let version = match self.get_version(device_id) {
            Ok(version) => {
                info!(device = device_id, %version, "node running new firmware");
                Some(version)
            }
            Err(err) => {
                warn!(device = device_id, %err, "version query after update failed");
                None
            }
        };
        observer.on_event(UpdateEvent::VersionQueried(version));
        observer.on_event(UpdateEvent::Finished { success: true });

        Ok(UpdateReport {
            image_size: image.total_size(),
            chunk_count: image.chunk_count(),
            retries,
            version,
        })
    }

    /// Enter mode through end, at the update line rate. Returns the retry count.
    fn flash(
        &mut self,
        device_id: u8,
        mac: &MacAddress,
        image: &FirmwareImage,
        config: &UpdateConfig,
        observer: &mut dyn UpdateObserver,
    ) -> Result<u32> {
        observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::EnterMode));
        self.send(device_id, MessageId::EnterFirmwareUpdaterMode, mac.as_bytes())
            .map_err(failed(UpdatePhase::EnterMode, None))?;
        let baud = self
            .raise_baud_rate(config.update_baud_rate)
            .map_err(failed(UpdatePhase::EnterMode, None))?;
        let reply = self
            .recv(
                ResponseMatch::message(MessageId::EnterFirmwareUpdaterMode),
                config.enter_timeout,
            )
            .map_err(failed(UpdatePhase::EnterMode, None))?;
        if MacAddress::from_prefix(&reply.payload) != Some(*mac) {
            return Err(failed(UpdatePhase::EnterMode, None)(
                SessionError::ProtocolMismatch(format!(
                    "node {} answered enter-mode without MAC {mac}",
                    reply.transmitter_id
                )),
            ));
        }
        debug!(device = device_id, "node entered bootloader");

        observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::Start));
        let mut start = Vec::with_capacity(8 + MacAddress::LEN);
        start.extend_from_slice(&(image.total_size() as u32).to_le_bytes());
        start.extend_from_slice(&(u32::from(image.chunk_count()) - 1).to_le_bytes());
        start.extend_from_slice(mac.as_bytes());
        self.acknowledged(config.bootloader_id, MessageId::FirmwarePacketStart, &start, mac, config.phase_timeout)
            .map_err(failed(UpdatePhase::Start, None))?;

        observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::Transfer));
        let mut retries = 0;
        for chunk in image.chunks() {
            retries += self.transfer_chunk(&chunk, image.chunk_count(), mac, config, observer)?;
        }

        observer.on_event(UpdateEvent::PhaseEntered(UpdatePhase::End));
        self.acknowledged(
            config.bootloader_id,
            MessageId::FirmwarePacketEnd,
            mac.as_bytes(),
            mac,
            config.phase_timeout,
        )
        .map_err(failed(UpdatePhase::End, None))?;

        baud.restore().map_err(failed(UpdatePhase::End, None))?;
        Ok(retries)
    }

    /// Send one packet until acknowledged. Returns the retries it took.
    fn transfer_chunk(
        &mut self,
        chunk: &Chunk,
        total: u16,
        mac: &MacAddress,
        config: &UpdateConfig,
        observer: &mut dyn UpdateObserver,
    ) -> Result<u32> {
        let mut payload = Vec::with_capacity(chunk.data.len() + MacAddress::LEN + 2);
        payload.extend_from_slice(&chunk.data);
        payload.extend_from_slice(mac.as_bytes());
        payload.extend_from_slice(&chunk.index.to_le_bytes());

        let mut tracker = config.retry.tracker();
        // Attempts that timed out may still be acknowledged later.
        let mut unanswered = 0u32;
        loop {
            let attempt = tracker.begin();
            if attempt > 1 {
                // A late acknowledgment of the previous attempt must not
                // count for this one.
                self.discard_pending();
            }
            let result = self.acknowledged(
                config.bootloader_id,
                MessageId::FirmwarePacket,
                &payload,
                mac,
                config.chunk_timeout,
            );
            let err = match result {
                Ok(()) => {
                    self.drain_late_acks(config, unanswered)
                        .map_err(failed(UpdatePhase::Transfer, Some(chunk.index)))?;
                    debug!(chunk = chunk.index, total, attempt, "chunk acknowledged");
                    observer.on_event(UpdateEvent::ChunkAcknowledged {
                        chunk: chunk.index,
                        total,
                        attempts: attempt,
                    });
                    return Ok(tracker.retries());
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(failed(UpdatePhase::Transfer, Some(chunk.index))(err));
            }
            if matches!(err, SessionError::Timeout(_)) {
                unanswered += 1;
            }
            warn!(
                chunk = chunk.index,
                attempt,
                max_attempts = tracker.max_attempts(),
                %err,
                "chunk not acknowledged"
            );
            observer.on_event(UpdateEvent::ChunkAttemptFailed {
                chunk: chunk.index,
                attempt,
                max_attempts: tracker.max_attempts(),
                reason: err.to_string(),
            });
            if tracker.on_failure() == RetryDecision::GiveUp {
                return Err(failed(UpdatePhase::Transfer, Some(chunk.index))(err));
            }
        }
    }

    /// Swallow acknowledgments of timed-out attempts of the chunk that was
    /// just accepted.
    ///
    /// Acknowledgments carry no packet index, so one left in the inbox would
    /// be taken as the answer to the next packet. Waits up to the chunk
    /// timeout for each of `unanswered` replies, stopping at the first quiet
    /// period.
    fn drain_late_acks(&mut self, config: &UpdateConfig, unanswered: u32) -> Result<()> {
        let expect = ResponseMatch::for_request(config.bootloader_id, MessageId::FirmwarePacket);
        for _ in 0..unanswered {
            match self.recv(expect, config.chunk_timeout) {
                Ok(frame) => {
                    self.session().listener_shared().record_discard();
                    debug!(from = frame.transmitter_id, "dropping late packet acknowledgment");
                }
                Err(SessionError::Timeout(_)) => break,
                Err(err) => return Err(err),
            }
        }
        Ok(())
    }

    /// Send to the bootloader and require a `[Success, mac]` acknowledgment.
    fn acknowledged(
        &mut self,
        bootloader_id: u8,
        message: MessageId,
        payload: &[u8],
        mac: &MacAddress,
        timeout: Duration,
    ) -> Result<()> {
        let frame = self.send_and_wait(bootloader_id, message, payload, timeout)?;
        verify_ack(&frame, mac)
    }
}

impl Session {
    /// See [`Conversation::update_firmware`].
    pub fn update_firmware(
        &self,
        device_id: u8,
        mac: &MacAddress,
        image: &FirmwareImage,
        config: &UpdateConfig,
        observer: &mut dyn UpdateObserver,
    ) -> Result<UpdateReport> {
        self.conversation()
            .update_firmware(device_id, mac, image, config, observer)
    }
}
