//! Chunked firmware update through the node's bootloader.
//!
//! An update runs `Idle → EnterMode → Start → Transfer → End → Done`, and
//! lands in `Failed` from any phase. See [`Conversation::update_firmware`].
//!
//! [`Conversation::update_firmware`]: crate::Conversation::update_firmware

mod image;
mod observer;
mod retry;
mod update;

pub use image::{Chunk, FirmwareImage, CHUNK_SIZE, MAX_IMAGE_SIZE};
pub use observer::{NoopObserver, UpdateEvent, UpdateObserver, UpdatePhase};
pub use retry::{AttemptTracker, RetryDecision, RetryPolicy};
pub use update::{UpdateConfig, UpdateReport, DEFAULT_UPDATE_BAUD_RATE};
