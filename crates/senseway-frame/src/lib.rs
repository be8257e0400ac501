//! Addressed, checksummed message framing for the SenseWay wired bus.
//!
//! Every message on the bus is framed with:
//! - A 2-byte magic number ("SM") for stream synchronization
//! - Transmitter, receiver and message ids (1 byte each)
//! - A 2-byte little-endian payload length
//! - A CRC-16/CCITT-FALSE trailer over ids, length and payload
//!
//! The session layer only depends on the [`FrameCodec`] trait; [`SmcomCodec`]
//! is the reference implementation of the wire format above.

pub mod codec;
pub mod error;
pub mod message;
pub mod reader;
pub mod status;
pub mod writer;

pub use codec::{
    decode_frame, encode_frame, Frame, FrameCodec, FrameConfig, SmcomCodec, CRC_SIZE,
    DEFAULT_MAX_PAYLOAD, HEADER_SIZE, MAGIC,
};
pub use error::{FrameError, Result};
pub use message::{MessageId, BOOTLOADER_ID, BROADCAST_ID, DEFAULT_HOST_ID};
pub use reader::FrameReader;
pub use status::Status;
pub use writer::FrameWriter;
