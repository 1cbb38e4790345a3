//! Framing layer of the MCL lock-in protocol.
//!
//! Every message is framed with a 7-byte big-endian header:
//! - A 1-byte category (controls, indicators, configuration, lock-in data, waveforms)
//! - A 2-byte parameter index within the category
//! - A 4-byte payload length
//!
//! [`FrameReader`] reassembles frames across arbitrary TCP read boundaries,
//! [`FrameWriter`] writes them, and [`WriteQueue`] carries outbound frames
//! from parameter setters to the single writer thread.

pub mod category;
pub mod codec;
pub mod error;
pub mod queue;
pub mod reader;
#[cfg(feature = "async")]
pub mod tokio_codec;
pub mod writer;

pub use category::{Category, CONFIGURATION, CONTROLS, INDICATORS, LOCKIN_DATA, WAVEFORMS};
pub use codec::{
    decode_frame, encode_frame, Frame, FrameConfig, FrameDecoder, DEFAULT_MAX_PAYLOAD, HEADER_SIZE,
};
pub use error::{FrameError, Result};
pub use queue::{write_queue, Outbound, WriteQueue, WriteQueueReceiver};
pub use reader::{FrameReader, READ_CHUNK_SIZE};
#[cfg(feature = "async")]
pub use tokio_codec::MclCodec;
pub use writer::FrameWriter;
