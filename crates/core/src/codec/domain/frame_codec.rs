use crate::shared::frame::Frame;
use crate::shared::frame_error::FrameError;

/// Converts between the transport's text encoding and decoded frames.
pub trait FrameCodec: Send + Sync {
    /// Parses a `"<prefix>,<data>"` payload into a frame.
    fn decode(&self, payload: &str) -> Result<Frame, FrameError>;

    /// Compresses and text-encodes a frame, including the media-type prefix.
    fn encode(&self, frame: &Frame) -> Result<String, FrameError>;
}
