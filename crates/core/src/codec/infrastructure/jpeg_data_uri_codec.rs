use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use image::codecs::jpeg::JpegEncoder;

use crate::codec::domain::frame_codec::FrameCodec;
use crate::shared::constants::{DEFAULT_JPEG_QUALITY, JPEG_DATA_URI_PREFIX};
use crate::shared::frame::Frame;
use crate::shared::frame_error::FrameError;

/// Data-URI codec: accepts any compressed image format the `image` crate
/// can sniff, always replies with base64 JPEG.
///
/// The mime token of inbound payloads is not inspected; only the comma
/// separating it from the data matters.
pub struct JpegDataUriCodec {
    quality: u8,
}

impl JpegDataUriCodec {
    pub fn new(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }
}

impl Default for JpegDataUriCodec {
    fn default() -> Self {
        Self::new(DEFAULT_JPEG_QUALITY)
    }
}

impl FrameCodec for JpegDataUriCodec {
    fn decode(&self, payload: &str) -> Result<Frame, FrameError> {
        let (_prefix, data) = payload.split_once(',').ok_or_else(|| {
            FrameError::MalformedPayload(
                "expected '<media type>,<data>' but no ',' separator was found".into(),
            )
        })?;
        if data.is_empty() {
            return Err(FrameError::MalformedPayload("empty data segment".into()));
        }

        let bytes = STANDARD
            .decode(data)
            .map_err(|e| FrameError::MalformedPayload(format!("invalid base64 data: {e}")))?;

        let image = image::load_from_memory(&bytes)
            .map_err(|e| FrameError::InvalidImageData(e.to_string()))?;
        if image.width() == 0 || image.height() == 0 {
            return Err(FrameError::InvalidImageData(
                "decoded image has no pixels".into(),
            ));
        }

        Ok(Frame::from_rgb_image(image.to_rgb8()))
    }

    fn encode(&self, frame: &Frame) -> Result<String, FrameError> {
        let image = frame.to_rgb_image().ok_or_else(|| {
            FrameError::EncodingFailure(format!(
                "cannot encode {}-channel frame as JPEG",
                frame.channels()
            ))
        })?;

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality)
            .encode_image(&image)
            .map_err(|e| FrameError::EncodingFailure(e.to_string()))?;

        let mut out = String::with_capacity(JPEG_DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        out.push_str(JPEG_DATA_URI_PREFIX);
        STANDARD.encode_string(&jpeg, &mut out);
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageFormat, Rgb, RgbImage};
    use rstest::rstest;
    use std::io::Cursor;

    fn solid_image(width: u32, height: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(width, height, Rgb(color))
    }

    fn data_uri(image: &RgbImage, format: ImageFormat, mime: &str) -> String {
        let mut bytes = Vec::new();
        image.write_to(&mut Cursor::new(&mut bytes), format).unwrap();
        format!("data:{mime};base64,{}", STANDARD.encode(bytes))
    }

    fn is_reddish(pixel: &[u8]) -> bool {
        pixel[0] > 200 && pixel[1] < 60 && pixel[2] < 60
    }

    #[test]
    fn test_decode_jpeg_data_uri() {
        let uri = data_uri(&solid_image(100, 100, [255, 0, 0]), ImageFormat::Jpeg, "image/jpeg");
        let frame = JpegDataUriCodec::default().decode(&uri).unwrap();
        assert_eq!(frame.width(), 100);
        assert_eq!(frame.height(), 100);
        assert_eq!(frame.channels(), 3);
        assert!(is_reddish(frame.pixel(50, 50).unwrap()));
    }

    #[test]
    fn test_decode_png_is_accepted_regardless_of_declared_mime() {
        let uri = data_uri(&solid_image(8, 4, [0, 0, 255]), ImageFormat::Png, "text/plain");
        let frame = JpegDataUriCodec::default().decode(&uri).unwrap();
        assert_eq!((frame.width(), frame.height()), (8, 4));
        assert_eq!(frame.pixel(0, 0), Some(&[0u8, 0, 255][..]));
    }

    #[rstest]
    #[case::no_comma("not-a-data-uri")]
    #[case::empty("")]
    #[case::prefix_only("data:image/jpeg;base64")]
    fn test_missing_separator_is_malformed(#[case] payload: &str) {
        let err = JpegDataUriCodec::default().decode(payload).unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload(_)), "got {err:?}");
    }

    #[test]
    fn test_empty_data_segment_is_malformed() {
        let err = JpegDataUriCodec::default()
            .decode("data:image/jpeg;base64,")
            .unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload(_)));
    }

    #[test]
    fn test_invalid_base64_is_malformed() {
        let err = JpegDataUriCodec::default()
            .decode("data:image/jpeg;base64,@@not base64@@")
            .unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload(_)));
    }

    #[test]
    fn test_valid_base64_of_garbage_is_invalid_image() {
        let payload = format!("data:image/jpeg;base64,{}", STANDARD.encode(b"hello world"));
        let err = JpegDataUriCodec::default().decode(&payload).unwrap_err();
        assert!(matches!(err, FrameError::InvalidImageData(_)));
    }

    #[test]
    fn test_only_first_comma_splits() {
        // A second comma lands inside the data segment and breaks base64.
        let err = JpegDataUriCodec::default()
            .decode("data:image/jpeg;base64,AAAA,BBBB")
            .unwrap_err();
        assert!(matches!(err, FrameError::MalformedPayload(_)));
    }

    #[test]
    fn test_encode_has_jpeg_prefix() {
        let frame = Frame::from_rgb_image(solid_image(16, 16, [0, 255, 0]));
        let encoded = JpegDataUriCodec::default().encode(&frame).unwrap();
        assert!(encoded.starts_with(JPEG_DATA_URI_PREFIX));
    }

    #[test]
    fn test_decode_encode_decode_keeps_dimensions() {
        let codec = JpegDataUriCodec::default();
        let uri = data_uri(&solid_image(64, 48, [255, 0, 0]), ImageFormat::Jpeg, "image/jpeg");
        let frame = codec.decode(&uri).unwrap();
        let encoded = codec.encode(&frame).unwrap();
        let again = codec.decode(&encoded).unwrap();
        assert_eq!((again.width(), again.height()), (64, 48));
        assert!(is_reddish(again.pixel(32, 24).unwrap()));
    }

    #[test]
    fn test_encode_rejects_non_rgb_frame() {
        let frame = Frame::new(vec![0u8; 16], 4, 4, 1);
        let err = JpegDataUriCodec::default().encode(&frame).unwrap_err();
        assert!(matches!(err, FrameError::EncodingFailure(_)));
    }

    #[test]
    fn test_lower_quality_yields_smaller_payload() {
        let mut img = RgbImage::new(64, 64);
        for (x, y, p) in img.enumerate_pixels_mut() {
            *p = Rgb([(x * 4) as u8, (y * 4) as u8, ((x ^ y) * 4) as u8]);
        }
        let frame = Frame::from_rgb_image(img);
        let high = JpegDataUriCodec::new(95).encode(&frame).unwrap();
        let low = JpegDataUriCodec::new(10).encode(&frame).unwrap();
        assert!(low.len() < high.len());
    }

    #[rstest]
    #[case(0, 1)]
    #[case(80, 80)]
    #[case(255, 100)]
    fn test_quality_is_clamped(#[case] requested: u8, #[case] expected: u8) {
        assert_eq!(JpegDataUriCodec::new(requested).quality(), expected);
    }
}
