use image::RgbImage;
use ndarray::ArrayView3;

/// A decoded video frame: contiguous 8-bit pixels in row-major order.
///
/// Owned by exactly one pipeline invocation. Decoding normalises to RGB, so
/// frames coming off the wire always have three channels.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    data: Vec<u8>,
    width: u32,
    height: u32,
    channels: u8,
}

impl Frame {
    pub fn new(data: Vec<u8>, width: u32, height: u32, channels: u8) -> Self {
        debug_assert_eq!(
            data.len(),
            (width as usize) * (height as usize) * (channels as usize),
            "data length must equal width * height * channels"
        );
        Self {
            data,
            width,
            height,
            channels,
        }
    }

    pub fn from_rgb_image(image: RgbImage) -> Self {
        let (width, height) = image.dimensions();
        Self::new(image.into_raw(), width, height, 3)
    }

    /// Copies the pixels into an `RgbImage`. Returns `None` for non-RGB frames.
    pub fn to_rgb_image(&self) -> Option<RgbImage> {
        if self.channels != 3 {
            return None;
        }
        RgbImage::from_raw(self.width, self.height, self.data.clone())
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn channels(&self) -> u8 {
        self.channels
    }

    pub fn is_empty(&self) -> bool {
        self.width == 0 || self.height == 0 || self.channels == 0
    }

    /// Pixel at `(x, y)`, or `None` outside the frame.
    pub fn pixel(&self, x: u32, y: u32) -> Option<&[u8]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let c = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * c;
        Some(&self.data[idx..idx + c])
    }

    /// Writes an RGB colour at `(x, y)`. Out-of-bounds writes are ignored.
    pub fn put_pixel(&mut self, x: i32, y: i32, color: [u8; 3]) {
        if x < 0 || y < 0 || x >= self.width as i32 || y >= self.height as i32 {
            return;
        }
        let c = self.channels as usize;
        let idx = (y as usize * self.width as usize + x as usize) * c;
        for (i, value) in color.iter().enumerate().take(c) {
            self.data[idx + i] = *value;
        }
    }

    /// `[height, width, channels]` view, or `None` if the buffer length
    /// doesn't match the dimensions.
    pub fn as_ndarray(&self) -> Option<ArrayView3<'_, u8>> {
        ArrayView3::from_shape(self.shape(), &self.data).ok()
    }

    fn shape(&self) -> (usize, usize, usize) {
        (
            self.height as usize,
            self.width as usize,
            self.channels as usize,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_construction_and_accessors() {
        let data = vec![0u8; 12]; // 2x2x3
        let frame = Frame::new(data.clone(), 2, 2, 3);
        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 2);
        assert_eq!(frame.channels(), 3);
        assert_eq!(frame.data(), &data[..]);
        assert!(!frame.is_empty());
    }

    #[test]
    #[should_panic(expected = "data length must equal width * height * channels")]
    fn test_mismatched_data_length_panics_in_debug() {
        Frame::new(vec![0u8; 10], 2, 2, 3);
    }

    #[test]
    fn test_rgb_image_roundtrip_keeps_pixels() {
        let mut img = RgbImage::new(3, 2);
        img.put_pixel(2, 1, image::Rgb([10, 20, 30]));
        let frame = Frame::from_rgb_image(img);
        assert_eq!(frame.pixel(2, 1), Some(&[10u8, 20, 30][..]));

        let back = frame.to_rgb_image().unwrap();
        assert_eq!(back.get_pixel(2, 1).0, [10, 20, 30]);
    }

    #[test]
    fn test_to_rgb_image_rejects_other_channel_counts() {
        let frame = Frame::new(vec![0u8; 4], 2, 2, 1);
        assert!(frame.to_rgb_image().is_none());
    }

    #[test]
    fn test_put_pixel_ignores_out_of_bounds() {
        let mut frame = Frame::new(vec![0u8; 12], 2, 2, 3);
        frame.put_pixel(-1, 0, [255, 255, 255]);
        frame.put_pixel(2, 0, [255, 255, 255]);
        frame.put_pixel(0, 5, [255, 255, 255]);
        assert!(frame.data().iter().all(|&v| v == 0));

        frame.put_pixel(1, 1, [1, 2, 3]);
        assert_eq!(frame.pixel(1, 1), Some(&[1u8, 2, 3][..]));
    }

    #[test]
    fn test_pixel_outside_frame_is_none() {
        let frame = Frame::new(vec![0u8; 12], 2, 2, 3);
        assert!(frame.pixel(2, 0).is_none());
        assert!(frame.pixel(0, 2).is_none());
    }

    #[test]
    fn test_as_ndarray_shape() {
        let frame = Frame::new(vec![0u8; 24], 4, 2, 3);
        assert_eq!(frame.as_ndarray().unwrap().shape(), &[2, 4, 3]); // (height, width, channels)
    }
}
