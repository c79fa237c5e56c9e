//! Frame buffer and detection regions.
//!
//! - `Frame`: the single mutable pixel buffer owned by the capture loop.
//!   It is overwritten in place on every read, so borrowers only ever see the
//!   most recent capture.
//! - `Region`: an axis-aligned rectangle in frame coordinates.

use image::RgbImage;

/// Mutable RGB pixel buffer.
///
/// Allocated once at startup and reused for every capture attempt. A frame
/// with zero width or height is *empty* (a valid read that carried no image,
/// e.g. while the device warms up).
#[derive(Clone, Debug, Default)]
pub struct Frame {
    image: RgbImage,
}

impl Frame {
    /// An empty frame with no pixel storage.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_image(image: RgbImage) -> Self {
        Self { image }
    }

    /// A frame of the given size filled with one color.
    pub fn filled(width: u32, height: u32, rgb: [u8; 3]) -> Self {
        Self {
            image: RgbImage::from_pixel(width, height, image::Rgb(rgb)),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    pub fn is_empty(&self) -> bool {
        self.image.width() == 0 || self.image.height() == 0
    }

    pub fn image(&self) -> &RgbImage {
        &self.image
    }

    pub fn image_mut(&mut self) -> &mut RgbImage {
        &mut self.image
    }

    /// Row-major RGB bytes.
    pub fn as_bytes(&self) -> &[u8] {
        self.image.as_raw()
    }

    /// Overwrite the frame with new RGB pixels, reusing the existing
    /// allocation when it is large enough.
    ///
    /// `rgb` must hold exactly `width * height * 3` bytes; anything else
    /// leaves the frame empty.
    pub fn overwrite(&mut self, width: u32, height: u32, rgb: &[u8]) {
        let expected = width as usize * height as usize * 3;
        let mut storage = std::mem::take(&mut self.image).into_raw();
        storage.clear();
        if rgb.len() != expected {
            self.image = RgbImage::from_raw(0, 0, storage).unwrap_or_default();
            return;
        }
        storage.extend_from_slice(rgb);
        self.image = RgbImage::from_raw(width, height, storage).unwrap_or_default();
    }

    /// Drop the pixel contents, leaving an empty frame.
    pub fn clear(&mut self) {
        self.overwrite(0, 0, &[]);
    }
}

/// Axis-aligned rectangle around one detected face, in frame coordinates.
///
/// Regions carry no identity; each detection call produces fresh ones.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Region {
    pub x: i32,
    pub y: i32,
    pub width: u32,
    pub height: u32,
}

impl Region {
    pub const fn new(x: i32, y: i32, width: u32, height: u32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn is_degenerate(&self) -> bool {
        self.width == 0 || self.height == 0
    }

    /// True when the pixel at (`px`, `py`) lies inside the region.
    pub fn contains(&self, px: i64, py: i64) -> bool {
        let (x, y) = (self.x as i64, self.y as i64);
        px >= x && py >= y && px < x + self.width as i64 && py < y + self.height as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_frame_is_empty() {
        let frame = Frame::new();
        assert!(frame.is_empty());
        assert!(frame.as_bytes().is_empty());
    }

    #[test]
    fn overwrite_replaces_contents_in_place() {
        let mut frame = Frame::filled(4, 4, [1, 2, 3]);
        let pixels = vec![9u8; 2 * 3 * 3];
        frame.overwrite(2, 3, &pixels);

        assert_eq!(frame.width(), 2);
        assert_eq!(frame.height(), 3);
        assert_eq!(frame.as_bytes(), pixels.as_slice());
    }

    #[test]
    fn overwrite_with_mismatched_length_leaves_empty_frame() {
        let mut frame = Frame::filled(4, 4, [1, 2, 3]);
        frame.overwrite(4, 4, &[0u8; 5]);
        assert!(frame.is_empty());
    }

    #[test]
    fn region_contains_is_half_open() {
        let region = Region::new(10, 10, 5, 5);
        assert!(region.contains(10, 10));
        assert!(region.contains(14, 14));
        assert!(!region.contains(15, 14));
        assert!(!region.contains(9, 12));
    }
}
