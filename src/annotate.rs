//! Region markers drawn directly onto the frame.

use std::fmt;
use std::str::FromStr;

use image::Rgb;
use imageproc::drawing::draw_hollow_rect_mut;
use imageproc::rect::Rect;

use crate::error::Error;
use crate::frame::{Frame, Region};

/// RGB marker color.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Color(pub [u8; 3]);

impl Color {
    pub const BLUE: Self = Self([0, 0, 255]);
}

impl FromStr for Color {
    type Err = Error;

    /// Parses `r,g,b` with each channel in 0..=255.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let channels = s
            .split(',')
            .map(|c| c.trim().parse::<u8>())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|_| Error::Config(format!("invalid color '{}': expected r,g,b", s)))?;
        match channels.as_slice() {
            [r, g, b] => Ok(Self([*r, *g, *b])),
            _ => Err(Error::Config(format!(
                "invalid color '{}': expected three channels",
                s
            ))),
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.0;
        write!(f, "{},{},{}", r, g, b)
    }
}

/// Draws one marker per region onto a frame.
pub trait Annotator {
    fn mark(&mut self, frame: &mut Frame, regions: &[Region], color: Color, thickness: u32);
}

/// Hollow rectangle outlines.
///
/// The stroke grows inward from the region edge, so no pixel outside a
/// region's bounds is touched. Strokes are clipped to the frame.
#[derive(Clone, Copy, Debug, Default)]
pub struct RectangleMarker;

impl Annotator for RectangleMarker {
    fn mark(&mut self, frame: &mut Frame, regions: &[Region], color: Color, thickness: u32) {
        let canvas = frame.image_mut();
        for region in regions.iter().filter(|r| !r.is_degenerate()) {
            let rings = thickness.min(region.width.div_ceil(2)).min(region.height.div_ceil(2));
            for inset in 0..rings {
                let width = region.width - 2 * inset;
                let height = region.height - 2 * inset;
                if width == 0 || height == 0 {
                    break;
                }
                let rect = Rect::at(region.x + inset as i32, region.y + inset as i32)
                    .of_size(width, height);
                draw_hollow_rect_mut(canvas, rect, Rgb(color.0));
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const BLACK: [u8; 3] = [0, 0, 0];

    fn pixel(frame: &Frame, x: u32, y: u32) -> [u8; 3] {
        frame.image().get_pixel(x, y).0
    }

    #[test]
    fn color_parses_rgb_triplets() {
        assert_eq!("0,0,255".parse::<Color>().unwrap(), Color::BLUE);
        assert_eq!(" 12, 34 ,56".parse::<Color>().unwrap(), Color([12, 34, 56]));
        assert!("1,2".parse::<Color>().is_err());
        assert!("1,2,300".parse::<Color>().is_err());
        assert_eq!(Color([1, 2, 3]).to_string(), "1,2,3");
    }

    #[test]
    fn marks_each_region_and_nothing_outside() {
        let mut frame = Frame::filled(200, 200, BLACK);
        let regions = [Region::new(10, 10, 50, 50), Region::new(100, 100, 40, 40)];

        RectangleMarker.mark(&mut frame, &regions, Color::BLUE, 3);

        for region in &regions {
            let (x, y) = (region.x as u32, region.y as u32);
            assert_eq!(pixel(&frame, x, y), Color::BLUE.0);
            assert_eq!(pixel(&frame, x + 2, y + 2), Color::BLUE.0);
            assert_eq!(pixel(&frame, x + region.width - 1, y + region.height - 1), Color::BLUE.0);
            // Interior beyond the stroke is untouched.
            assert_eq!(pixel(&frame, x + 3, y + 3), BLACK);
            assert_eq!(pixel(&frame, x + region.width / 2, y + region.height / 2), BLACK);
        }

        for (x, y, p) in frame.image().enumerate_pixels() {
            let inside = regions.iter().any(|r| r.contains(x as i64, y as i64));
            if !inside {
                assert_eq!(p.0, BLACK, "pixel ({}, {}) outside regions changed", x, y);
            }
        }
    }

    #[test]
    fn regions_past_the_edge_are_clipped() {
        let mut frame = Frame::filled(20, 20, BLACK);
        RectangleMarker.mark(&mut frame, &[Region::new(15, -5, 30, 10)], Color::BLUE, 1);
        assert_eq!(pixel(&frame, 15, 0), Color::BLUE.0);
        assert_eq!(pixel(&frame, 15, 4), Color::BLUE.0);
        assert_eq!(pixel(&frame, 14, 4), BLACK);
    }

    #[test]
    fn thick_strokes_fill_small_regions_without_overflow() {
        let mut frame = Frame::filled(10, 10, BLACK);
        let region = Region::new(2, 2, 3, 3);
        RectangleMarker.mark(&mut frame, &[region], Color::BLUE, 10);
        for (x, y, p) in frame.image().enumerate_pixels() {
            let expected = if region.contains(x as i64, y as i64) {
                Color::BLUE.0
            } else {
                BLACK
            };
            assert_eq!(p.0, expected);
        }
    }

    #[test]
    fn degenerate_regions_draw_nothing() {
        let mut frame = Frame::filled(10, 10, BLACK);
        RectangleMarker.mark(&mut frame, &[Region::new(1, 1, 0, 5)], Color::BLUE, 2);
        assert!(frame.image().pixels().all(|p| p.0 == BLACK));
    }
}
