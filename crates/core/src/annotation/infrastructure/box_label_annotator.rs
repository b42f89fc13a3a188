use crate::annotation::domain::frame_annotator::FrameAnnotator;
use crate::detection::domain::detection::Detection;
use crate::shared::frame::Frame;

use super::glyphs::{glyph_bits, text_width, GLYPH_ADVANCE, GLYPH_HEIGHT, GLYPH_WIDTH};

const BOX_COLOR: [u8; 3] = [0, 255, 0];
const STRIP_COLOR: [u8; 3] = [0, 0, 0];
const TEXT_COLOR: [u8; 3] = [0, 255, 0];

/// Box outline thickness in pixels.
pub const BOX_THICKNESS: i32 = 2;

/// Padding between the backing strip edge and the glyphs.
const LABEL_PADDING: i32 = 1;

/// Where a detection's caption lands: the backing strip's top-left corner
/// and size, in frame pixels.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LabelLayout {
    pub text: String,
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// Lays out one caption per detection, in input order.
///
/// A caption sits directly above its box's top-left corner. When there is
/// no room above, it moves just inside the box. The origin is then clamped
/// so the strip stays inside the frame wherever the frame is large enough.
pub fn label_layout(detections: &[Detection], frame_width: u32, frame_height: u32) -> Vec<LabelLayout> {
    let fw = frame_width as i32;
    let fh = frame_height as i32;
    detections
        .iter()
        .map(|d| {
            let text = d.caption();
            let width = text_width(&text) + 2 * LABEL_PADDING;
            let height = GLYPH_HEIGHT + 2 * LABEL_PADDING;

            let left = d.x1.round() as i32;
            let top = d.y1.round() as i32;
            let mut y = top - height;
            if y < 0 {
                y = top + BOX_THICKNESS;
            }

            LabelLayout {
                x: left.min(fw - width).max(0),
                y: y.min(fh - height).max(0),
                text,
                width,
                height,
            }
        })
        .collect()
}

/// Green 2-pixel box outlines with a bitmap-font caption on a dark strip.
#[derive(Clone, Copy, Debug, Default)]
pub struct BoxLabelAnnotator;

impl BoxLabelAnnotator {
    pub fn new() -> Self {
        Self
    }
}

impl FrameAnnotator for BoxLabelAnnotator {
    fn annotate(
        &self,
        frame: &mut Frame,
        detections: &[Detection],
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if frame.channels() != 3 {
            return Err(format!(
                "annotation expects an RGB frame, got {} channel(s)",
                frame.channels()
            )
            .into());
        }
        let layouts = label_layout(detections, frame.width(), frame.height());
        for (detection, layout) in detections.iter().zip(&layouts) {
            draw_box(frame, detection);
            draw_label(frame, layout);
        }
        Ok(())
    }
}

fn draw_box(frame: &mut Frame, d: &Detection) {
    let left = d.x1.round() as i32;
    let top = d.y1.round() as i32;
    let right = (d.x2.round() as i32 - 1).max(left);
    let bottom = (d.y2.round() as i32 - 1).max(top);

    for t in 0..BOX_THICKNESS {
        let (l, r) = (left + t, right - t);
        let (tp, b) = (top + t, bottom - t);
        if l > r || tp > b {
            break;
        }
        for x in l..=r {
            frame.put_pixel(x, tp, BOX_COLOR);
            frame.put_pixel(x, b, BOX_COLOR);
        }
        for y in tp..=b {
            frame.put_pixel(l, y, BOX_COLOR);
            frame.put_pixel(r, y, BOX_COLOR);
        }
    }
}

fn draw_label(frame: &mut Frame, layout: &LabelLayout) {
    for y in layout.y..layout.y + layout.height {
        for x in layout.x..layout.x + layout.width {
            frame.put_pixel(x, y, STRIP_COLOR);
        }
    }

    let mut pen_x = layout.x + LABEL_PADDING;
    let pen_y = layout.y + LABEL_PADDING;
    for ch in layout.text.chars() {
        // Unknown characters leave a blank cell.
        if let Some(rows) = glyph_bits(ch) {
            for (row, pattern) in rows.iter().enumerate() {
                for col in 0..GLYPH_WIDTH {
                    if (pattern >> (GLYPH_WIDTH - 1 - col)) & 1 == 1 {
                        frame.put_pixel(pen_x + col, pen_y + row as i32, TEXT_COLOR);
                    }
                }
            }
        }
        pen_x += GLYPH_ADVANCE;
    }
}
