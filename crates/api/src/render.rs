use anyhow::Context;
use detector::Detection;
use image::{Rgb, RgbImage, codecs::jpeg::JpegEncoder};
use imageproc::{
    drawing::{draw_filled_rect_mut, draw_hollow_rect_mut},
    rect::Rect,
};

const BOX_COLOR: Rgb<u8> = Rgb([255, 0, 0]);
const BORDER_PX: u32 = 3;
const LABEL_OFFSET_PX: i32 = 20;
/// Each glyph cell is drawn as a `GLYPH_SCALE` x `GLYPH_SCALE` block.
const GLYPH_SCALE: u32 = 2;
const GLYPH_ADVANCE: i32 = 6 * GLYPH_SCALE as i32;
const JPEG_QUALITY: u8 = 90;

/// Copy of `image` with every detection outlined and labelled with its
/// confidence, encoded as JPEG.
pub fn render_jpeg(image: &RgbImage, detections: &[Detection]) -> anyhow::Result<Vec<u8>> {
    let mut canvas = image.clone();

    for detection in detections {
        draw_box(&mut canvas, detection);
        let label = format!("{:.2}", detection.confidence);
        draw_label(
            &mut canvas,
            detection.x_min as i32,
            detection.y_min as i32 - LABEL_OFFSET_PX,
            &label,
        );
    }

    encode_jpeg(&canvas)
}

pub fn encode_jpeg(image: &RgbImage) -> anyhow::Result<Vec<u8>> {
    let mut buffer = Vec::new();
    JpegEncoder::new_with_quality(&mut buffer, JPEG_QUALITY)
        .encode_image(image)
        .context("JPEG encode failed")?;
    Ok(buffer)
}

fn draw_box(canvas: &mut RgbImage, detection: &Detection) {
    let (width, height) = (detection.width(), detection.height());

    for inset in 0..BORDER_PX {
        let (w, h) = (
            width.saturating_sub(2 * inset),
            height.saturating_sub(2 * inset),
        );
        if w == 0 || h == 0 {
            break;
        }
        let rect = Rect::at(
            (detection.x_min + inset) as i32,
            (detection.y_min + inset) as i32,
        )
        .of_size(w, h);
        draw_hollow_rect_mut(canvas, rect, BOX_COLOR);
    }
}

/// Draw `text` with its top-left corner at (`x`, `y`), clipped to the canvas.
fn draw_label(canvas: &mut RgbImage, x: i32, y: i32, text: &str) {
    let mut cursor = x;
    for ch in text.chars() {
        if let Some(glyph) = glyph_bits(ch) {
            for (row, pattern) in glyph.iter().enumerate() {
                for col in 0..5 {
                    if (pattern >> (4 - col)) & 1 == 1 {
                        let cell = Rect::at(
                            cursor + col * GLYPH_SCALE as i32,
                            y + row as i32 * GLYPH_SCALE as i32,
                        )
                        .of_size(GLYPH_SCALE, GLYPH_SCALE);
                        draw_filled_rect_mut(canvas, cell, BOX_COLOR);
                    }
                }
            }
        }
        cursor += GLYPH_ADVANCE;
    }
}

/// 5x7 bitmaps for the characters a confidence label can contain.
fn glyph_bits(ch: char) -> Option<[u8; 7]> {
    match ch {
        '0' => Some([0b01110, 0b10001, 0b10011, 0b10101, 0b11001, 0b10001, 0b01110]),
        '1' => Some([0b00100, 0b01100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110]),
        '2' => Some([0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b01000, 0b11111]),
        '3' => Some([0b11110, 0b00001, 0b00001, 0b01110, 0b00001, 0b00001, 0b11110]),
        '4' => Some([0b00010, 0b00110, 0b01010, 0b10010, 0b11111, 0b00010, 0b00010]),
        '5' => Some([0b11111, 0b10000, 0b11110, 0b00001, 0b00001, 0b10001, 0b01110]),
        '6' => Some([0b00110, 0b01000, 0b10000, 0b11110, 0b10001, 0b10001, 0b01110]),
        '7' => Some([0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b01000, 0b01000]),
        '8' => Some([0b01110, 0b10001, 0b10001, 0b01110, 0b10001, 0b10001, 0b01110]),
        '9' => Some([0b01110, 0b10001, 0b10001, 0b01111, 0b00001, 0b00010, 0b01100]),
        '.' => Some([0, 0, 0, 0, 0, 0b00110, 0b00110]),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn detection(x_min: u32, y_min: u32, x_max: u32, y_max: u32) -> Detection {
        Detection {
            x_min,
            y_min,
            x_max,
            y_max,
            confidence: 0.87,
        }
    }

    #[test]
    fn outlines_box_with_three_pixel_border() {
        let mut canvas = RgbImage::new(100, 100);
        draw_box(&mut canvas, &detection(10, 40, 60, 90));

        for inset in 0..BORDER_PX {
            assert_eq!(*canvas.get_pixel(10 + inset, 60), BOX_COLOR);
            assert_eq!(*canvas.get_pixel(59 - inset, 60), BOX_COLOR);
        }
        assert_eq!(*canvas.get_pixel(10 + BORDER_PX, 60), Rgb([0, 0, 0]));
        assert_eq!(*canvas.get_pixel(35, 65), Rgb([0, 0, 0]));
    }

    #[test]
    fn tiny_box_is_drawn_without_panicking() {
        let mut canvas = RgbImage::new(4, 4);
        draw_box(&mut canvas, &detection(1, 1, 2, 2));
        assert_eq!(*canvas.get_pixel(1, 1), BOX_COLOR);
    }

    #[test]
    fn label_sits_above_box() {
        let mut canvas = RgbImage::new(100, 100);
        draw_label(&mut canvas, 10, 20, "0.87");

        let painted_rows: Vec<u32> = canvas
            .enumerate_pixels()
            .filter(|(_, _, p)| **p == BOX_COLOR)
            .map(|(_, y, _)| y)
            .collect();
        assert!(!painted_rows.is_empty());
        assert!(painted_rows.iter().all(|&y| (20..20 + 7 * GLYPH_SCALE).contains(&y)));
    }

    #[test]
    fn label_clipped_at_top_edge() {
        let mut canvas = RgbImage::new(40, 40);
        draw_label(&mut canvas, 0, -20, "0.50");
        draw_label(&mut canvas, 30, 35, "0.50");
    }

    #[test]
    fn rendered_jpeg_keeps_dimensions() {
        let image = RgbImage::from_pixel(64, 48, Rgb([200, 200, 200]));
        let jpeg = render_jpeg(&image, &[detection(8, 8, 40, 40)]).unwrap();

        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }
}
