use crate::config::ChannelOrder;
use common::span;
use fast_image_resize::{
    FilterType, PixelType, ResizeAlg, ResizeOptions, Resizer,
    images::{Image, ImageRef},
};
use image::RgbImage;
use ndarray::{Array, IxDyn};

const LETTERBOX_COLOR: u8 = 114;
/// Largest square network input accepted.
pub const MAX_INPUT_SIZE: u32 = 4096;

/// Letterbox parameters needed to map network coordinates back onto the
/// original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    pub scale: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

pub struct PreProcessor {
    pub input_size: u32,
    pub channel_order: ChannelOrder,
    letterboxed_buffer: Vec<u8>,
}

impl PreProcessor {
    /// Fails unless `input_size` is in `1..=MAX_INPUT_SIZE`.
    pub fn new(input_size: u32, channel_order: ChannelOrder) -> anyhow::Result<Self> {
        if !(1..=MAX_INPUT_SIZE).contains(&input_size) {
            anyhow::bail!(
                "input_size must be between 1 and {}, got {}",
                MAX_INPUT_SIZE,
                input_size
            );
        }

        let buffer_len = (input_size as usize)
            .checked_mul(input_size as usize)
            .and_then(|n| n.checked_mul(3))
            .ok_or_else(|| anyhow::anyhow!("input_size {} overflows the letterbox buffer", input_size))?;

        Ok(Self {
            input_size,
            channel_order,
            letterboxed_buffer: vec![LETTERBOX_COLOR; buffer_len],
        })
    }

    /// Produce a `[1, 3, input_size, input_size]` tensor in `[0, 1]`.
    pub fn preprocess(&mut self, image: &RgbImage) -> anyhow::Result<(Array<f32, IxDyn>, Letterbox)> {
        let _s = span!("preprocess_image");

        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            anyhow::bail!("cannot preprocess an empty {}x{} image", width, height);
        }

        tracing::trace!(width, height, "Preprocessing image dimensions");

        let letterbox = self.resize_and_letterbox(image.as_raw(), width, height)?;
        let input = self.normalize()?;

        Ok((input, letterbox))
    }

    fn resize_and_letterbox(
        &mut self,
        pixels: &[u8],
        width: u32,
        height: u32,
    ) -> anyhow::Result<Letterbox> {
        let _s = span!("resize_and_letterbox");

        let size = self.input_size;
        let scale = (size as f32 / width as f32).min(size as f32 / height as f32);
        let new_width = ((width as f32 * scale) as u32).clamp(1, size);
        let new_height = ((height as f32 * scale) as u32).clamp(1, size);

        let offset_x = (size - new_width) / 2;
        let offset_y = (size - new_height) / 2;

        let src = ImageRef::new(width, height, pixels, PixelType::U8x3)?;
        let mut resized = Image::new(new_width, new_height, PixelType::U8x3);

        Resizer::new().resize(
            &src,
            &mut resized,
            &ResizeOptions::new().resize_alg(ResizeAlg::Convolution(FilterType::Bilinear)),
        )?;

        self.letterboxed_buffer.fill(LETTERBOX_COLOR);

        let resized_data = resized.buffer();
        let stride = size * 3;
        let row_len = (new_width * 3) as usize;

        for y in 0..new_height {
            let src_row = (y * new_width * 3) as usize;
            let dst_row = ((y + offset_y) * stride + offset_x * 3) as usize;

            self.letterboxed_buffer[dst_row..dst_row + row_len]
                .copy_from_slice(&resized_data[src_row..src_row + row_len]);
        }

        Ok(Letterbox {
            scale,
            offset_x: offset_x as f32,
            offset_y: offset_y as f32,
        })
    }

    fn normalize(&self) -> anyhow::Result<Array<f32, IxDyn>> {
        let _s = span!("normalize");

        let size = self.input_size as usize;
        let spatial = size * size;

        // Output plane index for each source channel (R, G, B).
        let planes = match self.channel_order {
            ChannelOrder::Rgb => [0, 1, 2],
            ChannelOrder::Bgr => [2, 1, 0],
        };

        let mut output = vec![0.0f32; 3 * spatial];

        for (i, px) in self.letterboxed_buffer.chunks_exact(3).enumerate() {
            for (channel, &plane) in planes.iter().enumerate() {
                output[i + plane * spatial] = px[channel] as f32 / 255.0;
            }
        }

        Ok(Array::from_shape_vec(IxDyn(&[1, 3, size, size]), output)?)
    }
}
