use crate::blend::BlendMode;
use crate::error::{CoreError, CoreResult};
use crate::math::RectI;
use crate::Color;

/// Densely packed RGBA8 pixel storage (4 bytes per pixel, row-major).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PixelBuffer {
    data: Vec<u8>,
    width: u32,
    height: u32,
}

impl PixelBuffer {
    /// Allocate a zeroed (transparent black) buffer.
    ///
    /// Fails when the byte size overflows or exceeds `budget` — the caller
    /// treats this as resource exhaustion, not a panic.
    pub fn try_new(width: u32, height: u32, budget: Option<usize>) -> CoreResult<Self> {
        let size = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(CoreError::DimensionOverflow { width, height })?;
        if let Some(budget) = budget {
            if size > budget {
                return Err(CoreError::AllocationBudget { width, height, budget });
            }
        }
        Ok(Self { data: vec![0u8; size], width, height })
    }

    /// Allocate a buffer filled with a solid color.
    pub fn solid(width: u32, height: u32, color: Color) -> CoreResult<Self> {
        let mut buf = Self::try_new(width, height, None)?;
        buf.fill(color.to_rgba8());
        Ok(buf)
    }

    pub fn from_raw(width: u32, height: u32, data: Vec<u8>) -> CoreResult<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|n| n.checked_mul(4))
            .ok_or(CoreError::DimensionOverflow { width, height })?;
        if data.len() != expected {
            return Err(CoreError::InvalidArgument(format!(
                "raw pixel data length {} does not match {}x{}",
                data.len(),
                width,
                height
            )));
        }
        Ok(Self { data, width, height })
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn bounds(&self) -> RectI {
        RectI::from_size(self.width, self.height)
    }

    pub fn pixel_count(&self) -> usize {
        (self.width as usize) * (self.height as usize)
    }

    pub fn byte_size(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    /// RGBA value at a pixel coordinate. `None` when out of bounds.
    pub fn get_pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let off = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        Some([self.data[off], self.data[off + 1], self.data[off + 2], self.data[off + 3]])
    }

    /// Set the RGBA value at a pixel coordinate. No-op out of bounds.
    pub fn set_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4]) {
        if x >= self.width || y >= self.height {
            return;
        }
        let off = ((y as usize) * (self.width as usize) + (x as usize)) * 4;
        self.data[off..off + 4].copy_from_slice(&rgba);
    }

    /// Blend `rgba` onto the pixel at (x, y) with the given mode.
    pub fn blend_pixel(&mut self, x: u32, y: u32, rgba: [u8; 4], mode: BlendMode) {
        if let Some(dst) = self.get_pixel(x, y) {
            self.set_pixel(x, y, mode.blend(dst, rgba));
        }
    }

    /// Fill the whole buffer with one RGBA value.
    pub fn fill(&mut self, rgba: [u8; 4]) {
        for px in self.data.chunks_exact_mut(4) {
            px.copy_from_slice(&rgba);
        }
    }

    /// Fill `rect` (clipped to the buffer) with one RGBA value.
    pub fn fill_rect(&mut self, rect: RectI, rgba: [u8; 4]) {
        let clipped = rect.intersect(&self.bounds());
        if !clipped.is_valid() {
            return;
        }
        for y in clipped.y0..clipped.y1 {
            for x in clipped.x0..clipped.x1 {
                self.set_pixel(x as u32, y as u32, rgba);
            }
        }
    }

    /// Blend `src` onto `self` with its top-left corner at (dx, dy).
    pub fn blend_over(&mut self, src: &PixelBuffer, dx: i32, dy: i32, mode: BlendMode) {
        let dst_rect = RectI::new(dx, dy, dx + src.width as i32, dy + src.height as i32)
            .intersect(&self.bounds());
        if !dst_rect.is_valid() {
            return;
        }
        for y in dst_rect.y0..dst_rect.y1 {
            for x in dst_rect.x0..dst_rect.x1 {
                let sp = src
                    .get_pixel((x - dx) as u32, (y - dy) as u32)
                    .unwrap_or([0, 0, 0, 0]);
                if sp[3] == 0 {
                    continue;
                }
                if sp[3] == 255 && mode == BlendMode::Normal {
                    self.set_pixel(x as u32, y as u32, sp);
                    continue;
                }
                self.blend_pixel(x as u32, y as u32, sp, mode);
            }
        }
    }
}
