//! CPU blur kernels.
//!
//! Leaf contract: the caller hands a read-accessible source and a
//! write-accessible target of identical dimensions; neither lock is
//! retained beyond the call. Edge pixels are clamp-extended.

use lumira_core::PixelBuffer;

/// Box filter of the given radius. Radius 0 copies the source.
pub fn box_blur(src: &PixelBuffer, dst: &mut PixelBuffer, radius: u32) {
    debug_assert_eq!((src.width(), src.height()), (dst.width(), dst.height()));
    if radius == 0 {
        *dst = src.clone();
        return;
    }
    let mut tmp = src.clone();
    horizontal_pass(src, &mut tmp, radius);
    vertical_pass(&tmp, dst, radius);
}

/// Gaussian approximation via three successive box passes, the usual
/// cheap close-enough kernel for soft shadows and glows.
pub fn gaussian_blur(src: &PixelBuffer, dst: &mut PixelBuffer, radius: u32) {
    debug_assert_eq!((src.width(), src.height()), (dst.width(), dst.height()));
    if radius == 0 {
        *dst = src.clone();
        return;
    }
    let pass_radius = (radius / 2).max(1);
    let mut a = src.clone();
    let mut b = src.clone();
    box_blur(&a, &mut b, pass_radius);
    box_blur(&b, &mut a, pass_radius);
    box_blur(&a, dst, pass_radius);
}

fn horizontal_pass(src: &PixelBuffer, dst: &mut PixelBuffer, radius: u32) {
    let w = src.width() as i32;
    let h = src.height() as i32;
    let r = radius as i32;
    let window = (2 * r + 1) as u32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 4];
            for dx in -r..=r {
                let sx = (x + dx).clamp(0, w - 1);
                let px = src.get_pixel(sx as u32, y as u32).unwrap_or([0, 0, 0, 0]);
                for c in 0..4 {
                    acc[c] += px[c] as u32;
                }
            }
            dst.set_pixel(
                x as u32,
                y as u32,
                [
                    (acc[0] / window) as u8,
                    (acc[1] / window) as u8,
                    (acc[2] / window) as u8,
                    (acc[3] / window) as u8,
                ],
            );
        }
    }
}

fn vertical_pass(src: &PixelBuffer, dst: &mut PixelBuffer, radius: u32) {
    let w = src.width() as i32;
    let h = src.height() as i32;
    let r = radius as i32;
    let window = (2 * r + 1) as u32;
    for y in 0..h {
        for x in 0..w {
            let mut acc = [0u32; 4];
            for dy in -r..=r {
                let sy = (y + dy).clamp(0, h - 1);
                let px = src.get_pixel(x as u32, sy as u32).unwrap_or([0, 0, 0, 0]);
                for c in 0..4 {
                    acc[c] += px[c] as u32;
                }
            }
            dst.set_pixel(
                x as u32,
                y as u32,
                [
                    (acc[0] / window) as u8,
                    (acc[1] / window) as u8,
                    (acc[2] / window) as u8,
                    (acc[3] / window) as u8,
                ],
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lumira_core::Color;

    #[test]
    fn test_zero_radius_copies() {
        let src = PixelBuffer::solid(8, 8, Color::RED).unwrap();
        let mut dst = PixelBuffer::try_new(8, 8, None).unwrap();
        box_blur(&src, &mut dst, 0);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_uniform_input_is_fixed_point() {
        // A constant image blurs to itself for any radius.
        let src = PixelBuffer::solid(16, 16, Color::GREEN).unwrap();
        let mut dst = PixelBuffer::try_new(16, 16, None).unwrap();
        box_blur(&src, &mut dst, 3);
        assert_eq!(dst, src);
        gaussian_blur(&src, &mut dst, 3);
        assert_eq!(dst, src);
    }

    #[test]
    fn test_output_dimensions_match() {
        let src = PixelBuffer::solid(9, 5, Color::BLUE).unwrap();
        let mut dst = PixelBuffer::try_new(9, 5, None).unwrap();
        gaussian_blur(&src, &mut dst, 2);
        assert_eq!((dst.width(), dst.height()), (9, 5));
    }

    #[test]
    fn test_spike_spreads() {
        let mut src = PixelBuffer::try_new(9, 9, None).unwrap();
        src.set_pixel(4, 4, [255, 255, 255, 255]);
        let mut dst = PixelBuffer::try_new(9, 9, None).unwrap();
        box_blur(&src, &mut dst, 1);
        let center = dst.get_pixel(4, 4).unwrap();
        let neighbor = dst.get_pixel(3, 4).unwrap();
        assert!(center[0] > 0 && center[0] < 255);
        assert!(neighbor[0] > 0);
        // Far corner untouched by a radius-1 kernel.
        assert_eq!(dst.get_pixel(0, 0), Some([0, 0, 0, 0]));
    }
}
