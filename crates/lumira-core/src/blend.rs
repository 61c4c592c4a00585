use serde::{Deserialize, Serialize};

/// Pixel blend mode used when compositing one buffer over another.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlendMode {
    /// Standard alpha blending (Porter-Duff "over").
    Normal,
    Add,
    Multiply,
    Screen,
}

impl Default for BlendMode {
    fn default() -> Self {
        BlendMode::Normal
    }
}

impl BlendMode {
    /// Blend straight-alpha `src` onto `dst`, returning the result pixel.
    pub fn blend(&self, dst: [u8; 4], src: [u8; 4]) -> [u8; 4] {
        let sa = src[3] as u32;
        if sa == 0 {
            return dst;
        }

        // Mix the source channel with the mode-specific combination of both
        // channels, then alpha-composite that over the destination.
        let mixed = |d: u32, s: u32| -> u32 {
            match self {
                BlendMode::Normal => s,
                BlendMode::Add => (d + s).min(255),
                BlendMode::Multiply => (d * s) / 255,
                BlendMode::Screen => 255 - ((255 - d) * (255 - s)) / 255,
            }
        };

        let da = dst[3] as u32;
        let inv_sa = 255 - sa;
        let out_a = sa + (da * inv_sa) / 255;
        if out_a == 0 {
            return [0, 0, 0, 0];
        }

        let mut out = [0u8; 4];
        for c in 0..3 {
            let d = dst[c] as u32;
            let s = mixed(d, src[c] as u32);
            let v = (s * sa * 255 + d * da * inv_sa) / (out_a * 255);
            out[c] = v.min(255) as u8;
        }
        out[3] = out_a as u8;
        out
    }
}
