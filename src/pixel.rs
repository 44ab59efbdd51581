//! Pixel representation and colour conversion.
//!
//! The engine has exactly three channel layouts: 1-channel gray, 3-channel
//! RGB, and 4-channel non-premultiplied ARGB (alpha first). Every load,
//! store, and composite operation funnels through the primitives here to
//! resolve a channel-count mismatch between what's on disk/in memory and
//! what a register declares.

/// An 8-bit, non-premultiplied colour, always carried as full ARGB even when
/// the underlying buffer is narrower. `a` is meaningless (but present, and
/// conventionally 255) for buffers that have no alpha channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Argb8 {
    pub a: u8,
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Argb8 {
    pub fn new(a: u8, r: u8, g: u8, b: u8) -> Self {
        Argb8 { a, r, g, b }
    }

    pub fn opaque(r: u8, g: u8, b: u8) -> Self {
        Argb8 { a: 255, r, g, b }
    }

    /// Composite over opaque black using its own alpha, yielding opaque RGB.
    pub fn down_to_rgb(self) -> (u8, u8, u8) {
        let a = f64::from(self.a) / 255.0;
        let r = (f64::from(self.r) * a).round().clamp(0.0, 255.0) as u8;
        let g = (f64::from(self.g) * a).round().clamp(0.0, 255.0) as u8;
        let b = (f64::from(self.b) * a).round().clamp(0.0, 255.0) as u8;
        (r, g, b)
    }

    /// Rec. 601 luma, applied after down-converting to opaque RGB.
    pub fn down_to_gray(self) -> u8 {
        let (r, g, b) = self.down_to_rgb();
        luma(r, g, b)
    }

    pub fn up_from_gray(gray: u8) -> Self {
        Argb8 { a: 255, r: gray, g: gray, b: gray }
    }

    pub fn up_from_rgb(r: u8, g: u8, b: u8) -> Self {
        Argb8 { a: 255, r, g, b }
    }

    /// Convert to premultiplied floating-point ARGB in `[0, 1]`.
    pub fn to_premultiplied(self) -> PremulArgb {
        let a = f64::from(self.a) / 255.0;
        PremulArgb {
            a,
            r: f64::from(self.r) / 255.0 * a,
            g: f64::from(self.g) / 255.0 * a,
            b: f64::from(self.b) / 255.0 * a,
        }
    }

    /// Read a colour out of a packed buffer row at the given channel count,
    /// promoting narrower encodings to full ARGB.
    pub fn read(bytes: &[u8], channels: u8) -> Self {
        match channels {
            1 => Argb8::up_from_gray(bytes[0]),
            3 => Argb8::up_from_rgb(bytes[0], bytes[1], bytes[2]),
            4 => Argb8::new(bytes[0], bytes[1], bytes[2], bytes[3]),
            _ => unreachable!("channel count invariant enforced at buffer boundary"),
        }
    }

    /// Write a colour into a packed buffer row, down-converting to the
    /// declared channel count.
    pub fn write(self, bytes: &mut [u8], channels: u8) {
        match channels {
            1 => bytes[0] = self.down_to_gray(),
            3 => {
                let (r, g, b) = self.down_to_rgb();
                bytes[0] = r;
                bytes[1] = g;
                bytes[2] = b;
            }
            4 => {
                bytes[0] = self.a;
                bytes[1] = self.r;
                bytes[2] = self.g;
                bytes[3] = self.b;
            }
            _ => unreachable!("channel count invariant enforced at buffer boundary"),
        }
    }
}

/// Rec. 601 luma weighting, shared by down-conversion and the gray fill path.
pub fn luma(r: u8, g: u8, b: u8) -> u8 {
    let y = 0.299 * f64::from(r) + 0.587 * f64::from(g) + 0.114 * f64::from(b);
    finite_or_fault(y).round().clamp(0.0, 255.0) as u8
}

/// Premultiplied ARGB, the engine's sole working colour space during
/// sampling and compositing. All four channels live in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct PremulArgb {
    pub a: f64,
    pub r: f64,
    pub g: f64,
    pub b: f64,
}

impl PremulArgb {
    pub const TRANSPARENT: PremulArgb = PremulArgb { a: 0.0, r: 0.0, g: 0.0, b: 0.0 };

    pub fn scale(self, k: f64) -> Self {
        PremulArgb { a: self.a * k, r: self.r * k, g: self.g * k, b: self.b * k }
    }

    /// Porter-Duff OVER: `out = src + dst * (1 - src.a)`, channel-wise.
    pub fn over(self, dst: PremulArgb) -> PremulArgb {
        let k = 1.0 - self.a;
        PremulArgb {
            a: self.a + dst.a * k,
            r: self.r + dst.r * k,
            g: self.g + dst.g * k,
            b: self.b + dst.b * k,
        }
    }

    /// Un-premultiply and quantize back to 8-bit non-premultiplied ARGB.
    /// Near-zero alpha is defined to be fully transparent black rather than
    /// dividing by (near) zero.
    pub fn to_argb8(self) -> Argb8 {
        for v in [self.a, self.r, self.g, self.b] {
            if !v.is_finite() {
                crate::error::vm_fault!("non-finite colour channel during sampling: {:?}", self);
            }
        }
        if self.a < 1.0 / 512.0 {
            return Argb8::new(0, 0, 0, 0);
        }
        let byte = |c: f64| (c / self.a).clamp(0.0, 1.0) * 255.0;
        Argb8::new(
            (self.a * 255.0).round().clamp(0.0, 255.0) as u8,
            byte(self.r).round() as u8,
            byte(self.g).round() as u8,
            byte(self.b).round() as u8,
        )
    }
}

fn finite_or_fault(v: f64) -> f64 {
    if !v.is_finite() {
        crate::error::vm_fault!("non-finite intermediate in luma conversion");
    }
    v
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rgb_up_then_down_is_identity() {
        let c = Argb8::up_from_rgb(10, 20, 30);
        assert_eq!(c.down_to_rgb(), (10, 20, 30));
    }

    #[test]
    fn gray_round_trips() {
        let c = Argb8::up_from_gray(200);
        assert_eq!(c.down_to_gray(), 200);
    }

    #[test]
    fn premultiply_then_unpremultiply_is_identity_when_opaque() {
        let c = Argb8::opaque(12, 34, 56);
        let p = c.to_premultiplied();
        assert_eq!(p.to_argb8(), c);
    }

    #[test]
    fn transparent_collapses_to_transparent_black() {
        let p = PremulArgb { a: 0.0, r: 0.3, g: 0.3, b: 0.3 };
        assert_eq!(p.to_argb8(), Argb8::new(0, 0, 0, 0));
    }

    #[test]
    fn over_opaque_source_yields_source() {
        let src = Argb8::opaque(1, 2, 3).to_premultiplied();
        let dst = Argb8::opaque(200, 150, 50).to_premultiplied();
        let out = src.over(dst).to_argb8();
        assert_eq!(out, Argb8::opaque(1, 2, 3));
    }

    #[test]
    fn over_transparent_source_leaves_target_unchanged() {
        let src = PremulArgb::TRANSPARENT;
        let dst = Argb8::opaque(9, 8, 7).to_premultiplied();
        let out = src.over(dst).to_argb8();
        assert_eq!(out, Argb8::opaque(9, 8, 7));
    }
}
