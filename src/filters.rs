//! Reconstruction filters: nearest-neighbour, bilinear, and bicubic
//! resampling of a source buffer at fractional coordinates. All three
//! return premultiplied ARGB clamped to `[0, 1]`.
use crate::pixel::{Argb8, PremulArgb};

/// Which of the three reconstruction filters a sample operation uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Algorithm {
    Nearest,
    Bilinear,
    Bicubic,
}

/// A read-only view over a loaded source buffer's raw pixels, shared by all
/// three filters. Out-of-range integer coordinates are clamped to the last
/// valid pixel in each axis, the edge policy `spec.md` §4.4 calls for.
pub struct SourceView<'a> {
    pub pixels: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub channels: u8,
}

impl<'a> SourceView<'a> {
    fn at(&self, x: i64, y: i64) -> PremulArgb {
        let cx = x.clamp(0, self.width as i64 - 1) as usize;
        let cy = y.clamp(0, self.height as i64 - 1) as usize;
        let stride = self.channels as usize;
        let offset = (cy * self.width as usize + cx) * stride;
        Argb8::read(&self.pixels[offset..offset + stride], self.channels).to_premultiplied()
    }
}

fn clamp01(p: PremulArgb) -> PremulArgb {
    PremulArgb {
        a: p.a.clamp(0.0, 1.0),
        r: p.r.clamp(0.0, 1.0),
        g: p.g.clamp(0.0, 1.0),
        b: p.b.clamp(0.0, 1.0),
    }
}

pub fn sample(view: &SourceView, alg: Algorithm, x: f64, y: f64) -> PremulArgb {
    match alg {
        Algorithm::Nearest => nearest(view, x, y),
        Algorithm::Bilinear => bilinear(view, x, y),
        Algorithm::Bicubic => bicubic(view, x, y),
    }
}

fn nearest(view: &SourceView, x: f64, y: f64) -> PremulArgb {
    view.at(x.floor() as i64, y.floor() as i64)
}

fn bilinear(view: &SourceView, x: f64, y: f64) -> PremulArgb {
    // Pixel centres sit at half-integer coordinates.
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x0 = fx.floor();
    let y0 = fy.floor();
    let tx = fx - x0;
    let ty = fy - y0;
    let x0 = x0 as i64;
    let y0 = y0 as i64;

    let p00 = view.at(x0, y0);
    let p10 = view.at(x0 + 1, y0);
    let p01 = view.at(x0, y0 + 1);
    let p11 = view.at(x0 + 1, y0 + 1);

    let lerp = |a: PremulArgb, b: PremulArgb, t: f64| PremulArgb {
        a: a.a + (b.a - a.a) * t,
        r: a.r + (b.r - a.r) * t,
        g: a.g + (b.g - a.g) * t,
        b: a.b + (b.b - a.b) * t,
    };

    let top = lerp(p00, p10, tx);
    let bottom = lerp(p01, p11, tx);
    clamp01(lerp(top, bottom, ty))
}

/// Catmull-Rom cubic convolution weights for a fractional offset `t` in
/// `[0, 1)` from the second of four consecutive samples.
fn catmull_rom_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        -0.5 * t3 + t2 - 0.5 * t,
        1.5 * t3 - 2.5 * t2 + 1.0,
        -1.5 * t3 + 2.0 * t2 + 0.5 * t,
        0.5 * t3 - 0.5 * t2,
    ]
}

fn bicubic(view: &SourceView, x: f64, y: f64) -> PremulArgb {
    let fx = x - 0.5;
    let fy = y - 0.5;
    let x1 = fx.floor();
    let y1 = fy.floor();
    let tx = fx - x1;
    let ty = fy - y1;
    let x1 = x1 as i64;
    let y1 = y1 as i64;

    let wx = catmull_rom_weights(tx);
    let wy = catmull_rom_weights(ty);

    let mut acc = PremulArgb::default();
    for (j, &wyj) in wy.iter().enumerate() {
        let mut row = PremulArgb::default();
        for (i, &wxi) in wx.iter().enumerate() {
            let p = view.at(x1 - 1 + i as i64, y1 - 1 + j as i64);
            row.a += p.a * wxi;
            row.r += p.r * wxi;
            row.g += p.g * wxi;
            row.b += p.b * wxi;
        }
        acc.a += row.a * wyj;
        acc.r += row.r * wyj;
        acc.g += row.g * wyj;
        acc.b += row.b * wyj;
    }
    clamp01(acc)
}
