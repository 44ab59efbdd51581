//! The sampler-compositor: the heart of the engine. Walks the target pixels
//! inside a transformed source rectangle, projects each one back through
//! the inverse transform, reconstructs a source colour, applies masking,
//! and alpha-composites OVER into the target.
use crate::buffer::BufferStore;
use crate::error::vm_fault;
use crate::filters::{self, Algorithm, SourceView};
use crate::matrix::MatrixStore;
use crate::pixel::Argb8;

/// Which side of a procedural boundary is kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideX {
    Left,
    Right,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SideY {
    Above,
    Below,
}

/// Masking configuration. A variant hierarchy rather than a bitmask: each
/// constructor is internally consistent, so the cross-flag checks the
/// original bitset design needed collapse into "which variant is this".
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Mask {
    Procedural { x_boundary: f64, side_x: SideX, y_boundary: f64, side_y: SideY },
    Raster { buffer: usize },
}

impl Mask {
    /// The pass-all default: `sample_mask_none`'s effect.
    pub const NONE: Mask =
        Mask::Procedural { x_boundary: 0.0, side_x: SideX::Left, y_boundary: 0.0, side_y: SideY::Above };
}

/// A source subarea in absolute source-buffer pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SourceArea {
    pub x: i32,
    pub y: i32,
    pub w: i32,
    pub h: i32,
}

/// The ephemeral parameter block consumed by one `sample` call.
#[derive(Debug, Clone)]
pub struct SampleParams {
    pub src_buf: usize,
    pub target_buf: usize,
    /// `None` selects the full source extent, matching the subarea flag
    /// being off.
    pub subarea: Option<SourceArea>,
    pub t_matrix: usize,
    pub mask: Mask,
    pub alg: Algorithm,
}

fn bounding_box_column(boundary: f64, target_w: u32) -> i64 {
    if boundary <= 0.0 {
        0
    } else if boundary >= 1.0 {
        target_w as i64 - 1
    } else {
        (boundary * (target_w as i64 - 1) as f64).floor() as i64
    }
}

/// Runs one `sample` operation: the contract-checking entry point for the
/// engine described in `spec.md` §4.5. Any precondition violation is a
/// programmer fault and aborts the process; there are no recoverable
/// failures inside this call.
pub fn sample(buffers: &mut BufferStore, matrices: &mut MatrixStore, params: &SampleParams) {
    if params.src_buf == params.target_buf {
        vm_fault!("sample source and target must be distinct buffers");
    }
    if let Mask::Raster { buffer } = params.mask {
        if buffer == params.src_buf || buffer == params.target_buf {
            vm_fault!("raster mask buffer must differ from source and target");
        }
    }
    if !buffers.is_loaded(params.src_buf) {
        vm_fault!("sample source buffer {} is not loaded", params.src_buf);
    }
    if !buffers.is_loaded(params.target_buf) {
        vm_fault!("sample target buffer {} is not loaded", params.target_buf);
    }

    let (src_w, src_h, src_channels) = buffers.dims_channels(params.src_buf);
    let (target_w, target_h, target_channels) = buffers.dims_channels(params.target_buf);

    let area = params.subarea.unwrap_or(SourceArea { x: 0, y: 0, w: src_w as i32, h: src_h as i32 });
    if area.w < 0
        || area.h < 0
        || area.x < 0
        || area.y < 0
        || area.x as i64 + area.w as i64 > src_w as i64
        || area.y as i64 + area.h as i64 > src_h as i64
    {
        vm_fault!("source subarea {:?} lies outside the {}x{} source buffer", area, src_w, src_h);
    }

    let mask_pixels: Option<Vec<u8>> = match params.mask {
        Mask::Raster { buffer } => {
            if !buffers.is_loaded(buffer) {
                vm_fault!("raster mask buffer {} is not loaded", buffer);
            }
            if buffers.get_channels(buffer) != 1 {
                vm_fault!("raster mask buffer {} must be grayscale", buffer);
            }
            let (mw, mh) = buffers.get_dim(buffer);
            if (mw, mh) != (target_w, target_h) {
                vm_fault!(
                    "raster mask dimensions {}x{} must match target dimensions {}x{}",
                    mw,
                    mh,
                    target_w,
                    target_h
                );
            }
            Some(buffers.mask_pixels(buffer).to_vec())
        }
        Mask::Procedural { x_boundary, y_boundary, .. } => {
            if !(0.0..=1.0).contains(&x_boundary) || !x_boundary.is_finite() {
                vm_fault!("x_boundary {} out of [0, 1]", x_boundary);
            }
            if !(0.0..=1.0).contains(&y_boundary) || !y_boundary.is_finite() {
                vm_fault!("y_boundary {} out of [0, 1]", y_boundary);
            }
            None
        }
    };

    let src_pixels = buffers.pixels(params.src_buf).expect("checked loaded above").to_vec();

    let forward = matrices.get(params.t_matrix);
    let corners = [
        (area.x as f64, area.y as f64),
        (area.x as f64 + area.w as f64, area.y as f64),
        (area.x as f64, area.y as f64 + area.h as f64),
        (area.x as f64 + area.w as f64, area.y as f64 + area.h as f64),
    ];
    let mut min_x = f64::INFINITY;
    let mut max_x = f64::NEG_INFINITY;
    let mut min_y = f64::INFINITY;
    let mut max_y = f64::NEG_INFINITY;
    for (cx, cy) in corners {
        let (tx, ty) = forward.apply(cx, cy);
        if !tx.is_finite() || !ty.is_finite() {
            vm_fault!("transform produced a non-finite corner ({}, {})", tx, ty);
        }
        min_x = min_x.min(tx);
        max_x = max_x.max(tx);
        min_y = min_y.min(ty);
        max_y = max_y.max(ty);
    }

    let lo_x = min_x.floor();
    let hi_x = max_x.ceil();
    let lo_y = min_y.floor();
    let hi_y = max_y.ceil();
    if !(lo_x.is_finite() && hi_x.is_finite() && lo_y.is_finite() && hi_y.is_finite())
        || lo_x < i32::MIN as f64
        || hi_x > i32::MAX as f64
        || lo_y < i32::MIN as f64
        || hi_y > i32::MAX as f64
    {
        vm_fault!("sample bounding box out of signed 32-bit range");
    }

    let mut x0 = (lo_x as i64).max(0);
    let mut x1 = (hi_x as i64).min(target_w as i64 - 1);
    let mut y0 = (lo_y as i64).max(0);
    let mut y1 = (hi_y as i64).min(target_h as i64 - 1);

    if let Mask::Procedural { x_boundary, side_x, y_boundary, side_y } = params.mask {
        let bx = bounding_box_column(x_boundary, target_w);
        match side_x {
            SideX::Left => x0 = x0.max(bx),
            SideX::Right => x1 = x1.min(bx),
        }
        let by = bounding_box_column(y_boundary, target_h);
        match side_y {
            SideY::Above => y0 = y0.max(by),
            SideY::Below => y1 = y1.min(by),
        }
    }

    if x0 > x1 || y0 > y1 {
        return;
    }

    let inverse = matrices.inverse(params.t_matrix);
    let source_view =
        SourceView { pixels: &src_pixels, width: src_w, height: src_h, channels: src_channels };

    let (target_pixels, _) = buffers.target_pixels_mut(params.target_buf);
    let target_stride = target_channels as usize;
    let target_w_usize = target_w as usize;

    for y in y0..=y1 {
        for x in x0..=x1 {
            if let Some(ref mask_buf) = mask_pixels {
                let idx = y as usize * target_w_usize + x as usize;
                if mask_buf[idx] == 0 {
                    continue;
                }
            }

            let (sx, sy) = inverse.apply(x as f64 + 0.5, y as f64 + 0.5);
            if !sx.is_finite() || !sy.is_finite() {
                vm_fault!("inverse transform produced a non-finite source point");
            }

            let area_x0 = area.x as f64;
            let area_x1 = area.x as f64 + area.w as f64;
            let area_y0 = area.y as f64;
            let area_y1 = area.y as f64 + area.h as f64;
            if sx < area_x0 || sx > area_x1 || sy < area_y0 || sy > area_y1 {
                continue;
            }

            let mut src_colour = filters::sample(&source_view, params.alg, sx, sy);
            if let Some(ref mask_buf) = mask_pixels {
                let idx = y as usize * target_w_usize + x as usize;
                let m = mask_buf[idx];
                if m != 255 {
                    src_colour = src_colour.scale(f64::from(m) / 255.0);
                }
            }

            let target_idx = (y as usize * target_w_usize + x as usize) * target_stride;
            let target_slice = &mut target_pixels[target_idx..target_idx + target_stride];
            let dst_colour = Argb8::read(target_slice, target_channels).to_premultiplied();
            let out = src_colour.over(dst_colour);
            out.to_argb8().write(target_slice, target_channels);
        }
    }
}
