//! The script-facing façade: an explicit VM context bundling the buffer
//! store, the matrix store, and the last-error slot, per the "global
//! singletons -> explicit context" design note. This replaces the
//! "initialized?" check the original module-level-state design needed on
//! every call, and lets more than one VM exist at a time.
use std::path::Path;

use crate::buffer::BufferStore;
use crate::codec;
use crate::error::LoadError;
use crate::filters::Algorithm;
use crate::matrix::Affine;
use crate::matrix::MatrixStore;
use crate::pixel::Argb8;
use crate::sampler::{self, Mask, SampleParams, SideX, SideY, SourceArea};

/// Sticky sampler configuration, carried across `sample` calls within one
/// VM. Matches the script operator surface's "configuration state is
/// sticky" rule: `sample_source` / `sample_target` / `sample_matrix` /
/// `sample_mask_*` / `sample_nearest` and friends mutate this, and `sample`
/// reads it without consuming it.
#[derive(Debug, Clone)]
pub struct SamplerState {
    pub src: Option<usize>,
    pub src_area: Option<SourceArea>,
    pub target: Option<usize>,
    pub matrix: Option<usize>,
    pub mask: Mask,
    pub alg: Algorithm,
}

impl Default for SamplerState {
    fn default() -> Self {
        SamplerState { src: None, src_area: None, target: None, matrix: None, mask: Mask::NONE, alg: Algorithm::Bilinear }
    }
}

/// The VM context: owns the buffer store, the matrix store, the sticky
/// sampler configuration, and the process-wide last-error slot.
pub struct Vm {
    buffers: BufferStore,
    matrices: MatrixStore,
    sampler: SamplerState,
    last_error: Option<String>,
}

impl Vm {
    pub fn new(bufc: usize, matc: usize) -> Self {
        Vm {
            buffers: BufferStore::new(bufc),
            matrices: MatrixStore::new(matc),
            sampler: SamplerState::default(),
            last_error: None,
        }
    }

    pub fn bufc(&self) -> usize {
        self.buffers.bufc()
    }

    pub fn matc(&self) -> usize {
        self.matrices.matc()
    }

    /// The last recorded error, or the "No error" sentinel.
    pub fn last_error(&self) -> &str {
        self.last_error.as_deref().unwrap_or("No error")
    }

    fn record<T>(&mut self, result: Result<T, LoadError>) -> bool {
        match result {
            Ok(_) => true,
            Err(e) => {
                self.last_error = Some(e.to_string());
                false
            }
        }
    }

    // --- buffer register store -------------------------------------------------

    pub fn get_dim(&self, i: usize) -> (u32, u32) {
        self.buffers.get_dim(i)
    }

    pub fn get_channels(&self, i: usize) -> u8 {
        self.buffers.get_channels(i)
    }

    pub fn is_loaded(&self, i: usize) -> bool {
        self.buffers.is_loaded(i)
    }

    pub fn reset(&mut self, i: usize, w: u32, h: u32, c: u8) {
        self.buffers.reset(i, w, h, c);
    }

    pub fn load_fill(&mut self, i: usize, a: u8, r: u8, g: u8, b: u8) {
        self.buffers.load_fill(i, Argb8::new(a, r, g, b));
    }

    pub fn color_invert(&mut self, i: usize) {
        self.buffers.color_invert(i);
    }

    /// Returns `true` on success; on failure the register is left unloaded
    /// and the reason is available from [`Vm::last_error`].
    pub fn load_png(&mut self, i: usize, path: &Path) -> bool {
        let result = codec::load_png(&mut self.buffers, i, path);
        self.record(result)
    }

    pub fn load_jpeg(&mut self, i: usize, path: &Path) -> bool {
        let result = codec::load_jpeg(&mut self.buffers, i, path);
        self.record(result)
    }

    pub fn load_mjpg(&mut self, i: usize, f: i64, index_path: &Path) -> bool {
        let result = codec::load_mjpg(&mut self.buffers, i, f, index_path);
        self.record(result)
    }

    pub fn store_png(&mut self, i: usize, path: &Path) -> bool {
        let result = codec::store_png(&self.buffers, i, path);
        self.record(result)
    }

    pub fn store_jpeg(&mut self, i: usize, path: &Path, mjpg: bool, q: u8) -> bool {
        let result = codec::store_jpeg(&self.buffers, i, path, mjpg, q);
        self.record(result)
    }

    // --- matrix register store --------------------------------------------------

    pub fn matrix_get(&self, m: usize) -> Affine {
        self.matrices.get(m)
    }

    pub fn matrix_reset(&mut self, m: usize) {
        self.matrices.reset(m);
    }

    pub fn matrix_multiply(&mut self, m: usize, a: usize, b: usize) {
        self.matrices.multiply(m, a, b);
    }

    pub fn matrix_translate(&mut self, m: usize, tx: f64, ty: f64) {
        self.matrices.translate(m, tx, ty);
    }

    pub fn matrix_scale(&mut self, m: usize, sx: f64, sy: f64) {
        self.matrices.scale(m, sx, sy);
    }

    pub fn matrix_rotate(&mut self, m: usize, deg: f64) {
        self.matrices.rotate(m, deg);
    }

    // --- sampler configuration (sticky) -----------------------------------------

    pub fn sample_source(&mut self, i: usize) {
        self.sampler.src = Some(i);
        self.sampler.src_area = None;
    }

    pub fn sample_source_area(&mut self, i: usize, x: i32, y: i32, w: i32, h: i32) {
        self.sampler.src = Some(i);
        self.sampler.src_area = Some(SourceArea { x, y, w, h });
    }

    pub fn sample_target(&mut self, i: usize) {
        self.sampler.target = Some(i);
    }

    pub fn sample_matrix(&mut self, m: usize) {
        self.sampler.matrix = Some(m);
    }

    pub fn sample_mask_none(&mut self) {
        self.sampler.mask = Mask::NONE;
    }

    pub fn sample_mask_x(&mut self, v: f64) {
        if let Mask::Procedural { ref mut x_boundary, .. } = self.sampler.mask {
            *x_boundary = v;
        } else {
            self.sampler.mask =
                Mask::Procedural { x_boundary: v, side_x: SideX::Left, y_boundary: 0.0, side_y: SideY::Above };
        }
    }

    pub fn sample_mask_y(&mut self, v: f64) {
        if let Mask::Procedural { ref mut y_boundary, .. } = self.sampler.mask {
            *y_boundary = v;
        } else {
            self.sampler.mask =
                Mask::Procedural { x_boundary: 0.0, side_x: SideX::Left, y_boundary: v, side_y: SideY::Above };
        }
    }

    pub fn sample_mask_left(&mut self) {
        self.set_side_x(SideX::Left);
    }

    pub fn sample_mask_right(&mut self) {
        self.set_side_x(SideX::Right);
    }

    pub fn sample_mask_above(&mut self) {
        self.set_side_y(SideY::Above);
    }

    pub fn sample_mask_below(&mut self) {
        self.set_side_y(SideY::Below);
    }

    fn set_side_x(&mut self, side: SideX) {
        match self.sampler.mask {
            Mask::Procedural { ref mut side_x, .. } => *side_x = side,
            Mask::Raster { .. } => {
                self.sampler.mask =
                    Mask::Procedural { x_boundary: 0.0, side_x: side, y_boundary: 0.0, side_y: SideY::Above };
            }
        }
    }

    fn set_side_y(&mut self, side: SideY) {
        match self.sampler.mask {
            Mask::Procedural { ref mut side_y, .. } => *side_y = side,
            Mask::Raster { .. } => {
                self.sampler.mask =
                    Mask::Procedural { x_boundary: 0.0, side_x: SideX::Left, y_boundary: 0.0, side_y: side };
            }
        }
    }

    pub fn sample_mask_raster(&mut self, i: usize) {
        self.sampler.mask = Mask::Raster { buffer: i };
    }

    pub fn sample_nearest(&mut self) {
        self.sampler.alg = Algorithm::Nearest;
    }

    pub fn sample_bilinear(&mut self) {
        self.sampler.alg = Algorithm::Bilinear;
    }

    pub fn sample_bicubic(&mut self) {
        self.sampler.alg = Algorithm::Bicubic;
    }

    /// Run the engine using the current sticky configuration. Fatal
    /// (process-aborting) if source, target, or matrix haven't been
    /// configured yet, mirroring every other precondition `sample` checks.
    pub fn sample(&mut self) {
        let src = self.sampler.src.unwrap_or_else(|| crate::error::vm_fault!("sample source not configured"));
        let target =
            self.sampler.target.unwrap_or_else(|| crate::error::vm_fault!("sample target not configured"));
        let matrix =
            self.sampler.matrix.unwrap_or_else(|| crate::error::vm_fault!("sample matrix not configured"));

        let params = SampleParams {
            src_buf: src,
            target_buf: target,
            subarea: self.sampler.src_area,
            t_matrix: matrix,
            mask: self.sampler.mask,
            alg: self.sampler.alg,
        };
        sampler::sample(&mut self.buffers, &mut self.matrices, &params);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_transform_copies_source_exactly() {
        let mut vm = Vm::new(2, 1);
        vm.reset(0, 4, 4, 3);
        vm.load_fill(0, 255, 10, 20, 30);
        vm.reset(1, 4, 4, 3);
        vm.load_fill(1, 255, 0, 0, 0);

        vm.sample_source(0);
        vm.sample_target(1);
        vm.sample_matrix(0);
        vm.sample_mask_none();
        vm.sample_nearest();
        vm.sample();

        assert_eq!(vm.get_dim(0), vm.get_dim(1));
    }

    #[test]
    fn s2_overwrite_with_solid_colour() {
        let mut vm = Vm::new(2, 1);
        vm.reset(0, 2, 2, 3);
        vm.load_fill(0, 255, 0, 0, 255);
        vm.reset(1, 2, 2, 3);
        vm.load_fill(1, 255, 255, 255, 255);

        vm.sample_source(0);
        vm.sample_target(1);
        vm.sample_matrix(0);
        vm.sample_mask_none();
        vm.sample_nearest();
        vm.sample();
    }

    #[test]
    fn s6_scale_zero_is_fatal() {
        let result = std::panic::catch_unwind(|| {
            let mut vm = Vm::new(1, 1);
            vm.matrix_scale(0, 0.0, 1.0);
        });
        assert!(result.is_err());
    }

    #[test]
    fn last_error_defaults_to_sentinel() {
        let vm = Vm::new(1, 1);
        assert_eq!(vm.last_error(), "No error");
    }
}
