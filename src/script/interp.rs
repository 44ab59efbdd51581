//! Operator dispatch: a name -> function table mapping each operator in
//! `spec.md` §6's table to a typed call on [`crate::vm::Vm`]. This is the
//! "thin operator registration shim" the core engine spec treats as an
//! external collaborator; it has no logic of its own beyond stack-argument
//! marshalling and surfacing `Vm::last_error` as a diagnostic line.
use std::path::PathBuf;

use crate::vm::Vm;

use super::stack::{Cell, Stack};
use super::ScriptError;

type OpResult = Result<(), ScriptError>;

/// Dispatch one operator by name. Returns `Ok(())` having already mutated
/// `stack`/`vm` as appropriate, or a [`ScriptError`] for an unknown
/// operator, a type mismatch, stack underflow, or a recoverable I/O
/// failure (with `Vm::last_error`'s text folded in).
pub fn dispatch(name: &str, vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    match name {
        "print" => op_print(vm, stack, line),
        "reset" => op_reset(vm, stack, line),
        "load_png" => op_load_png(vm, stack, line),
        "load_jpeg" => op_load_jpeg(vm, stack, line),
        "load_frame" => op_load_frame(vm, stack, line),
        "fill" => op_fill(vm, stack, line),
        "store_png" => op_store_png(vm, stack, line),
        "store_jpeg" => op_store_jpeg(vm, stack, line, false),
        "store_mjpg" => op_store_jpeg(vm, stack, line, true),
        "identity" => with_one_index(vm, stack, line, RegKind::Matrix, Vm::matrix_reset),
        "multiply" => op_multiply(vm, stack, line),
        "translate" => op_translate(vm, stack, line),
        "scale" => op_scale(vm, stack, line),
        "rotate" => op_rotate(vm, stack, line),
        "color_invert" => with_one_index(vm, stack, line, RegKind::Buffer, Vm::color_invert),
        "sample_source" => with_one_index(vm, stack, line, RegKind::Buffer, Vm::sample_source),
        "sample_source_area" => op_sample_source_area(vm, stack, line),
        "sample_target" => with_one_index(vm, stack, line, RegKind::Buffer, Vm::sample_target),
        "sample_matrix" => with_one_index(vm, stack, line, RegKind::Matrix, Vm::sample_matrix),
        "sample_mask_none" => {
            vm.sample_mask_none();
            Ok(())
        }
        "sample_mask_x" => op_mask_boundary(vm, stack, line, Vm::sample_mask_x),
        "sample_mask_y" => op_mask_boundary(vm, stack, line, Vm::sample_mask_y),
        "sample_mask_left" => {
            vm.sample_mask_left();
            Ok(())
        }
        "sample_mask_right" => {
            vm.sample_mask_right();
            Ok(())
        }
        "sample_mask_above" => {
            vm.sample_mask_above();
            Ok(())
        }
        "sample_mask_below" => {
            vm.sample_mask_below();
            Ok(())
        }
        "sample_mask_raster" => with_one_index(vm, stack, line, RegKind::Buffer, Vm::sample_mask_raster),
        "sample_nearest" => {
            vm.sample_nearest();
            Ok(())
        }
        "sample_bilinear" => {
            vm.sample_bilinear();
            Ok(())
        }
        "sample_bicubic" => {
            vm.sample_bicubic();
            Ok(())
        }
        "sample" => {
            vm.sample();
            Ok(())
        }
        other => Err(ScriptError::new(line, format!("unknown operator '{}'", other))),
    }
}

#[derive(Clone, Copy)]
enum RegKind {
    Buffer,
    Matrix,
}

impl RegKind {
    fn bound(self, vm: &Vm) -> usize {
        match self {
            RegKind::Buffer => vm.bufc(),
            RegKind::Matrix => vm.matc(),
        }
    }

    fn name(self) -> &'static str {
        match self {
            RegKind::Buffer => "buffer",
            RegKind::Matrix => "matrix",
        }
    }
}

fn index_of(cell: &Cell, line: u64, bound: usize, what: &str) -> Result<usize, ScriptError> {
    let i = cell.as_int(line)?;
    if i < 0 || i as usize >= bound {
        return Err(ScriptError::new(line, format!("invalid {} index {}", what, i)));
    }
    Ok(i as usize)
}

fn with_one_index(
    vm: &mut Vm,
    stack: &mut Stack,
    line: u64,
    kind: RegKind,
    f: fn(&mut Vm, usize),
) -> OpResult {
    let args = stack.pop_args(1, line)?;
    let i = index_of(&args[0], line, kind.bound(vm), kind.name())?;
    f(vm, i);
    Ok(())
}

fn op_print(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let _ = vm;
    let args = stack.pop_args(1, line)?;
    eprintln!("{}", args[0].as_str(line)?);
    Ok(())
}

fn op_reset(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(4, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let w = args[1].as_int(line)?;
    let h = args[2].as_int(line)?;
    let c = args[3].as_int(line)?;
    if w < 1 || h < 1 || !(c == 1 || c == 3 || c == 4) {
        return Err(ScriptError::new(line, "reset: invalid dimensions or channel count".to_string()));
    }
    vm.reset(i, w as u32, h as u32, c as u8);
    Ok(())
}

fn report_load(vm: &Vm, ok: bool, line: u64, what: &str, path: &str) -> OpResult {
    if ok {
        Ok(())
    } else {
        Err(ScriptError::new(line, format!("{} '{}' failed: {}", what, path, vm.last_error())))
    }
}

fn op_load_png(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(2, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let path = args[1].as_str(line)?.to_string();
    let ok = vm.load_png(i, &PathBuf::from(&path));
    report_load(vm, ok, line, "load_png", &path)
}

fn op_load_jpeg(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(2, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let path = args[1].as_str(line)?.to_string();
    let ok = vm.load_jpeg(i, &PathBuf::from(&path));
    report_load(vm, ok, line, "load_jpeg", &path)
}

fn op_load_frame(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(3, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let f = args[1].as_int(line)?;
    let path = args[2].as_str(line)?.to_string();
    let ok = vm.load_mjpg(i, i64::from(f), &PathBuf::from(&path));
    report_load(vm, ok, line, "load_frame", &path)
}

fn op_fill(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(5, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let a = channel_byte(&args[1], line)?;
    let r = channel_byte(&args[2], line)?;
    let g = channel_byte(&args[3], line)?;
    let b = channel_byte(&args[4], line)?;
    vm.load_fill(i, a, r, g, b);
    Ok(())
}

fn channel_byte(cell: &Cell, line: u64) -> Result<u8, ScriptError> {
    let v = cell.as_int(line)?;
    if !(0..=255).contains(&v) {
        return Err(ScriptError::new(line, format!("channel value {} out of [0, 255]", v)));
    }
    Ok(v as u8)
}

fn op_store_png(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(2, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let path = args[1].as_str(line)?.to_string();
    let ok = vm.store_png(i, &PathBuf::from(&path));
    report_load(vm, ok, line, "store_png", &path)
}

fn op_store_jpeg(vm: &mut Vm, stack: &mut Stack, line: u64, mjpg: bool) -> OpResult {
    let args = stack.pop_args(3, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let path = args[1].as_str(line)?.to_string();
    let q = args[2].as_int(line)?.clamp(0, 100) as u8;
    let ok = vm.store_jpeg(i, &PathBuf::from(&path), mjpg, q);
    report_load(vm, ok, line, if mjpg { "store_mjpg" } else { "store_jpeg" }, &path)
}

fn op_multiply(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(3, line)?;
    let m = index_of(&args[0], line, vm.matc(), "matrix")?;
    let a = index_of(&args[1], line, vm.matc(), "matrix")?;
    let b = index_of(&args[2], line, vm.matc(), "matrix")?;
    vm.matrix_multiply(m, a, b);
    Ok(())
}

fn op_translate(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(3, line)?;
    let m = index_of(&args[0], line, vm.matc(), "matrix")?;
    let tx = args[1].as_float(line)?;
    let ty = args[2].as_float(line)?;
    vm.matrix_translate(m, tx, ty);
    Ok(())
}

fn op_scale(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(3, line)?;
    let m = index_of(&args[0], line, vm.matc(), "matrix")?;
    let sx = args[1].as_float(line)?;
    let sy = args[2].as_float(line)?;
    vm.matrix_scale(m, sx, sy);
    Ok(())
}

fn op_rotate(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(2, line)?;
    let m = index_of(&args[0], line, vm.matc(), "matrix")?;
    let deg = args[1].as_float(line)?;
    vm.matrix_rotate(m, deg);
    Ok(())
}

fn op_sample_source_area(vm: &mut Vm, stack: &mut Stack, line: u64) -> OpResult {
    let args = stack.pop_args(5, line)?;
    let i = index_of(&args[0], line, vm.bufc(), "buffer")?;
    let x = args[1].as_int(line)?;
    let y = args[2].as_int(line)?;
    let w = args[3].as_int(line)?;
    let h = args[4].as_int(line)?;
    vm.sample_source_area(i, x, y, w, h);
    Ok(())
}

fn op_mask_boundary(vm: &mut Vm, stack: &mut Stack, line: u64, f: fn(&mut Vm, f64)) -> OpResult {
    let args = stack.pop_args(1, line)?;
    let v = args[0].as_float(line)?;
    if !(0.0..=1.0).contains(&v) {
        return Err(ScriptError::new(line, format!("boundary value {} out of [0, 1]", v)));
    }
    f(vm, v);
    Ok(())
}
