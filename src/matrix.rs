//! The matrix register store: a fixed table of 2D affine transforms, each
//! with a lazily cached inverse.
use crate::error::vm_fault;

/// A 2D affine transform `[[a, b, c], [d, e, f], [0, 0, 1]]`. The source ->
/// target direction is the primary representation; the inverse is cached
/// and recomputed lazily whenever the cache is invalid.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Affine {
    pub a: f64,
    pub b: f64,
    pub c: f64,
    pub d: f64,
    pub e: f64,
    pub f: f64,
}

impl Affine {
    pub const IDENTITY: Affine = Affine { a: 1.0, b: 0.0, c: 0.0, d: 0.0, e: 1.0, f: 0.0 };

    /// Apply the transform to a point.
    pub fn apply(&self, x: f64, y: f64) -> (f64, f64) {
        (self.a * x + self.b * y + self.c, self.d * x + self.e * y + self.f)
    }

    fn multiply(a: &Affine, b: &Affine) -> Affine {
        Affine {
            a: a.a * b.a + a.b * b.d,
            b: a.a * b.b + a.b * b.e,
            c: a.a * b.c + a.b * b.f + a.c,
            d: a.d * b.a + a.e * b.d,
            e: a.d * b.b + a.e * b.e,
            f: a.d * b.c + a.e * b.f + a.f,
        }
    }

    fn invert(&self) -> Affine {
        let det = self.a * self.e - self.b * self.d;
        if det == 0.0 || !det.is_finite() {
            vm_fault!("matrix is singular or non-finite, cannot invert: {:?}", self);
        }
        Affine {
            a: self.e / det,
            b: -self.b / det,
            c: (self.b * self.f - self.c * self.e) / det,
            d: -self.d / det,
            e: self.a / det,
            f: (self.c * self.d - self.a * self.f) / det,
        }
    }

    fn is_finite(&self) -> bool {
        [self.a, self.b, self.c, self.d, self.e, self.f].iter().all(|v| v.is_finite())
    }
}

/// One matrix register: the affine entries plus an optional cached inverse.
#[derive(Debug, Clone)]
struct MatrixRegister {
    m: Affine,
    inverse: Option<Affine>,
}

impl MatrixRegister {
    fn identity() -> Self {
        MatrixRegister { m: Affine::IDENTITY, inverse: Some(Affine::IDENTITY) }
    }

    fn invalidate(&mut self) {
        self.inverse = None;
    }
}

/// Fixed-size table of matrix registers, sized once at construction.
pub struct MatrixStore {
    registers: Vec<MatrixRegister>,
}

impl MatrixStore {
    pub fn new(matc: usize) -> Self {
        MatrixStore { registers: (0..matc).map(|_| MatrixRegister::identity()).collect() }
    }

    pub fn matc(&self) -> usize {
        self.registers.len()
    }

    fn reg(&self, m: usize) -> &MatrixRegister {
        self.registers.get(m).unwrap_or_else(|| vm_fault!("invalid matrix register index {}", m))
    }

    fn reg_mut(&mut self, m: usize) -> &mut MatrixRegister {
        let matc = self.registers.len();
        self.registers
            .get_mut(m)
            .unwrap_or_else(|| vm_fault!("invalid matrix register index {} (matc={})", m, matc))
    }

    pub fn get(&self, m: usize) -> Affine {
        self.reg(m).m
    }

    /// Returns the inverse, computing and caching it on first use. `&mut
    /// self` reflects that this mutates the cache, matching the "recompute
    /// on first read after any write" invalidation scheme.
    pub fn inverse(&mut self, m: usize) -> Affine {
        let current = self.reg(m).m;
        let reg = self.reg_mut(m);
        if let Some(inv) = reg.inverse {
            return inv;
        }
        let inv = current.invert();
        reg.inverse = Some(inv);
        inv
    }

    pub fn reset(&mut self, m: usize) {
        *self.reg_mut(m) = MatrixRegister::identity();
    }

    /// `m := a . b`. `m` must differ from both `a` and `b`; `a` and `b` may
    /// coincide.
    pub fn multiply(&mut self, m: usize, a: usize, b: usize) {
        if m == a || m == b {
            vm_fault!("matrix_multiply result register must not alias an operand");
        }
        let av = self.reg(a).m;
        let bv = self.reg(b).m;
        let result = Affine::multiply(&av, &bv);
        if !result.is_finite() {
            vm_fault!("matrix_multiply produced a non-finite entry: {:?}", result);
        }
        let reg = self.reg_mut(m);
        reg.m = result;
        reg.invalidate();
    }

    /// Premultiply by a translation: `m := T(tx, ty) . m`.
    pub fn translate(&mut self, m: usize, tx: f64, ty: f64) {
        if !tx.is_finite() || !ty.is_finite() {
            vm_fault!("translate requires finite tx, ty (got {}, {})", tx, ty);
        }
        if tx == 0.0 && ty == 0.0 {
            return;
        }
        let t = Affine { a: 1.0, b: 0.0, c: tx, d: 0.0, e: 1.0, f: ty };
        let reg = self.reg_mut(m);
        reg.m = Affine::multiply(&t, &reg.m);
        reg.invalidate();
    }

    /// Premultiply by a scale: `m := diag(sx, sy, 1) . m`.
    pub fn scale(&mut self, m: usize, sx: f64, sy: f64) {
        if !sx.is_finite() || !sy.is_finite() || sx == 0.0 || sy == 0.0 {
            vm_fault!("scale requires finite, non-zero sx, sy (got {}, {})", sx, sy);
        }
        if sx == 1.0 && sy == 1.0 {
            return;
        }
        let s = Affine { a: sx, b: 0.0, c: 0.0, d: 0.0, e: sy, f: 0.0 };
        let reg = self.reg_mut(m);
        reg.m = Affine::multiply(&s, &reg.m);
        reg.invalidate();
    }

    /// Premultiply by a clockwise rotation of `deg` degrees, reduced modulo
    /// 360 before conversion to radians.
    pub fn rotate(&mut self, m: usize, deg: f64) {
        if !deg.is_finite() {
            vm_fault!("rotate requires a finite angle (got {})", deg);
        }
        let reduced = deg.rem_euclid(360.0);
        if reduced == 0.0 {
            return;
        }
        let rad = reduced.to_radians();
        let (sin, cos) = rad.sin_cos();
        let r = Affine { a: cos, b: -sin, c: 0.0, d: sin, e: cos, f: 0.0 };
        let reg = self.reg_mut(m);
        reg.m = Affine::multiply(&r, &reg.m);
        reg.invalidate();
    }
}
