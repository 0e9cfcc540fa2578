use std::cell::RefCell;

use crate::field::{Axis, Field};

/// Handle to a grid-valued node on the tape.
#[derive(Clone, Copy, Debug)]
pub struct FieldVar(usize);

/// Handle to a scalar-valued node on the tape.
#[derive(Clone, Copy, Debug)]
pub struct ScalarVar(usize);

#[derive(Clone, Debug)]
enum Value {
    Field(Field),
    Scalar(f64),
}

impl Value {
    fn field(&self) -> &Field {
        match self {
            Value::Field(f) => f,
            // FieldVar/ScalarVar handles keep the variants straight at the
            // API boundary, so a mismatch here is a tape construction bug.
            Value::Scalar(_) => unreachable!("field node holds a scalar value"),
        }
    }

    fn scalar(&self) -> f64 {
        match self {
            Value::Scalar(s) => *s,
            Value::Field(_) => unreachable!("scalar node holds a field value"),
        }
    }

    fn accumulate(&mut self, other: &Value) {
        match (self, other) {
            (Value::Field(a), Value::Field(b)) => {
                for (x, y) in a.data_mut().iter_mut().zip(b.data()) {
                    *x += y;
                }
            }
            (Value::Scalar(a), Value::Scalar(b)) => *a += b,
            _ => unreachable!("adjoint kind mismatch during accumulation"),
        }
    }
}

/// Local adjoint rule: maps this node's adjoint to per-parent contributions.
type Backward = Box<dyn Fn(&Value) -> Vec<(usize, Value)>>;

struct Node {
    value: Value,
    backward: Backward,
}

/// Eager reverse-mode tape over grid fields and scalars.
///
/// Every primitive records its forward value and a closure computing the
/// local adjoint, building a DAG in topological order as the forward pass
/// runs. One backward sweep in reverse node order then yields exact
/// gradients through arbitrarily deep compositions, including the fully
/// unrolled simulation loop.
pub struct Tape {
    nodes: RefCell<Vec<Node>>,
}

impl Default for Tape {
    fn default() -> Self {
        Self::new()
    }
}

impl Tape {
    pub fn new() -> Self {
        Self { nodes: RefCell::new(Vec::new()) }
    }

    fn push(&self, value: Value, backward: Backward) -> usize {
        let mut nodes = self.nodes.borrow_mut();
        nodes.push(Node { value, backward });
        nodes.len() - 1
    }

    fn field_value(&self, id: usize) -> Field {
        self.nodes.borrow()[id].value.field().clone()
    }

    /// Register an input leaf. Leaves have no parents; gradients accumulate
    /// on them during the backward sweep and are read back via
    /// [`Gradients::wrt`].
    pub fn input(&self, f: Field) -> FieldVar {
        FieldVar(self.push(Value::Field(f), Box::new(|_| Vec::new())))
    }

    /// Current forward value of a field node.
    pub fn value(&self, v: FieldVar) -> Field {
        self.field_value(v.0)
    }

    /// Current forward value of a scalar node.
    pub fn scalar(&self, v: ScalarVar) -> f64 {
        self.nodes.borrow()[v.0].value.scalar()
    }

    // ----- elementwise field primitives -----

    pub fn add(&self, a: FieldVar, b: FieldVar) -> FieldVar {
        let out = self.field_value(a.0).zip_with(&self.field_value(b.0), |x, y| x + y);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let g = g.field();
                vec![(a.0, Value::Field(g.clone())), (b.0, Value::Field(g.clone()))]
            }),
        );
        FieldVar(id)
    }

    pub fn sub(&self, a: FieldVar, b: FieldVar) -> FieldVar {
        let out = self.field_value(a.0).zip_with(&self.field_value(b.0), |x, y| x - y);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let g = g.field();
                vec![(a.0, Value::Field(g.clone())), (b.0, Value::Field(g.scale(-1.0)))]
            }),
        );
        FieldVar(id)
    }

    pub fn mul(&self, a: FieldVar, b: FieldVar) -> FieldVar {
        let va = self.field_value(a.0);
        let vb = self.field_value(b.0);
        let out = va.zip_with(&vb, |x, y| x * y);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let g = g.field();
                vec![
                    (a.0, Value::Field(g.zip_with(&vb, |gg, y| gg * y))),
                    (b.0, Value::Field(g.zip_with(&va, |gg, x| gg * x))),
                ]
            }),
        );
        FieldVar(id)
    }

    pub fn div(&self, a: FieldVar, b: FieldVar) -> FieldVar {
        let va = self.field_value(a.0);
        let vb = self.field_value(b.0);
        let out = va.zip_with(&vb, |x, y| x / y);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let g = g.field();
                let da = g.zip_with(&vb, |gg, y| gg / y);
                let ratio = va.zip_with(&vb, |x, y| x / (y * y));
                let db = g.zip_with(&ratio, |gg, r| -gg * r);
                vec![(a.0, Value::Field(da)), (b.0, Value::Field(db))]
            }),
        );
        FieldVar(id)
    }

    pub fn scale(&self, a: FieldVar, c: f64) -> FieldVar {
        let out = self.field_value(a.0).scale(c);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| vec![(a.0, Value::Field(g.field().scale(c)))]),
        );
        FieldVar(id)
    }

    /// `1 - a`, the complement of an occlusion mask.
    pub fn one_minus(&self, a: FieldVar) -> FieldVar {
        let out = self.field_value(a.0).map(|x| 1.0 - x);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| vec![(a.0, Value::Field(g.field().scale(-1.0)))]),
        );
        FieldVar(id)
    }

    /// `constant - a`, used for the fractional advection weights where the
    /// constant part (cell index minus floored source index) is captured
    /// from forward values.
    pub fn sub_from(&self, constant: Field, a: FieldVar) -> FieldVar {
        let out = constant.zip_with(&self.field_value(a.0), |c, x| c - x);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| vec![(a.0, Value::Field(g.field().scale(-1.0)))]),
        );
        FieldVar(id)
    }

    /// Elementwise product with a constant field (e.g. the 0/1 region
    /// template), which does not receive gradients.
    pub fn mul_const(&self, a: FieldVar, constant: Field) -> FieldVar {
        let out = self.field_value(a.0).zip_with(&constant, |x, c| x * c);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                vec![(a.0, Value::Field(g.field().zip_with(&constant, |gg, c| gg * c)))]
            }),
        );
        FieldVar(id)
    }

    // ----- structural primitives -----

    /// Circular shift along an axis. Adjoint is the opposite
    /// shift: rolling is a permutation, so its transpose is its inverse.
    pub fn shift(&self, a: FieldVar, axis: Axis, offset: i32) -> FieldVar {
        let out = self.field_value(a.0).shift(axis, offset);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| vec![(a.0, Value::Field(g.field().shift(axis, -offset)))]),
        );
        FieldVar(id)
    }

    /// Gaussian smoothing, registered as an opaque primitive with an
    /// explicit gradient rule: the kernel is symmetric and the reflective
    /// edge handling keeps the operator self-adjoint, so the adjoint of
    /// `blur(_, width)` is `blur(_, width)` itself. This rule is written by
    /// hand rather than derived because the forward routine is treated as a
    /// black-box numerical kernel.
    pub fn blur(&self, a: FieldVar, width: f64) -> FieldVar {
        let out = self.field_value(a.0).gaussian_blur(width);
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| vec![(a.0, Value::Field(g.field().gaussian_blur(width)))]),
        );
        FieldVar(id)
    }

    /// Saturating sigmoid `0.5 * (tanh(x) + 1)`, mapping the reals onto (0, 1).
    pub fn sigmoid(&self, a: FieldVar) -> FieldVar {
        let out = self.field_value(a.0).map(|x| 0.5 * (x.tanh() + 1.0));
        let saved = out.clone();
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let d = g.field().zip_with(&saved, |gg, s| gg * 2.0 * s * (1.0 - s));
                vec![(a.0, Value::Field(d))]
            }),
        );
        FieldVar(id)
    }

    /// Bilinear-resampling gather: `out[k] = a[indices[k]]`, with `indices`
    /// fixed at their forward-pass values (the floored backtrace locations
    /// are piecewise constant in the velocity, so they carry no gradient).
    /// Adjoint scatter-adds the upstream gradient back onto the sources.
    pub fn gather(&self, a: FieldVar, indices: Vec<usize>) -> FieldVar {
        let va = self.field_value(a.0);
        let (rows, cols) = va.shape();
        let out = Field::from_vec(rows, cols, indices.iter().map(|&i| va.data()[i]).collect());
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let g = g.field();
                let mut d = Field::zeros(rows, cols);
                for (k, &i) in indices.iter().enumerate() {
                    d.data_mut()[i] += g.data()[k];
                }
                vec![(a.0, Value::Field(d))]
            }),
        );
        FieldVar(id)
    }

    /// Overwrite the top `band.rows()` rows with constant values. The band
    /// is an injected boundary condition, so its cells block gradient flow
    /// while the interior passes through untouched.
    pub fn replace_top_rows(&self, a: FieldVar, band: Field) -> FieldVar {
        let va = self.field_value(a.0);
        assert_eq!(band.cols(), va.cols(), "boundary band width must match field");
        let k = band.rows();
        let cols = va.cols();
        let mut out = va;
        out.data_mut()[..k * cols].copy_from_slice(band.data());
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let mut d = g.field().clone();
                for x in &mut d.data_mut()[..k * cols] {
                    *x = 0.0;
                }
                vec![(a.0, Value::Field(d))]
            }),
        );
        FieldVar(id)
    }

    /// Overwrite the left `band.cols()` columns with constant values.
    pub fn replace_left_cols(&self, a: FieldVar, band: Field) -> FieldVar {
        let va = self.field_value(a.0);
        assert_eq!(band.rows(), va.rows(), "boundary band height must match field");
        let k = band.cols();
        let (rows, _) = va.shape();
        let mut out = va;
        for i in 0..rows {
            for j in 0..k {
                let v = band.get(i, j);
                out.set(i, j, v);
            }
        }
        let id = self.push(
            Value::Field(out),
            Box::new(move |g| {
                let mut d = g.field().clone();
                for i in 0..rows {
                    for j in 0..k {
                        d.set(i, j, 0.0);
                    }
                }
                vec![(a.0, Value::Field(d))]
            }),
        );
        FieldVar(id)
    }

    // ----- reductions and scalar primitives -----

    pub fn mean(&self, a: FieldVar) -> ScalarVar {
        let va = self.field_value(a.0);
        let (rows, cols) = va.shape();
        let n = va.len();
        let id = self.push(
            Value::Scalar(va.mean()),
            Box::new(move |g| {
                let g = g.scalar();
                vec![(a.0, Value::Field(Field::filled(rows, cols, g / n as f64)))]
            }),
        );
        ScalarVar(id)
    }

    /// Mean over the strictly positive entries. An entirely non-positive
    /// field yields zero with a zero adjoint (the empty-set policy for the
    /// mass penalty).
    pub fn mean_positive(&self, a: FieldVar) -> ScalarVar {
        let va = self.field_value(a.0);
        let (rows, cols) = va.shape();
        let positive: Vec<usize> =
            (0..va.len()).filter(|&i| va.data()[i] > 0.0).collect();
        let value = if positive.is_empty() {
            0.0
        } else {
            positive.iter().map(|&i| va.data()[i]).sum::<f64>() / positive.len() as f64
        };
        let id = self.push(
            Value::Scalar(value),
            Box::new(move |g| {
                let g = g.scalar();
                let mut d = Field::zeros(rows, cols);
                if !positive.is_empty() {
                    let w = g / positive.len() as f64;
                    for &i in &positive {
                        d.data_mut()[i] = w;
                    }
                }
                vec![(a.0, Value::Field(d))]
            }),
        );
        ScalarVar(id)
    }

    pub fn scalar_add(&self, a: ScalarVar, b: ScalarVar) -> ScalarVar {
        let out = self.scalar(a) + self.scalar(b);
        let id = self.push(
            Value::Scalar(out),
            Box::new(move |g| {
                let g = g.scalar();
                vec![(a.0, Value::Scalar(g)), (b.0, Value::Scalar(g))]
            }),
        );
        ScalarVar(id)
    }

    pub fn scalar_neg(&self, a: ScalarVar) -> ScalarVar {
        let out = -self.scalar(a);
        let id = self.push(
            Value::Scalar(out),
            Box::new(move |g| vec![(a.0, Value::Scalar(-g.scalar()))]),
        );
        ScalarVar(id)
    }

    pub fn scalar_scale(&self, a: ScalarVar, c: f64) -> ScalarVar {
        let out = c * self.scalar(a);
        let id = self.push(
            Value::Scalar(out),
            Box::new(move |g| vec![(a.0, Value::Scalar(c * g.scalar()))]),
        );
        ScalarVar(id)
    }

    pub fn scalar_div(&self, a: ScalarVar, b: ScalarVar) -> ScalarVar {
        let va = self.scalar(a);
        let vb = self.scalar(b);
        let id = self.push(
            Value::Scalar(va / vb),
            Box::new(move |g| {
                let g = g.scalar();
                vec![(a.0, Value::Scalar(g / vb)), (b.0, Value::Scalar(-g * va / (vb * vb)))]
            }),
        );
        ScalarVar(id)
    }

    // ----- backward pass -----

    /// Single backward sweep from `output` in exact reverse node order,
    /// accumulating adjoints into every reachable node.
    pub fn gradient(&self, output: ScalarVar) -> Gradients {
        let nodes = self.nodes.borrow();
        let mut adjoints: Vec<Option<Value>> = (0..nodes.len()).map(|_| None).collect();
        adjoints[output.0] = Some(Value::Scalar(1.0));
        for i in (0..=output.0).rev() {
            let adj = match &adjoints[i] {
                Some(a) => a.clone(),
                None => continue,
            };
            for (parent, contribution) in (nodes[i].backward)(&adj) {
                if let Some(acc) = adjoints[parent].as_mut() {
                    acc.accumulate(&contribution);
                } else {
                    adjoints[parent] = Some(contribution);
                }
            }
        }
        Gradients { adjoints }
    }
}

/// Adjoints produced by a backward sweep.
pub struct Gradients {
    adjoints: Vec<Option<Value>>,
}

impl Gradients {
    /// Gradient of the swept output with respect to a field node, or `None`
    /// if the node does not influence the output.
    pub fn wrt(&self, v: FieldVar) -> Option<Field> {
        self.adjoints[v.0].as_ref().map(|a| a.field().clone())
    }
}
