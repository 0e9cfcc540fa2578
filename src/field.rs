/// Axis selector for shifts and finite differences.
/// `Row` moves along the vertical (first) dimension, `Col` along the horizontal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Axis {
    Row,
    Col,
}

/// Dense 2-D scalar field with a fixed shape.
///
/// Every operation is pure: callers always receive a new `Field`, never a
/// mutated input. This keeps the dependency graph clean for the autodiff
/// tape, which cannot track in-place writes.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl Field {
    pub fn zeros(rows: usize, cols: usize) -> Self {
        Self { rows, cols, data: vec![0.0; rows * cols] }
    }

    pub fn filled(rows: usize, cols: usize, value: f64) -> Self {
        Self { rows, cols, data: vec![value; rows * cols] }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<f64>) -> Self {
        assert_eq!(data.len(), rows * cols, "field data length must match shape");
        Self { rows, cols, data }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.rows, self.cols)
    }

    pub fn get(&self, r: usize, c: usize) -> f64 {
        self.data[r * self.cols + c]
    }

    pub fn set(&mut self, r: usize, c: usize, value: f64) {
        self.data[r * self.cols + c] = value;
    }

    pub fn data(&self) -> &[f64] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [f64] {
        &mut self.data
    }

    pub fn map(&self, f: impl Fn(f64) -> f64) -> Field {
        Field {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().map(|&x| f(x)).collect(),
        }
    }

    pub fn zip_with(&self, other: &Field, f: impl Fn(f64, f64) -> f64) -> Field {
        assert_eq!(self.shape(), other.shape(), "field shapes must match");
        Field {
            rows: self.rows,
            cols: self.cols,
            data: self.data.iter().zip(&other.data).map(|(&a, &b)| f(a, b)).collect(),
        }
    }

    pub fn scale(&self, c: f64) -> Field {
        self.map(|x| c * x)
    }

    pub fn mean(&self) -> f64 {
        self.data.iter().sum::<f64>() / self.data.len() as f64
    }

    pub fn max_abs(&self) -> f64 {
        self.data.iter().fold(0.0_f64, |m, &x| m.max(x.abs()))
    }

    /// Circular shift along an axis: `out[i] = in[(i - offset) mod n]`,
    /// so `shift(Axis::Col, 1)` moves values one column to the right.
    pub fn shift(&self, axis: Axis, offset: i32) -> Field {
        let (rows, cols) = (self.rows, self.cols);
        let mut out = vec![0.0; rows * cols];
        match axis {
            Axis::Row => {
                for i in 0..rows {
                    let src = (i as i64 - offset as i64).rem_euclid(rows as i64) as usize;
                    out[i * cols..(i + 1) * cols].copy_from_slice(&self.data[src * cols..(src + 1) * cols]);
                }
            }
            Axis::Col => {
                for i in 0..rows {
                    for j in 0..cols {
                        let src = (j as i64 - offset as i64).rem_euclid(cols as i64) as usize;
                        out[i * cols + j] = self.data[i * cols + src];
                    }
                }
            }
        }
        Field { rows, cols, data: out }
    }

    /// Separable isotropic Gaussian blur with reflective edge handling.
    ///
    /// Kernel radius follows the usual `4 * width` truncation rule; a width
    /// small enough to truncate to radius zero degenerates to the identity.
    /// Reflective (non-periodic) edges keep the operator symmetric, which is
    /// what makes the tape's self-adjoint gradient rule exact.
    pub fn gaussian_blur(&self, width: f64) -> Field {
        let kernel = gaussian_kernel(width);
        let radius = (kernel.len() / 2) as i64;
        let (rows, cols) = (self.rows as i64, self.cols as i64);

        // Horizontal pass.
        let mut tmp = vec![0.0; self.data.len()];
        for i in 0..rows {
            for j in 0..cols {
                let mut acc = 0.0;
                for (t, &w) in kernel.iter().enumerate() {
                    let src = reflect_index(j + t as i64 - radius, cols);
                    acc += w * self.data[(i * cols + src as i64) as usize];
                }
                tmp[(i * cols + j) as usize] = acc;
            }
        }
        // Vertical pass.
        let mut out = vec![0.0; self.data.len()];
        for i in 0..rows {
            for j in 0..cols {
                let mut acc = 0.0;
                for (t, &w) in kernel.iter().enumerate() {
                    let src = reflect_index(i + t as i64 - radius, rows);
                    acc += w * tmp[(src * cols + j) as usize];
                }
                out[(i * cols + j) as usize] = acc;
            }
        }
        Field { rows: self.rows, cols: self.cols, data: out }
    }
}

/// Normalized 1-D Gaussian kernel of standard deviation `width`.
fn gaussian_kernel(width: f64) -> Vec<f64> {
    let radius = (4.0 * width + 0.5) as i64;
    if radius <= 0 {
        return vec![1.0];
    }
    let mut kernel: Vec<f64> = (-radius..=radius)
        .map(|i| (-0.5 * (i as f64 / width).powi(2)).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for k in &mut kernel {
        *k /= sum;
    }
    kernel
}

/// Whole-sample reflection of an index into `[0, n)`: `-1 -> 0`, `n -> n-1`.
fn reflect_index(mut i: i64, n: i64) -> i64 {
    while i < 0 || i >= n {
        if i < 0 {
            i = -i - 1;
        } else {
            i = 2 * n - 1 - i;
        }
    }
    i
}
