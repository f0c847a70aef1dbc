use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

use aligned_box::AlignedBox;

use crate::math::Rng;
use crate::real;

/// A shared weight cell.
///
/// Training threads read and write these with relaxed atomics and no further
/// synchronization; concurrent read-modify-write steps may lose updates,
/// which asynchronous SGD tolerates.
#[derive(Default)]
#[repr(transparent)]
pub struct Real {
    bits: AtomicU32,
}

impl Real {
    pub fn get(&self) -> real {
        real::from_bits(self.bits.load(Ordering::Relaxed))
    }

    pub fn set(&self, value: real) {
        self.bits.store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn add(&self, x: real) {
        self.set(self.get() + x);
    }
}

/// Dense `rows x dim` weight matrix in a cache-aligned allocation, shared
/// across training threads.
pub struct WeightMatrix {
    data: AlignedBox<[Real]>,
    rows: usize,
    dim: usize,
    lock: Mutex<()>,
}

impl WeightMatrix {
    pub fn zeros(rows: usize, dim: usize) -> Self {
        // never allocate an empty slice; a placeholder cell backs 0-row matrices
        WeightMatrix {
            data: AlignedBox::slice_from_default(128, (rows * dim).max(1))
                .expect("weight matrix allocation failed"),
            rows,
            dim,
            lock: Mutex::new(()),
        }
    }

    /// Rows uniformly initialized in `[-1/(2 dim), 1/(2 dim))`.
    pub fn uniform(rows: usize, dim: usize, rng: &mut Rng) -> Self {
        let m = Self::zeros(rows, dim);
        for cell in m.data.iter().take(rows * dim) {
            cell.set((rng.rand_real() - 0.5) / dim as real);
        }
        m
    }

    pub fn from_vec(rows: usize, dim: usize, values: &[real]) -> Self {
        debug_assert_eq!(values.len(), rows * dim);
        let m = Self::zeros(rows, dim);
        for (cell, &v) in m.data.iter().zip(values) {
            cell.set(v);
        }
        m
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn row(&self, i: usize) -> &[Real] {
        &self.data[i * self.dim..][..self.dim]
    }

    pub fn row_to_vec(&self, i: usize) -> Vec<real> {
        self.row(i).iter().map(Real::get).collect()
    }

    pub fn to_vec(&self) -> Vec<real> {
        self.data
            .iter()
            .take(self.rows * self.dim)
            .map(Real::get)
            .collect()
    }

    /// Hold the per-matrix lock when synchronous SGD is requested.
    pub fn guard(&self, sync: bool) -> Option<MutexGuard<'_, ()>> {
        sync.then(|| self.lock.lock().unwrap())
    }

    pub fn dot_row(&self, i: usize, v: &[real]) -> real {
        self.row(i).iter().zip(v).map(|(cell, &x)| cell.get() * x).sum()
    }

    /// `row(i) += scale * v`
    pub fn add_to_row(&self, i: usize, v: &[real], scale: real) {
        for (cell, &x) in self.row(i).iter().zip(v) {
            cell.add(scale * x);
        }
    }

    /// `dst += scale * row(i)`
    pub fn accumulate_row(&self, i: usize, dst: &mut [real], scale: real) {
        for (d, cell) in dst.iter_mut().zip(self.row(i)) {
            *d += scale * cell.get();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn uniform_init_range() {
        let mut rng = Rng(1);
        let m = WeightMatrix::uniform(10, 20, &mut rng);
        for i in 0..10 {
            for x in m.row_to_vec(i) {
                assert!(x >= -0.5 / 20.0 && x < 0.5 / 20.0);
            }
        }
    }

    #[test]
    fn row_arithmetic() {
        let m = WeightMatrix::from_vec(2, 3, &[1.0, 2.0, 3.0, 0.0, 0.0, 0.0]);
        assert_eq!(m.dot_row(0, &[1.0, 1.0, 1.0]), 6.0);
        m.add_to_row(1, &[1.0, 2.0, 3.0], 2.0);
        assert_eq!(m.row_to_vec(1), vec![2.0, 4.0, 6.0]);
        let mut dst = vec![1.0; 3];
        m.accumulate_row(0, &mut dst, -1.0);
        assert_eq!(dst, vec![0.0, -1.0, -2.0]);
    }
}
