use crate::backend::ComputeBackend;
use crate::error::{Result, TensorError};

/// Pure-Rust CPU compute backend.
///
/// Implements every op in `ComputeBackend` with straightforward loops,
/// optimized for correctness and auditability rather than peak performance.
/// Used as the reference implementation that the GLES dispatch sequence's
/// arithmetic is checked against in tests.
#[derive(Debug, Clone)]
pub struct CpuBackend;

impl CpuBackend {
    pub fn new() -> Self {
        CpuBackend
    }
}

impl Default for CpuBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ComputeBackend for CpuBackend {
    fn name(&self) -> &str {
        "cpu"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        if a.len() != m * k {
            return Err(TensorError::Other(format!(
                "matmul: a.len()={} but expected m*k={}",
                a.len(),
                m * k
            )));
        }
        if b.len() != k * n {
            return Err(TensorError::Other(format!(
                "matmul: b.len()={} but expected k*n={}",
                b.len(),
                k * n
            )));
        }

        let mut c = vec![0.0f32; m * n];
        for i in 0..m {
            for j in 0..n {
                let mut sum = 0.0f32;
                for p in 0..k {
                    sum += a[i * k + p] * b[p * n + j];
                }
                c[i * n + j] = sum;
            }
        }
        Ok(c)
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x + y).collect())
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        if a.len() != b.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![a.len()],
                got: vec![b.len()],
            });
        }
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
    }

    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>> {
        Ok(a.iter().map(|x| x * s).collect())
    }

    fn rms_norm(&self, x: &[f32], weight: &[f32], eps: f32, hidden_size: usize) -> Result<Vec<f32>> {
        if weight.len() != hidden_size {
            return Err(TensorError::Other(format!(
                "rms_norm: weight.len()={} but hidden_size={}",
                weight.len(),
                hidden_size
            )));
        }
        if x.len() % hidden_size != 0 {
            return Err(TensorError::Other(format!(
                "rms_norm: x.len()={} is not a multiple of hidden_size={}",
                x.len(),
                hidden_size
            )));
        }

        let n_rows = x.len() / hidden_size;
        let mut result = vec![0.0f32; x.len()];

        for row in 0..n_rows {
            let offset = row * hidden_size;
            let row_data = &x[offset..offset + hidden_size];
            let mean_sq: f32 = row_data.iter().map(|v| v * v).sum::<f32>() / hidden_size as f32;
            let rms = (mean_sq + eps).sqrt();
            for i in 0..hidden_size {
                result[offset + i] = row_data[i] * weight[i] / rms;
            }
        }

        Ok(result)
    }

    fn softmax(&self, x: &[f32], row_len: usize) -> Result<Vec<f32>> {
        if row_len == 0 {
            return Err(TensorError::Other("softmax: row_len must be > 0".to_string()));
        }
        if x.len() % row_len != 0 {
            return Err(TensorError::Other(format!(
                "softmax: x.len()={} is not a multiple of row_len={}",
                x.len(),
                row_len
            )));
        }

        let n_rows = x.len() / row_len;
        let mut result = vec![0.0f32; x.len()];

        for row in 0..n_rows {
            let offset = row * row_len;
            let row_data = &x[offset..offset + row_len];
            let max_val = row_data.iter().copied().fold(f32::NEG_INFINITY, f32::max);

            let mut sum = 0.0f32;
            for i in 0..row_len {
                let e = (row_data[i] - max_val).exp();
                result[offset + i] = e;
                sum += e;
            }
            for i in 0..row_len {
                result[offset + i] /= sum;
            }
        }

        Ok(result)
    }

    fn rope(
        &self,
        q: &[f32],
        k: &[f32],
        head_size: usize,
        pos: usize,
        n_heads_q: usize,
        n_heads_k: usize,
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        if q.len() != n_heads_q * head_size {
            return Err(TensorError::Other(format!(
                "rope: q.len()={} but expected n_heads_q*head_size={}",
                q.len(),
                n_heads_q * head_size
            )));
        }
        if k.len() != n_heads_k * head_size {
            return Err(TensorError::Other(format!(
                "rope: k.len()={} but expected n_heads_k*head_size={}",
                k.len(),
                n_heads_k * head_size
            )));
        }

        let mut q_out = q.to_vec();
        let mut k_out = k.to_vec();

        let rotate = |buf: &mut [f32], offset: usize| {
            for i in 0..head_size / 2 {
                let theta = pos as f32 * (1.0 / (10000.0f32).powf(2.0 * i as f32 / head_size as f32));
                let (sin_theta, cos_theta) = theta.sin_cos();
                let x0 = buf[offset + 2 * i];
                let x1 = buf[offset + 2 * i + 1];
                buf[offset + 2 * i] = x0 * cos_theta - x1 * sin_theta;
                buf[offset + 2 * i + 1] = x0 * sin_theta + x1 * cos_theta;
            }
        };

        for h in 0..n_heads_q {
            rotate(&mut q_out, h * head_size);
        }
        for h in 0..n_heads_k {
            rotate(&mut k_out, h * head_size);
        }

        Ok((q_out, k_out))
    }

    fn silu(&self, x: &[f32]) -> Result<Vec<f32>> {
        Ok(x.iter().map(|&v| v / (1.0 + (-v).exp())).collect())
    }

    fn silu_and_mul(&self, gate: &[f32], up: &[f32]) -> Result<Vec<f32>> {
        if gate.len() != up.len() {
            return Err(TensorError::ShapeMismatch {
                expected: vec![gate.len()],
                got: vec![up.len()],
            });
        }
        Ok(gate
            .iter()
            .zip(up.iter())
            .map(|(&g, &u)| (g / (1.0 + (-g).exp())) * u)
            .collect())
    }

    fn temperature_scale(&self, x: &[f32], t: f32) -> Result<Vec<f32>> {
        if t == 0.0 {
            return Err(TensorError::Other("temperature_scale: t must be nonzero".to_string()));
        }
        Ok(x.iter().map(|v| v / t).collect())
    }

    fn argmax(&self, x: &[f32]) -> Result<usize> {
        if x.is_empty() {
            return Err(TensorError::Other("argmax: empty input".to_string()));
        }
        let mut best_idx = 0;
        let mut best_val = x[0];
        for (i, &v) in x.iter().enumerate().skip(1) {
            if v > best_val {
                best_val = v;
                best_idx = i;
            }
        }
        Ok(best_idx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> CpuBackend {
        CpuBackend::new()
    }

    #[test]
    fn test_matmul_identity() {
        let b = backend();
        let a = vec![1.0, 0.0, 0.0, 1.0];
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let c = b.matmul(&a, &x, 2, 2, 2).unwrap();
        assert_eq!(c, vec![1.0, 2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_matmul_as_matvec() {
        let b = backend();
        // w: [2,3] rows, x: [3] column vector -> xout: [2]
        let w = vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let x = vec![1.0, 1.0, 1.0];
        let c = b.matmul(&w, &x, 2, 3, 1).unwrap();
        assert_eq!(c, vec![6.0, 15.0]);
    }

    #[test]
    fn test_add() {
        let b = backend();
        let r = b.add(&[1.0, 2.0], &[3.0, 4.0]).unwrap();
        assert_eq!(r, vec![4.0, 6.0]);
    }

    #[test]
    fn test_mul() {
        let b = backend();
        let r = b.mul(&[2.0, 3.0], &[4.0, 5.0]).unwrap();
        assert_eq!(r, vec![8.0, 15.0]);
    }

    #[test]
    fn test_scale() {
        let b = backend();
        let r = b.scale(&[1.0, 2.0, 3.0], 2.0).unwrap();
        assert_eq!(r, vec![2.0, 4.0, 6.0]);
    }

    #[test]
    fn test_silu() {
        let b = backend();
        let r = b.silu(&[0.0]).unwrap();
        assert!((r[0] - 0.0).abs() < 1e-6);
        let r2 = b.silu(&[1.0]).unwrap();
        assert!((r2[0] - 0.7310586).abs() < 1e-5);
    }

    #[test]
    fn test_silu_and_mul() {
        let b = backend();
        let r = b.silu_and_mul(&[0.0, 1.0], &[2.0, 3.0]).unwrap();
        assert!((r[0] - 0.0).abs() < 1e-6);
        assert!((r[1] - 0.7310586 * 3.0).abs() < 1e-4);
    }

    #[test]
    fn test_softmax() {
        let b = backend();
        let r = b.softmax(&[1.0, 2.0, 3.0], 3).unwrap();
        let sum: f32 = r.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(r[0] < r[1]);
        assert!(r[1] < r[2]);
    }

    #[test]
    fn test_softmax_shift_invariant() {
        let b = backend();
        let r1 = b.softmax(&[1.0, 2.0, 3.0], 3).unwrap();
        let r2 = b.softmax(&[101.0, 102.0, 103.0], 3).unwrap();
        for (x, y) in r1.iter().zip(r2.iter()) {
            assert!((x - y).abs() < 1e-5);
        }
    }

    #[test]
    fn test_softmax_multi_row() {
        let b = backend();
        let r = b.softmax(&[1.0, 2.0, 3.0, 1.0, 2.0, 3.0], 3).unwrap();
        assert_eq!(&r[0..3], &r[3..6]);
    }

    #[test]
    fn test_rms_norm() {
        let b = backend();
        let x = vec![1.0, 2.0, 3.0, 4.0];
        let w = vec![1.0, 1.0, 1.0, 1.0];
        let r = b.rms_norm(&x, &w, 1e-5, 4).unwrap();
        let rms = (7.5f32 + 1e-5).sqrt();
        assert!((r[0] - 1.0 / rms).abs() < 1e-5);
        assert!((r[1] - 2.0 / rms).abs() < 1e-5);
    }

    #[test]
    fn test_rope_zero_pos() {
        let b = backend();
        let q = vec![1.0, 0.0, 0.0, 1.0];
        let k = vec![1.0, 0.0, 0.0, 1.0];
        let (q_out, k_out) = b.rope(&q, &k, 4, 0, 1, 1).unwrap();
        assert!((q_out[0] - 1.0).abs() < 1e-6);
        assert!((q_out[1] - 0.0).abs() < 1e-6);
        assert!((k_out[0] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_argmax() {
        let b = backend();
        assert_eq!(b.argmax(&[1.0, 5.0, 2.0, 5.0]).unwrap(), 1);
        assert_eq!(b.argmax(&[-1.0, -5.0]).unwrap(), 0);
    }

    #[test]
    fn test_argmax_empty() {
        let b = backend();
        assert!(b.argmax(&[]).is_err());
    }

    #[test]
    fn test_add_length_mismatch() {
        let b = backend();
        assert!(b.add(&[1.0], &[1.0, 2.0]).is_err());
    }
}
