use std::fmt::Debug;

use crate::error::Result;

/// Trait for pluggable compute backends (CPU reference, headless GLES3.2).
///
/// All operations work on f32 slices. This trait exists primarily so the GPU
/// dispatch sequence's arithmetic can be checked against a portable reference
/// implementation in tests (`CpuBackend`); the production forward pass in
/// `lg-model::llama` drives the GLES backend's persistent, GPU-resident
/// buffers directly through `lg_tensor::gles` rather than through this
/// per-call, host-slice-in-host-slice-out trait, since a real run must avoid
/// a host round trip between every layer.
pub trait ComputeBackend: Send + Sync + Debug {
    /// Returns the name of this backend (e.g., "cpu", "gles").
    fn name(&self) -> &str;

    /// Matrix multiplication: C = A @ B, with `a` row-major [m, k] and `b`
    /// row-major [k, n]. The per-layer projections in the forward pass call
    /// this with `n = 1`, i.e. `xout[i] = sum_j w[i*k+j] * x[j]`.
    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>>;

    /// Element-wise addition: result[i] = a[i] + b[i].
    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Element-wise multiplication: result[i] = a[i] * b[i].
    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>>;

    /// Scalar multiplication: result[i] = a[i] * s.
    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>>;

    /// RMS normalization: `result[i] = x[i] * weight[i] / sqrt(mean(x^2) + eps)`,
    /// applied independently to each row of `hidden_size` elements in `x`.
    fn rms_norm(&self, x: &[f32], weight: &[f32], eps: f32, hidden_size: usize) -> Result<Vec<f32>>;

    /// Softmax over chunks of `row_len` elements (one chunk per row).
    fn softmax(&self, x: &[f32], row_len: usize) -> Result<Vec<f32>>;

    /// Rotary position embedding applied in place to `q` and `k` pairs at
    /// position `pos`, treating each as `dim/2` complex pairs of `head_size`-sized
    /// heads.
    fn rope(&self, q: &[f32], k: &[f32], head_size: usize, pos: usize, n_heads_q: usize, n_heads_k: usize)
        -> Result<(Vec<f32>, Vec<f32>)>;

    /// SiLU activation: result[i] = x[i] * sigmoid(x[i]).
    fn silu(&self, x: &[f32]) -> Result<Vec<f32>>;

    /// Fused SwiGLU gate: result[i] = silu(gate[i]) * up[i].
    fn silu_and_mul(&self, gate: &[f32], up: &[f32]) -> Result<Vec<f32>>;

    /// Divides every element by `t` in place semantics (returns the scaled copy).
    fn temperature_scale(&self, x: &[f32], t: f32) -> Result<Vec<f32>>;

    /// Index of the maximum element. Ties resolve to the first occurrence.
    fn argmax(&self, x: &[f32]) -> Result<usize>;
}
