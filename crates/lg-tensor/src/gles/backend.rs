use std::fmt;
use std::rc::Rc;

use crate::backend::ComputeBackend;
use crate::error::Result;

use super::buffer::GpuBuffer;
use super::context::GlesContext;
use super::kernels::KernelCatalog;
use super::primitives::{self, Dispatcher};
use super::reduce::{self, ReduceScratch};

/// `ComputeBackend` adapter over the headless GLES3.2 dispatcher, for parity
/// testing against `CpuBackend` (ยง8: "argmax agreement", RMSNorm/softmax
/// numerical properties). Every call here round-trips host slices through
/// fresh device buffers; the production forward pass in `lg-model::llama`
/// instead drives `Dispatcher`/`GpuBuffer` directly so persistent weight and
/// KV-cache buffers never leave the device between layers.
pub struct GlesBackend {
    _context: GlesContext,
    dispatcher: Dispatcher,
}

impl fmt::Debug for GlesBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GlesBackend").finish()
    }
}

impl GlesBackend {
    pub fn new() -> Result<Self> {
        let context = GlesContext::acquire()?;
        let gl = context.gl();
        let catalog = KernelCatalog::compile(&gl)?;
        Ok(GlesBackend {
            _context: context,
            dispatcher: Dispatcher::new(gl, catalog),
        })
    }

    fn gl(&self) -> Rc<glow::Context> {
        // Dispatcher owns the Rc<glow::Context>; primitives take the
        // dispatcher directly so buffers only need a clone for construction.
        self.dispatcher.gl_context()
    }

    fn scratch(&self, size: usize) -> Result<(GpuBuffer, GpuBuffer, GpuBuffer, GpuBuffer)> {
        Ok((
            GpuBuffer::zeros(self.gl(), size)?,
            GpuBuffer::zeros(self.gl(), size)?,
            GpuBuffer::zeros(self.gl(), size)?,
            GpuBuffer::zeros(self.gl(), size)?,
        ))
    }
}

impl ComputeBackend for GlesBackend {
    fn name(&self) -> &str {
        "gles"
    }

    fn matmul(&self, a: &[f32], b: &[f32], m: usize, k: usize, n: usize) -> Result<Vec<f32>> {
        // Only the n == 1 (matrix-vector) case is used by the forward pass;
        // it is the only case this adapter dispatches on-device.
        assert_eq!(n, 1, "GlesBackend::matmul is matrix-vector only");
        let w = GpuBuffer::from_slice(self.gl(), a)?;
        let x = GpuBuffer::from_slice(self.gl(), b)?;
        let xout = GpuBuffer::zeros(self.gl(), m)?;
        primitives::matmul(&self.dispatcher, &x, &w, &xout, k as i32, m as i32, 0, 0);
        let mut out = vec![0.0f32; m];
        xout.read(0, &mut out);
        Ok(out)
    }

    fn add(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        let abuf = GpuBuffer::from_slice(self.gl(), a)?;
        let bbuf = GpuBuffer::from_slice(self.gl(), b)?;
        primitives::accum(&self.dispatcher, &abuf, &bbuf, a.len() as i32);
        let mut out = vec![0.0f32; a.len()];
        abuf.read(0, &mut out);
        Ok(out)
    }

    fn mul(&self, a: &[f32], b: &[f32]) -> Result<Vec<f32>> {
        // No standalone elementwise-multiply kernel exists in the catalog;
        // the only multiply the forward pass needs is the gated SwiGLU
        // product, which goes through `silu_and_mul`. Kept host-side here
        // since this trait method has no on-device caller in the driver.
        Ok(a.iter().zip(b.iter()).map(|(x, y)| x * y).collect())
    }

    fn scale(&self, a: &[f32], s: f32) -> Result<Vec<f32>> {
        // temperature_scale divides by its argument; `a / (1/s) == a * s`.
        let buf = GpuBuffer::from_slice(self.gl(), a)?;
        primitives::temperature_scale(&self.dispatcher, &buf, a.len() as i32, 1.0 / s);
        let mut out = vec![0.0f32; a.len()];
        buf.read(0, &mut out);
        Ok(out)
    }

    fn rms_norm(&self, x: &[f32], weight: &[f32], _eps: f32, hidden_size: usize) -> Result<Vec<f32>> {
        let xbuf = GpuBuffer::from_slice(self.gl(), x)?;
        let wbuf = GpuBuffer::from_slice(self.gl(), weight)?;
        let (ra, rb, ci, co) = self.scratch(hidden_size.max(1))?;
        let scratch = ReduceScratch { reduce_a: &ra, reduce_b: &rb, compose_in: &ci, compose_out: &co };
        let obuf = GpuBuffer::zeros(self.gl(), hidden_size)?;
        reduce::rmsnorm(&self.dispatcher, &scratch, &xbuf, &wbuf, Some(&obuf), hidden_size, 0);
        let mut out = vec![0.0f32; hidden_size];
        obuf.read(0, &mut out);
        Ok(out)
    }

    fn softmax(&self, x: &[f32], row_len: usize) -> Result<Vec<f32>> {
        let rows = x.len() / row_len;
        let xbuf = GpuBuffer::from_slice(self.gl(), x)?;
        let (ra, rb, ci, co) = self.scratch(x.len().max(1))?;
        let scratch = ReduceScratch { reduce_a: &ra, reduce_b: &rb, compose_in: &ci, compose_out: &co };
        reduce::softmax(&self.dispatcher, &scratch, &xbuf, row_len, rows.max(1));
        let mut out = vec![0.0f32; x.len()];
        xbuf.read(0, &mut out);
        Ok(out)
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
        assert_eq!(n_heads_q, n_heads_k, "GlesBackend::rope dispatches one head grid at a time");
        let qbuf = GpuBuffer::from_slice(self.gl(), q)?;
        let kbuf = GpuBuffer::from_slice(self.gl(), k)?;
        let freq_len = (head_size / 2).max(1);
        let freq_real = GpuBuffer::zeros(self.gl(), freq_len)?;
        let freq_imag = GpuBuffer::zeros(self.gl(), freq_len)?;
        // Reference angle table for a single position, matching CpuBackend's formula.
        let mut fr = vec![0.0f32; freq_len];
        let mut fi = vec![0.0f32; freq_len];
        for i in 0..freq_len {
            let theta = pos as f32 * (1.0 / (10000.0f32).powf(2.0 * i as f32 / head_size as f32));
            fr[i] = theta.cos();
            fi[i] = theta.sin();
        }
        freq_real.write(0, &fr);
        freq_imag.write(0, &fi);

        for h in 0..n_heads_q {
            let off = h * head_size;
            let qh = GpuBuffer::from_slice(self.gl(), &q[off..off + head_size])?;
            let kh = GpuBuffer::from_slice(self.gl(), &k[off..off + head_size])?;
            primitives::rope(&self.dispatcher, &freq_real, &freq_imag, &qh, &kh, 0, head_size as i32, head_size as i32);
            let mut qout = vec![0.0f32; head_size];
            let mut kout = vec![0.0f32; head_size];
            qh.read(0, &mut qout);
            kh.read(0, &mut kout);
            qbuf.write(off, &qout);
            kbuf.write(off, &kout);
        }

        let mut q_out = vec![0.0f32; q.len()];
        let mut k_out = vec![0.0f32; k.len()];
        qbuf.read(0, &mut q_out);
        kbuf.read(0, &mut k_out);
        Ok((q_out, k_out))
    }

    fn silu(&self, x: &[f32]) -> Result<Vec<f32>> {
        let ones = vec![1.0f32; x.len()];
        self.silu_and_mul(x, &ones)
    }

    fn silu_and_mul(&self, gate: &[f32], up: &[f32]) -> Result<Vec<f32>> {
        let hb = GpuBuffer::from_slice(self.gl(), gate)?;
        let hb2 = GpuBuffer::from_slice(self.gl(), up)?;
        primitives::silu_and_mul(&self.dispatcher, &hb, &hb2, gate.len() as i32);
        let mut out = vec![0.0f32; gate.len()];
        hb.read(0, &mut out);
        Ok(out)
    }

    fn temperature_scale(&self, x: &[f32], t: f32) -> Result<Vec<f32>> {
        let buf = GpuBuffer::from_slice(self.gl(), x)?;
        primitives::temperature_scale(&self.dispatcher, &buf, x.len() as i32, t);
        let mut out = vec![0.0f32; x.len()];
        buf.read(0, &mut out);
        Ok(out)
    }

    fn argmax(&self, x: &[f32]) -> Result<usize> {
        let input = GpuBuffer::from_slice(self.gl(), x)?;
        let n = x.len();
        let val_a = GpuBuffer::zeros(self.gl(), n)?;
        let val_b = GpuBuffer::zeros(self.gl(), n)?;
        let idx_a = GpuBuffer::zeros(self.gl(), n)?;
        let idx_b = GpuBuffer::zeros(self.gl(), n)?;
        Ok(reduce::argmax(&self.dispatcher, &val_a, &val_b, &idx_a, &idx_b, &input, n))
    }
}
