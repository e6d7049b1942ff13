use std::rc::Rc;

use glow::HasContext;

use super::buffer::GpuBuffer;
use super::kernels::{Kernel, KernelCatalog};

/// Issues dispatches against the kernel catalog and inserts the shader-storage
/// memory barriers the design requires between dependent dispatches (ยง4.3,
/// ยง5). Every public method here ends with a barrier so callers never need to
/// reason about ordering themselves; composite passes in `reduce` call the
/// lower-level `dispatch_raw` directly when they want to batch several
/// dispatches behind a single barrier.
pub struct Dispatcher {
    gl: Rc<glow::Context>,
    catalog: KernelCatalog,
}

impl Dispatcher {
    pub fn new(gl: Rc<glow::Context>, catalog: KernelCatalog) -> Self {
        Dispatcher { gl, catalog }
    }

    pub fn gl(&self) -> &glow::Context {
        &self.gl
    }

    pub fn gl_context(&self) -> Rc<glow::Context> {
        self.gl.clone()
    }

    pub fn catalog(&self) -> &KernelCatalog {
        &self.catalog
    }

    fn use_program(&self, kernel: Kernel) {
        unsafe { self.gl.use_program(Some(self.catalog.program(kernel))) };
    }

    pub fn set_uniform_1i(&self, kernel: Kernel, name: &'static str, value: i32) {
        if let Some(loc) = self.catalog.uniform_location(kernel, name) {
            unsafe { self.gl.uniform_1_i32(Some(&loc), value) };
        }
    }

    pub fn set_uniform_1f(&self, kernel: Kernel, name: &'static str, value: f32) {
        if let Some(loc) = self.catalog.uniform_location(kernel, name) {
            unsafe { self.gl.uniform_1_f32(Some(&loc), value) };
        }
    }

    /// Dispatches `kernel` over the given grid without inserting a barrier
    /// afterward; the caller is responsible for calling `barrier()` before any
    /// dependent dispatch reads what this one wrote.
    pub fn dispatch_raw(&self, kernel: Kernel, x: u32, y: u32, z: u32) {
        self.use_program(kernel);
        unsafe {
            self.gl.dispatch_compute(x.max(1), y.max(1), z.max(1));
        }
        if let Err(location) = dispatch_error_location(&self.gl) {
            tracing::error!(%location, kernel = ?kernel, "gles dispatch reported an API error; continuing");
        }
    }

    /// Dispatch followed by a full shader-storage + buffer-update barrier.
    pub fn dispatch(&self, kernel: Kernel, x: u32, y: u32, z: u32) {
        self.dispatch_raw(kernel, x, y, z);
        self.barrier();
    }

    pub fn barrier(&self) {
        unsafe { self.gl.memory_barrier(glow::SHADER_STORAGE_BARRIER_BIT | glow::BUFFER_UPDATE_BARRIER_BIT) };
    }
}

fn dispatch_error_location(gl: &glow::Context) -> std::result::Result<(), String> {
    let err = unsafe { gl.get_error() };
    if err == glow::NO_ERROR {
        Ok(())
    } else {
        Err(format!("gl error 0x{:x} at {}:{}", err, file!(), line!()))
    }
}

/// `xout[i] = sum_j w[w_off + i*n+j] * x[x_off + j]`, grid `(d, 1, 1)`.
#[allow(clippy::too_many_arguments)]
pub fn matmul(d: &Dispatcher, x: &GpuBuffer, w: &GpuBuffer, xout: &GpuBuffer, n: i32, out_dim: i32, x_off: i32, w_off: i32) {
    x.bind(0);
    w.bind(1);
    xout.bind(2);
    d.set_uniform_1i(Kernel::MatMul, "d", out_dim);
    d.set_uniform_1i(Kernel::MatMul, "n", n);
    d.set_uniform_1i(Kernel::MatMul, "x_off", x_off);
    d.set_uniform_1i(Kernel::MatMul, "w_off", w_off);
    d.dispatch(Kernel::MatMul, out_dim as u32, 1, 1);
}

/// `a[i] += b[i]`, grid `(size, 1, 1)`.
pub fn accum(d: &Dispatcher, a: &GpuBuffer, b: &GpuBuffer, size: i32) {
    a.bind(0);
    b.bind(1);
    d.set_uniform_1i(Kernel::Accum, "size", size);
    d.dispatch(Kernel::Accum, size as u32, 1, 1);
}

/// RoPE rotation of `q` (binding 2) and `k` (binding 3) in place. Binding `k`
/// at a distinct index from `q` is the fix for the distilled source's
/// binding collision (see `DESIGN.md`).
pub fn rope(
    d: &Dispatcher,
    freq_real: &GpuBuffer,
    freq_imag: &GpuBuffer,
    q: &GpuBuffer,
    k: &GpuBuffer,
    pos: i32,
    dim: i32,
    head_size: i32,
) {
    freq_real.bind(0);
    freq_imag.bind(1);
    q.bind(2);
    k.bind(3);
    d.set_uniform_1i(Kernel::Rope, "pos", pos);
    d.set_uniform_1i(Kernel::Rope, "dim", dim);
    d.set_uniform_1i(Kernel::Rope, "head_size", head_size);
    d.dispatch(Kernel::Rope, (dim / 2) as u32, 1, 1);
}

/// `hb[i] <- silu(hb[i]) * hb2[i]`, grid `(hidden_dim, 1, 1)`.
pub fn silu_and_mul(d: &Dispatcher, hb: &GpuBuffer, hb2: &GpuBuffer, hidden_dim: i32) {
    hb.bind(0);
    hb2.bind(1);
    d.dispatch(Kernel::SiluAndMul, hidden_dim as u32, 1, 1);
}

/// `logits[i] /= t`, grid `(vocab_size, 1, 1)`.
pub fn temperature_scale(d: &Dispatcher, logits: &GpuBuffer, vocab_size: i32, t: f32) {
    logits.bind(0);
    d.set_uniform_1f(Kernel::TemperatureScale, "temperature", t);
    d.dispatch(Kernel::TemperatureScale, vocab_size as u32, 1, 1);
}

/// Attention scores for every head against every cached key position up to
/// `pos`: `att[h*seq_len+t] = dot(q_h, key_cache[layer_kv_off + t*dim + h*head_size ..]) / sqrt(head_size)`.
/// Grid `(n_heads, pos+1, 1)`.
#[allow(clippy::too_many_arguments)]
pub fn get_query_vector(
    d: &Dispatcher,
    q: &GpuBuffer,
    key_cache: &GpuBuffer,
    att: &GpuBuffer,
    n_heads: i32,
    pos: i32,
    head_size: i32,
    dim: i32,
    seq_len: i32,
    layer_kv_off: i32,
) {
    q.bind(0);
    key_cache.bind(1);
    att.bind(2);
    let k = Kernel::GetQueryVector;
    d.set_uniform_1i(k, "pos", pos);
    d.set_uniform_1i(k, "head_size", head_size);
    d.set_uniform_1i(k, "dim", dim);
    d.set_uniform_1i(k, "seq_len", seq_len);
    d.set_uniform_1i(k, "layer_kv_off", layer_kv_off);
    d.dispatch(k, n_heads as u32, (pos + 1) as u32, 1);
}

/// Builds the dense `(n_heads*head_size) x (pos+1)` tile
/// `m[row*(pos+1)+t] = att[h*seq_len+t] * value_cache[layer_kv_off + t*dim + h*head_size + i]`
/// (`row = h*head_size+i`), ready for a row-wise sum reduction over `t`.
/// Grid `(n_heads, head_size, pos+1)`.
#[allow(clippy::too_many_arguments)]
pub fn build_att_mat(
    d: &Dispatcher,
    att: &GpuBuffer,
    value_cache: &GpuBuffer,
    m: &GpuBuffer,
    n_heads: i32,
    pos: i32,
    head_size: i32,
    seq_len: i32,
    layer_kv_off: i32,
) {
    att.bind(0);
    value_cache.bind(1);
    m.bind(2);
    let k = Kernel::BuildAttMat;
    d.set_uniform_1i(k, "pos", pos);
    d.set_uniform_1i(k, "head_size", head_size);
    d.set_uniform_1i(k, "seq_len", seq_len);
    d.set_uniform_1i(k, "n_heads", n_heads);
    d.set_uniform_1i(k, "layer_kv_off", layer_kv_off);
    d.dispatch(k, n_heads as u32, head_size as u32, (pos + 1) as u32);
}
