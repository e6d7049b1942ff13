use std::rc::Rc;

use lg_tensor::gles::GpuBuffer;

use crate::error::Result;

use super::config::LlamaConfig;

/// GPU-resident key/value cache, `n_layers x seq_len x dim` each. Writes are
/// device-to-device copies from the just-computed `k`/`v` activation buffers,
/// so a cache update never round-trips through the host.
pub struct KvCache {
    pub key_cache: GpuBuffer,
    pub value_cache: GpuBuffer,
    dim: usize,
    seq_len: usize,
}

impl KvCache {
    pub fn new(gl: Rc<glow::Context>, cfg: &LlamaConfig) -> Result<KvCache> {
        let size = cfg.n_layers * cfg.seq_len * cfg.dim;
        Ok(KvCache {
            key_cache: GpuBuffer::zeros(gl.clone(), size)?,
            value_cache: GpuBuffer::zeros(gl, size)?,
            dim: cfg.dim,
            seq_len: cfg.seq_len,
        })
    }

    fn slot_offset(&self, layer: usize, pos: usize) -> usize {
        layer * self.seq_len * self.dim + pos * self.dim
    }

    /// Writes this step's `k`/`v` (each length `dim`) into layer `layer` at
    /// position `pos`, via an on-device buffer-to-buffer copy.
    pub fn write(&self, layer: usize, pos: usize, k: &GpuBuffer, v: &GpuBuffer) {
        let off = self.slot_offset(layer, pos);
        self.key_cache.copy_from(k, 0, off, self.dim);
        self.value_cache.copy_from(v, 0, off, self.dim);
    }

    pub fn layer_offset(&self, layer: usize) -> usize {
        layer * self.seq_len * self.dim
    }
}
