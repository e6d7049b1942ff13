use std::rc::Rc;

use lg_tensor::gles::GpuBuffer;

use crate::checkpoint::Checkpoint;
use crate::error::Result;

use super::config::LlamaConfig;

/// Weight buffers uploaded once at startup and never written again.
///
/// `token_embedding_table` is deliberately absent: it stays host-resident,
/// borrowed from the checkpoint's memory map, and only a single row is
/// copied into `x` per step (see `LlamaModel::step`).
pub struct GpuWeights {
    pub rms_att_weight: GpuBuffer,
    pub wq: GpuBuffer,
    pub wk: GpuBuffer,
    pub wv: GpuBuffer,
    pub wo: GpuBuffer,
    pub rms_ffn_weight: GpuBuffer,
    pub w1: GpuBuffer,
    pub w2: GpuBuffer,
    pub w3: GpuBuffer,
    pub rms_final_weight: GpuBuffer,
    pub freq_cis_real: GpuBuffer,
    pub freq_cis_imag: GpuBuffer,
    pub wcls: GpuBuffer,
}

impl GpuWeights {
    pub fn upload(gl: Rc<glow::Context>, ckpt: &Checkpoint, cfg: &LlamaConfig) -> Result<GpuWeights> {
        let wcls_slice: &[f32] = match ckpt.wcls() {
            Some(w) => w,
            None => ckpt.token_embedding_table(),
        };

        Ok(GpuWeights {
            rms_att_weight: GpuBuffer::from_slice(gl.clone(), ckpt.rms_att_weight())?,
            wq: GpuBuffer::from_slice(gl.clone(), ckpt.wq())?,
            wk: GpuBuffer::from_slice(gl.clone(), ckpt.wk())?,
            wv: GpuBuffer::from_slice(gl.clone(), ckpt.wv())?,
            wo: GpuBuffer::from_slice(gl.clone(), ckpt.wo())?,
            rms_ffn_weight: GpuBuffer::from_slice(gl.clone(), ckpt.rms_ffn_weight())?,
            w1: GpuBuffer::from_slice(gl.clone(), ckpt.w1())?,
            w2: GpuBuffer::from_slice(gl.clone(), ckpt.w2())?,
            w3: GpuBuffer::from_slice(gl.clone(), ckpt.w3())?,
            rms_final_weight: GpuBuffer::from_slice(gl.clone(), ckpt.rms_final_weight())?,
            freq_cis_real: GpuBuffer::from_slice(gl.clone(), ckpt.freq_cis_real())?,
            freq_cis_imag: GpuBuffer::from_slice(gl.clone(), ckpt.freq_cis_imag())?,
            wcls: GpuBuffer::from_slice(gl, wcls_slice)?,
        })
    }

    pub fn layer_offset_dim_dim(cfg: &LlamaConfig, layer: usize) -> usize {
        layer * cfg.dim * cfg.dim
    }

    pub fn layer_offset_dim(cfg: &LlamaConfig, layer: usize) -> usize {
        layer * cfg.dim
    }

    pub fn layer_offset_ffn(cfg: &LlamaConfig, layer: usize) -> usize {
        layer * cfg.dim * cfg.hidden_dim
    }
}
