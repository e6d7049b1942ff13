pub mod config;
pub mod kv_cache;
pub mod weights;

pub use config::LlamaConfig;
pub use kv_cache::KvCache;
pub use weights::GpuWeights;

use lg_tensor::gles::{primitives, reduce, Dispatcher, GpuBuffer, ReduceScratch};

use crate::checkpoint::Checkpoint;
use crate::error::Result;

/// Per-step activation buffers, GPU-resident and reused across every token;
/// `x` is the only one that crosses layer boundaries within a step.
struct Activations {
    x: GpuBuffer,
    xb: GpuBuffer,
    xb2: GpuBuffer,
    hb: GpuBuffer,
    hb2: GpuBuffer,
    q: GpuBuffer,
    k: GpuBuffer,
    v: GpuBuffer,
    att: GpuBuffer,
    logits: GpuBuffer,
}

/// The four named scratch buffers every reduction and composite pass
/// ping-pongs between, sized to the largest reduction input in the pipeline.
struct ScratchBuffers {
    reduce_a: GpuBuffer,
    reduce_b: GpuBuffer,
    compose_in: GpuBuffer,
    compose_out: GpuBuffer,
}

/// A LLaMA-2-family transformer driven entirely through GPU compute
/// dispatches, per layer: attention-RMSNorm, QKV projection, RoPE, KV-cache
/// write, scaled dot-product attention, output projection, residual,
/// FFN-RMSNorm, SwiGLU feed-forward, residual; then a final RMSNorm and an
/// LM-head projection to logits.
///
/// `step` leaves the result in the on-device `logits` buffer; sampling
/// (greedy/temperature/top-p) is the caller's responsibility (`lg-sampler`
/// operates on exactly this buffer).
pub struct LlamaModel {
    pub config: LlamaConfig,
    checkpoint: Checkpoint,
    dispatcher: Dispatcher,
    weights: GpuWeights,
    cache: KvCache,
    act: Activations,
    scratch: ScratchBuffers,
}

impl LlamaModel {
    pub fn new(dispatcher: Dispatcher, checkpoint: Checkpoint) -> Result<LlamaModel> {
        let config: LlamaConfig = checkpoint.config.into();
        let gl = dispatcher.gl_context();

        let weights = GpuWeights::upload(gl.clone(), &checkpoint, &config)?;
        let cache = KvCache::new(gl.clone(), &config)?;

        let act = Activations {
            x: GpuBuffer::zeros(gl.clone(), config.dim)?,
            xb: GpuBuffer::zeros(gl.clone(), config.dim)?,
            xb2: GpuBuffer::zeros(gl.clone(), config.dim)?,
            hb: GpuBuffer::zeros(gl.clone(), config.hidden_dim)?,
            hb2: GpuBuffer::zeros(gl.clone(), config.hidden_dim)?,
            q: GpuBuffer::zeros(gl.clone(), config.dim)?,
            k: GpuBuffer::zeros(gl.clone(), config.dim)?,
            v: GpuBuffer::zeros(gl.clone(), config.dim)?,
            att: GpuBuffer::zeros(gl.clone(), config.n_heads * config.seq_len)?,
            logits: GpuBuffer::zeros(gl.clone(), config.vocab_size)?,
        };

        // Every reduction and composite pass ping-pongs within one of these,
        // so they must be large enough for the biggest single input seen
        // anywhere in the pipeline: either a dim x seq_len KV/attention tile
        // or the vocab-sized logits vector.
        let scratch_size = (config.dim * config.seq_len).max(config.vocab_size);
        let scratch = ScratchBuffers {
            reduce_a: GpuBuffer::zeros(gl.clone(), scratch_size)?,
            reduce_b: GpuBuffer::zeros(gl.clone(), scratch_size)?,
            compose_in: GpuBuffer::zeros(gl.clone(), scratch_size)?,
            compose_out: GpuBuffer::zeros(gl, scratch_size)?,
        };

        Ok(LlamaModel {
            config,
            checkpoint,
            dispatcher,
            weights,
            cache,
            act,
            scratch,
        })
    }

    fn scratch_view(&self) -> ReduceScratch<'_> {
        ReduceScratch {
            reduce_a: &self.scratch.reduce_a,
            reduce_b: &self.scratch.reduce_b,
            compose_in: &self.scratch.compose_in,
            compose_out: &self.scratch.compose_out,
        }
    }

    pub fn logits(&self) -> &GpuBuffer {
        &self.act.logits
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    pub fn scratch(&self) -> ReduceScratch<'_> {
        self.scratch_view()
    }

    pub fn vocab_size(&self) -> usize {
        self.config.vocab_size
    }

    pub fn seq_len(&self) -> usize {
        self.config.seq_len
    }

    /// Clears the KV cache. The CLI driver never calls this (one prompt per
    /// process), but it's the entry point a longer-lived host would use
    /// between independent sequences.
    pub fn reset_cache(&mut self) -> Result<()> {
        self.cache = KvCache::new(self.dispatcher.gl_context(), &self.config)?;
        Ok(())
    }

    /// Runs the forward pass for one token at sequence position `pos`,
    /// leaving logits in the on-device buffer returned by `logits()`.
    pub fn step(&mut self, token: u32, pos: usize) -> Result<()> {
        let cfg = self.config;
        let d = &self.dispatcher;
        let scratch = self.scratch_view();

        // 1. Embedding copy: token_embedding_table stays host-resident; only
        // this one row crosses to the device each step.
        let embed_off = token as usize * cfg.dim;
        let row = &self.checkpoint.token_embedding_table()[embed_off..embed_off + cfg.dim];
        self.act.x.write(0, row);

        for l in 0..cfg.n_layers {
            let norm_off = GpuWeights::layer_offset_dim(&cfg, l) as i32;
            let proj_off = GpuWeights::layer_offset_dim_dim(&cfg, l) as i32;
            let ffn_off = GpuWeights::layer_offset_ffn(&cfg, l) as i32;
            let kv_slot_off = self.cache.layer_offset(l) as i32;

            // a. rmsnorm(xb, x, rms_att_weight, dim, l*dim)
            reduce::rmsnorm(d, &scratch, &self.act.x, &self.weights.rms_att_weight, Some(&self.act.xb), cfg.dim, norm_off);

            // b. q, k, v = matmul(wq/wk/wv, xb)
            primitives::matmul(d, &self.act.xb, &self.weights.wq, &self.act.q, cfg.dim as i32, cfg.dim as i32, 0, proj_off);
            primitives::matmul(d, &self.act.xb, &self.weights.wk, &self.act.k, cfg.dim as i32, cfg.dim as i32, 0, proj_off);
            primitives::matmul(d, &self.act.xb, &self.weights.wv, &self.act.v, cfg.dim as i32, cfg.dim as i32, 0, proj_off);

            // c. RoPE, q and k bound at distinct indices (2 and 3).
            primitives::rope(
                d,
                &self.weights.freq_cis_real,
                &self.weights.freq_cis_imag,
                &self.act.q,
                &self.act.k,
                pos as i32,
                cfg.dim as i32,
                cfg.head_dim as i32,
            );

            // d. KV cache write, device-to-device.
            self.cache.write(l, pos, &self.act.k, &self.act.v);

            // e. Attention scores over grid (n_heads, pos+1, 1).
            primitives::get_query_vector(
                d,
                &self.act.q,
                &self.cache.key_cache,
                &self.act.att,
                cfg.n_heads as i32,
                pos as i32,
                cfg.head_dim as i32,
                cfg.dim as i32,
                cfg.seq_len as i32,
                kv_slot_off,
            );

            // f. attention-softmax over the ragged pos+1-wide rows.
            reduce::attention_softmax(d, &scratch, &self.act.att, pos, cfg.seq_len, cfg.n_heads);

            // g. Value-weighted sum: build the dense tile then reduce along t.
            primitives::build_att_mat(
                d,
                &self.act.att,
                &self.cache.value_cache,
                &self.scratch.compose_in,
                cfg.n_heads as i32,
                pos as i32,
                cfg.head_dim as i32,
                cfg.seq_len as i32,
                kv_slot_off,
            );
            reduce::attention_weighted_sum(d, &scratch, &self.act.xb, pos, cfg.dim);

            // h. Output projection.
            primitives::matmul(d, &self.act.xb, &self.weights.wo, &self.act.xb2, cfg.dim as i32, cfg.dim as i32, 0, proj_off);

            // i. Residual.
            primitives::accum(d, &self.act.x, &self.act.xb2, cfg.dim as i32);

            // j. FFN RMSNorm.
            reduce::rmsnorm(d, &scratch, &self.act.x, &self.weights.rms_ffn_weight, Some(&self.act.xb), cfg.dim, norm_off);

            // k. Gate and up projections.
            primitives::matmul(d, &self.act.xb, &self.weights.w1, &self.act.hb, cfg.dim as i32, cfg.hidden_dim as i32, 0, ffn_off);
            primitives::matmul(d, &self.act.xb, &self.weights.w3, &self.act.hb2, cfg.dim as i32, cfg.hidden_dim as i32, 0, ffn_off);

            // l. SwiGLU.
            primitives::silu_and_mul(d, &self.act.hb, &self.act.hb2, cfg.hidden_dim as i32);

            // m. Down projection.
            primitives::matmul(d, &self.act.hb, &self.weights.w2, &self.act.xb, cfg.hidden_dim as i32, cfg.dim as i32, 0, ffn_off);

            // n. Residual.
            primitives::accum(d, &self.act.x, &self.act.xb, cfg.dim as i32);
        }

        // 3. Final RMSNorm, in place.
        reduce::rmsnorm(d, &scratch, &self.act.x, &self.weights.rms_final_weight, None, cfg.dim, 0);

        // 4. LM head projection to logits.
        primitives::matmul(d, &self.act.x, &self.weights.wcls, &self.act.logits, cfg.dim as i32, cfg.vocab_size as i32, 0, 0);

        Ok(())
    }
}
