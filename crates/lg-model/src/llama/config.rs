use crate::checkpoint::CheckpointConfig;

/// Model hyperparameters the transformer driver operates on. A thin
/// restatement of `CheckpointConfig` under the names the forward pass uses,
/// plus the fixed RMSNorm epsilon the format doesn't store.
#[derive(Debug, Clone, Copy)]
pub struct LlamaConfig {
    pub dim: usize,
    pub hidden_dim: usize,
    pub n_layers: usize,
    pub n_heads: usize,
    pub n_kv_heads: usize,
    pub vocab_size: usize,
    pub seq_len: usize,
    pub head_dim: usize,
    pub shared_weights: bool,
    pub norm_eps: f32,
}

impl From<CheckpointConfig> for LlamaConfig {
    fn from(cfg: CheckpointConfig) -> Self {
        LlamaConfig {
            dim: cfg.dim,
            hidden_dim: cfg.hidden_dim,
            n_layers: cfg.n_layers,
            n_heads: cfg.n_heads,
            n_kv_heads: cfg.n_kv_heads,
            vocab_size: cfg.vocab_size,
            seq_len: cfg.seq_len,
            head_dim: cfg.head_dim(),
            shared_weights: cfg.shared_weights,
            norm_eps: 1e-5,
        }
    }
}

impl LlamaConfig {
    pub fn q_dim(&self) -> usize {
        self.n_heads * self.head_dim
    }

    pub fn kv_dim(&self) -> usize {
        self.n_kv_heads * self.head_dim
    }

    pub fn heads_per_kv(&self) -> usize {
        self.n_heads / self.n_kv_heads
    }
}
