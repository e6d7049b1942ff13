use std::path::Path;

use memmap2::Mmap;

use crate::error::{ModelError, Result};

use super::config::CheckpointConfig;

/// Byte offsets (relative to the start of the payload, i.e. right after the
/// header) of each weight array, in the fixed order the format stores them.
struct Offsets {
    token_embedding_table: usize,
    rms_att_weight: usize,
    wq: usize,
    wk: usize,
    wv: usize,
    wo: usize,
    rms_ffn_weight: usize,
    w1: usize,
    w2: usize,
    w3: usize,
    rms_final_weight: usize,
    freq_cis_real: usize,
    freq_cis_imag: usize,
    wcls: Option<usize>,
    total_bytes: usize,
}

impl Offsets {
    fn compute(cfg: &CheckpointConfig) -> Offsets {
        let head_dim = cfg.head_dim();
        let mut off = 0usize;
        let mut take = |n_elems: usize| {
            let start = off;
            off += n_elems * 4;
            start
        };

        let token_embedding_table = take(cfg.vocab_size * cfg.dim);
        let rms_att_weight = take(cfg.n_layers * cfg.dim);
        let wq = take(cfg.n_layers * cfg.dim * (cfg.n_heads * head_dim));
        let wk = take(cfg.n_layers * cfg.dim * (cfg.n_kv_heads * head_dim));
        let wv = take(cfg.n_layers * cfg.dim * (cfg.n_kv_heads * head_dim));
        let wo = take(cfg.n_layers * (cfg.n_heads * head_dim) * cfg.dim);
        let rms_ffn_weight = take(cfg.n_layers * cfg.dim);
        let w1 = take(cfg.n_layers * cfg.dim * cfg.hidden_dim);
        let w2 = take(cfg.n_layers * cfg.hidden_dim * cfg.dim);
        let w3 = take(cfg.n_layers * cfg.dim * cfg.hidden_dim);
        let rms_final_weight = take(cfg.dim);
        let freq_cis_real = take(cfg.seq_len * head_dim / 2);
        let freq_cis_imag = take(cfg.seq_len * head_dim / 2);
        let wcls = if cfg.shared_weights {
            None
        } else {
            Some(take(cfg.vocab_size * cfg.dim))
        };

        Offsets {
            token_embedding_table,
            rms_att_weight,
            wq,
            wk,
            wv,
            wo,
            rms_ffn_weight,
            w1,
            w2,
            w3,
            rms_final_weight,
            freq_cis_real,
            freq_cis_imag,
            wcls,
            total_bytes: off,
        }
    }
}

/// A memory-mapped checkpoint file: the 7-`i32` header followed by every
/// weight array concatenated in declaration order.
pub struct Checkpoint {
    mmap: Mmap,
    pub config: CheckpointConfig,
    offsets: Offsets,
}

impl Checkpoint {
    pub fn open(path: &Path) -> Result<Checkpoint> {
        let file = std::fs::File::open(path)?;
        let mmap = unsafe { Mmap::map(&file)? };

        if mmap.len() < CheckpointConfig::HEADER_BYTES {
            return Err(ModelError::Truncated {
                expected: CheckpointConfig::HEADER_BYTES,
                got: mmap.len(),
            });
        }
        let config = CheckpointConfig::parse(&mut &mmap[..CheckpointConfig::HEADER_BYTES])?;
        let offsets = Offsets::compute(&config);

        let payload_start = CheckpointConfig::HEADER_BYTES;
        let expected = payload_start + offsets.total_bytes;
        if mmap.len() < expected {
            return Err(ModelError::Truncated {
                expected,
                got: mmap.len(),
            });
        }

        Ok(Checkpoint {
            mmap,
            config,
            offsets,
        })
    }

    fn slice(&self, byte_off: usize, n_elems: usize) -> &[f32] {
        let start = CheckpointConfig::HEADER_BYTES + byte_off;
        let bytes = &self.mmap[start..start + n_elems * 4];
        // Every offset is a multiple of 4 by construction, and f32 has no
        // padding requirements beyond 4-byte alignment on every platform we
        // run on, so this is a straightforward reinterpret of the mmap'd
        // bytes.
        unsafe { std::slice::from_raw_parts(bytes.as_ptr().cast::<f32>(), n_elems) }
    }

    pub fn token_embedding_table(&self) -> &[f32] {
        self.slice(self.offsets.token_embedding_table, self.config.vocab_size * self.config.dim)
    }

    pub fn rms_att_weight(&self) -> &[f32] {
        self.slice(self.offsets.rms_att_weight, self.config.n_layers * self.config.dim)
    }

    pub fn wq(&self) -> &[f32] {
        let head_dim = self.config.head_dim();
        self.slice(self.offsets.wq, self.config.n_layers * self.config.dim * (self.config.n_heads * head_dim))
    }

    pub fn wk(&self) -> &[f32] {
        let head_dim = self.config.head_dim();
        self.slice(self.offsets.wk, self.config.n_layers * self.config.dim * (self.config.n_kv_heads * head_dim))
    }

    pub fn wv(&self) -> &[f32] {
        let head_dim = self.config.head_dim();
        self.slice(self.offsets.wv, self.config.n_layers * self.config.dim * (self.config.n_kv_heads * head_dim))
    }

    pub fn wo(&self) -> &[f32] {
        let head_dim = self.config.head_dim();
        self.slice(self.offsets.wo, self.config.n_layers * (self.config.n_heads * head_dim) * self.config.dim)
    }

    pub fn rms_ffn_weight(&self) -> &[f32] {
        self.slice(self.offsets.rms_ffn_weight, self.config.n_layers * self.config.dim)
    }

    pub fn w1(&self) -> &[f32] {
        self.slice(self.offsets.w1, self.config.n_layers * self.config.dim * self.config.hidden_dim)
    }

    pub fn w2(&self) -> &[f32] {
        self.slice(self.offsets.w2, self.config.n_layers * self.config.hidden_dim * self.config.dim)
    }

    pub fn w3(&self) -> &[f32] {
        self.slice(self.offsets.w3, self.config.n_layers * self.config.dim * self.config.hidden_dim)
    }

    pub fn rms_final_weight(&self) -> &[f32] {
        self.slice(self.offsets.rms_final_weight, self.config.dim)
    }

    pub fn freq_cis_real(&self) -> &[f32] {
        self.slice(self.offsets.freq_cis_real, self.config.seq_len * self.config.head_dim() / 2)
    }

    pub fn freq_cis_imag(&self) -> &[f32] {
        self.slice(self.offsets.freq_cis_imag, self.config.seq_len * self.config.head_dim() / 2)
    }

    /// Unshared classifier weights, present only when `config.shared_weights`
    /// is false.
    pub fn wcls(&self) -> Option<&[f32]> {
        self.offsets.wcls.map(|off| self.slice(off, self.config.vocab_size * self.config.dim))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn temp_checkpoint_path() -> tempfile_like::TempFile {
        tempfile_like::TempFile::new()
    }

    // Minimal stand-in for a temp file without pulling in a `tempfile` dependency:
    // writes into a `std::env::temp_dir()` path unique to the test process/thread.
    mod tempfile_like {
        use std::path::PathBuf;

        pub struct TempFile {
            pub path: PathBuf,
        }

        impl TempFile {
            pub fn new() -> Self {
                let path = std::env::temp_dir().join(format!(
                    "lg-model-checkpoint-test-{}-{:?}",
                    std::process::id(),
                    std::thread::current().id()
                ));
                TempFile { path }
            }
        }

        impl Drop for TempFile {
            fn drop(&mut self) {
                let _ = std::fs::remove_file(&self.path);
            }
        }
    }

    fn build_checkpoint_bytes(dim: usize, hidden_dim: usize, n_layers: usize, n_heads: usize, n_kv_heads: usize, vocab_size: i32, seq_len: usize) -> Vec<u8> {
        let mut bytes = Vec::new();
        for v in [dim as i32, hidden_dim as i32, n_layers as i32, n_heads as i32, n_kv_heads as i32, vocab_size, seq_len as i32] {
            bytes.extend_from_slice(&v.to_le_bytes());
        }
        let head_dim = dim / n_heads;
        let vs = vocab_size.unsigned_abs() as usize;
        let mut push_n = |n: usize| {
            for i in 0..n {
                bytes.extend_from_slice(&(i as f32).to_le_bytes());
            }
        };
        push_n(vs * dim);
        push_n(n_layers * dim);
        push_n(n_layers * dim * n_heads * head_dim);
        push_n(n_layers * dim * n_kv_heads * head_dim);
        push_n(n_layers * dim * n_kv_heads * head_dim);
        push_n(n_layers * n_heads * head_dim * dim);
        push_n(n_layers * dim);
        push_n(n_layers * dim * hidden_dim);
        push_n(n_layers * hidden_dim * dim);
        push_n(n_layers * dim * hidden_dim);
        push_n(dim);
        push_n(seq_len * head_dim / 2);
        push_n(seq_len * head_dim / 2);
        if vocab_size < 0 {
            push_n(vs * dim);
        }
        bytes
    }

    #[test]
    fn reads_shared_weight_checkpoint() {
        let tmp = temp_checkpoint_path();
        let bytes = build_checkpoint_bytes(8, 16, 2, 2, 2, 10, 4);
        std::fs::File::create(&tmp.path).unwrap().write_all(&bytes).unwrap();

        let ckpt = Checkpoint::open(&tmp.path).unwrap();
        assert_eq!(ckpt.config.dim, 8);
        assert_eq!(ckpt.config.vocab_size, 10);
        assert!(ckpt.config.shared_weights);
        assert_eq!(ckpt.token_embedding_table().len(), 10 * 8);
        assert!(ckpt.wcls().is_none());
        assert_eq!(ckpt.rms_final_weight()[0], 0.0);
    }

    #[test]
    fn reads_unshared_weight_checkpoint() {
        let tmp = temp_checkpoint_path();
        let bytes = build_checkpoint_bytes(8, 16, 2, 2, 2, -10, 4);
        std::fs::File::create(&tmp.path).unwrap().write_all(&bytes).unwrap();

        let ckpt = Checkpoint::open(&tmp.path).unwrap();
        assert!(!ckpt.config.shared_weights);
        assert_eq!(ckpt.wcls().unwrap().len(), 10 * 8);
    }

    #[test]
    fn rejects_truncated_file() {
        let tmp = temp_checkpoint_path();
        std::fs::File::create(&tmp.path).unwrap().write_all(&[0u8; 4]).unwrap();
        assert!(Checkpoint::open(&tmp.path).is_err());
    }
}
