pub mod checkpoint;
pub mod error;
pub mod llama;
pub mod tokenizer;

pub use checkpoint::{Checkpoint, CheckpointConfig};
pub use error::{ModelError, Result};
pub use llama::{LlamaConfig, LlamaModel};
pub use tokenizer::{BpeTokenizer, Vocab, BOS_ID, EOS_ID};
