pub mod bpe;
pub mod vocab;

use std::path::Path;

pub use bpe::BpeTokenizer;
pub use vocab::Vocab;

use crate::error::Result;

/// SentencePiece convention: id 1 is BOS, id 2 is EOS. Neither is stored in
/// `tokenizer.bin`; the engine bakes them in as constants, same as the
/// original llama2.c tooling that produced these files.
pub const BOS_ID: u32 = 1;
pub const EOS_ID: u32 = 2;

pub fn load(path: &Path, vocab_size: usize) -> Result<BpeTokenizer> {
    let vocab = Vocab::load(path, vocab_size)?;
    Ok(BpeTokenizer::new(vocab, BOS_ID, EOS_ID))
}
