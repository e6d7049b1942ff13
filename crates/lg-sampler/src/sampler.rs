use std::rc::Rc;

use lg_tensor::gles::{primitives, reduce, Dispatcher, GpuBuffer, ReduceScratch};

use crate::greedy::{self, ArgmaxScratch};
use crate::multinomial;
use crate::rng::Xorshift;
use crate::top_p;

/// Owns the process's single xorshift* stream and the argmax scratch
/// buffers, and picks among the three sampling strategies per step.
///
/// `temperature == 0.0` always takes the greedy path regardless of `topp`;
/// otherwise `topp` in `(0, 1)` selects nucleus sampling and `topp <= 0.0` (or
/// `>= 1.0`) selects plain multinomial sampling over the full distribution.
pub struct Sampler {
    rng: Xorshift,
    vocab_size: usize,
    argmax: ArgmaxScratch,
}

impl Sampler {
    pub fn new(gl: Rc<glow::Context>, vocab_size: usize, seed: u64) -> lg_tensor::Result<Self> {
        Ok(Sampler {
            rng: Xorshift::new(seed),
            vocab_size,
            argmax: ArgmaxScratch::new(gl, vocab_size)?,
        })
    }

    /// Picks the next token from `logits`, leaving it softmax-normalized
    /// on-device afterward unless the temperature-zero greedy path was taken.
    pub fn sample(&mut self, d: &Dispatcher, scratch: &ReduceScratch, logits: &GpuBuffer, temperature: f32, topp: f32) -> u32 {
        if temperature == 0.0 {
            return greedy::greedy(d, &self.argmax, logits, self.vocab_size);
        }

        primitives::temperature_scale(d, logits, self.vocab_size as i32, temperature);
        reduce::softmax(d, scratch, logits, self.vocab_size, 1);

        let mut probs = vec![0.0f32; self.vocab_size];
        logits.read(0, &mut probs);

        let r = self.rng.next_f32();
        let idx = if topp > 0.0 && topp < 1.0 {
            top_p::sample_topp(&probs, topp, r)
        } else {
            multinomial::sample(&probs, r)
        };
        idx as u32
    }
}
