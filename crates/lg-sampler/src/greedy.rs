use lg_tensor::gles::{reduce, Dispatcher, GpuBuffer};

/// Scratch buffers the argmax reduction tree ping-pongs value/index pairs
/// through; sized once at startup to `vocab_size`.
pub struct ArgmaxScratch {
    val_a: GpuBuffer,
    val_b: GpuBuffer,
    idx_a: GpuBuffer,
    idx_b: GpuBuffer,
}

impl ArgmaxScratch {
    pub fn new(gl: std::rc::Rc<glow::Context>, vocab_size: usize) -> lg_tensor::Result<Self> {
        Ok(ArgmaxScratch {
            val_a: GpuBuffer::zeros(gl.clone(), vocab_size)?,
            val_b: GpuBuffer::zeros(gl.clone(), vocab_size)?,
            idx_a: GpuBuffer::zeros(gl.clone(), vocab_size)?,
            idx_b: GpuBuffer::zeros(gl, vocab_size)?,
        })
    }
}

/// Runs the argmax reduction tree over `logits` and returns the winning id.
pub fn greedy(d: &Dispatcher, scratch: &ArgmaxScratch, logits: &GpuBuffer, vocab_size: usize) -> u32 {
    reduce::argmax(d, &scratch.val_a, &scratch.val_b, &scratch.idx_a, &scratch.idx_b, logits, vocab_size) as u32
}
