use std::path::PathBuf;

use clap::Parser;

/// Single-sequence autoregressive inference over a headless GLES3.2 compute
/// backend: `run <checkpoint> [-t temperature] [-p topp] [-s seed] [-n steps] [-i prompt]`.
#[derive(Parser, Debug)]
#[command(name = "logit-gpu", about = "Run a LLaMA-2-family checkpoint on a headless GLES3.2 compute backend")]
pub struct Cli {
    /// Path to a checkpoint file (Config header + concatenated f32 weight arrays).
    pub checkpoint: PathBuf,

    /// Sampling temperature; 0.0 selects greedy argmax.
    #[arg(short = 't', long, default_value_t = 1.0)]
    pub temperature: f32,

    /// Nucleus sampling mass; values outside (0, 1) select plain multinomial sampling.
    #[arg(short = 'p', long = "topp", default_value_t = 0.9)]
    pub topp: f32,

    /// RNG seed for the sampler; defaults to the current time. Zero is rejected.
    #[arg(short = 's', long)]
    pub seed: Option<u64>,

    /// Number of tokens to generate, clamped to `[1, seq_len]`.
    #[arg(short = 'n', long, default_value_t = 256)]
    pub steps: usize,

    /// Prompt text; BOS alone is used when omitted.
    #[arg(short = 'i', long)]
    pub prompt: Option<String>,

    /// Raise the tracing log level; repeatable (-v, -vv, -vvv).
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    pub verbose: u8,
}
