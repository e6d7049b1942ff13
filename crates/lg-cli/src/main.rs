mod args;
mod error;

use std::io::Write;
use std::time::{Instant, SystemTime, UNIX_EPOCH};

use clap::Parser;
use tracing_subscriber::EnvFilter;

use lg_model::{tokenizer, Checkpoint, LlamaConfig, LlamaModel, BOS_ID};
use lg_sampler::Sampler;
use lg_tensor::gles::{Dispatcher, GlesContext, KernelCatalog};

use args::Cli;
use error::{CliError, Result};

fn main() {
    // `Cli::parse()` would exit(2) on a usage error; the exit-code contract
    // here is binary (0 success, 1 any failure), so usage errors are routed
    // through the same path as every other argument error instead.
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(err) => {
            eprintln!("{err}");
            std::process::exit(1);
        }
    };
    init_tracing(cli.verbose);

    if let Err(err) = run(cli) {
        tracing::error!(error = %err, "run failed");
        eprintln!("{err}");
        std::process::exit(1);
    }
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).init();
}

/// Locates `tokenizer.bin` next to the running executable, falling back to
/// the current working directory (the two usually coincide; the fallback
/// covers `cargo run`, where `current_exe()` points into `target/`).
fn tokenizer_path() -> Result<std::path::PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(dir) = exe.parent() {
            let candidate = dir.join("tokenizer.bin");
            if candidate.exists() {
                return Ok(candidate);
            }
        }
    }
    Ok(std::path::PathBuf::from("tokenizer.bin"))
}

fn run(cli: Cli) -> Result<()> {
    let seed = cli.seed.unwrap_or_else(default_seed);
    if seed == 0 {
        return Err(CliError::Args("seed must be nonzero".to_string()));
    }

    let checkpoint = Checkpoint::open(&cli.checkpoint)?;
    let config: LlamaConfig = checkpoint.config.into();
    let steps = cli.steps.clamp(1, config.seq_len);

    let tokenizer = tokenizer::load(&tokenizer_path()?, config.vocab_size)?;

    let context = GlesContext::acquire().map_err(|e| CliError::Context(e.to_string()))?;
    let gl = context.gl();
    let catalog = KernelCatalog::compile(&gl).map_err(|e| CliError::Context(e.to_string()))?;
    let dispatcher = Dispatcher::new(gl.clone(), catalog);

    let mut model = LlamaModel::new(dispatcher, checkpoint)?;
    let mut sampler = Sampler::new(gl, config.vocab_size, seed)?;

    let prompt_tokens: Vec<u32> = cli.prompt.as_deref().map(|p| tokenizer.encode(p)).unwrap_or_default();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut token = BOS_ID;
    let mut pos = 0usize;
    let mut start: Option<Instant> = None;

    while pos < steps {
        model.step(token, pos)?;

        let next = if pos < prompt_tokens.len() {
            prompt_tokens[pos]
        } else {
            sampler.sample(model.dispatcher(), &model.scratch(), model.logits(), cli.temperature, cli.topp)
        };

        pos += 1;
        if next == BOS_ID {
            break;
        }

        let piece = tokenizer.piece_for(token, next);
        write!(out, "{piece}")?;
        out.flush()?;
        token = next;

        if start.is_none() {
            start = Some(Instant::now());
        }
    }
    writeln!(out)?;

    if let Some(start) = start {
        if pos > 1 {
            let elapsed = start.elapsed().as_secs_f64();
            if elapsed > 0.0 {
                eprintln!("achieved tok/s: {:.2}", (pos - 1) as f64 / elapsed);
            }
        }
    }

    Ok(())
}

fn default_seed() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_secs()).unwrap_or(1)
}
