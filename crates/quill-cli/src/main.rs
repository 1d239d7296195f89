use std::path::{Path, PathBuf};
use std::process;

use clap::{Args, Parser};
use quill_core::{QuillError, Result};
use quill_transformer::{load_tensor, Transformer, TransformerConfig};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing_subscriber::EnvFilter;

const BANNER: &str = r#"
  ___  _   _ ___ _     _
 / _ \| | | |_ _| |   | |
| | | | | | || || |   | |
| |_| | |_| || || |___| |___
 \__\_\\___/|___|_____|_____|"#;

#[derive(Parser)]
#[command(
    name = "quill",
    about = "Quill minimal transformer CLI",
    long_about = "A single-layer, single-head causal transformer.\n\nInitialize a model, inspect it, run forward passes, generate tokens\nand record training losses. Models are stored as a directory holding\nconfig.json and weights.safetensors.",
    version,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Hyperparameters used when building a fresh model.
#[derive(Args)]
struct ModelArgs {
    /// JSON config file; overrides the individual flags below
    #[arg(long)]
    config: Option<PathBuf>,
    /// Number of distinct token ids
    #[arg(long, default_value = "256")]
    vocab_size: usize,
    /// Width of every hidden vector
    #[arg(long, default_value = "64")]
    embedding_dim: usize,
    /// Maximum context length
    #[arg(long, default_value = "128")]
    max_seq_len: usize,
    /// Step size for output-head updates
    #[arg(long, default_value = "0.001")]
    learning_rate: f32,
}

impl ModelArgs {
    fn to_config(&self) -> Result<TransformerConfig> {
        match &self.config {
            Some(path) => TransformerConfig::from_file(path),
            None => {
                let config = TransformerConfig::new(
                    self.vocab_size,
                    self.embedding_dim,
                    self.max_seq_len,
                    self.learning_rate,
                );
                config.validate()?;
                Ok(config)
            }
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Create a randomly initialized model and save it
    Init {
        #[command(flatten)]
        model: ModelArgs,
        /// Seed for weight initialization
        #[arg(long, default_value = "0")]
        seed: u64,
        /// Pre-trained token embeddings (.safetensors)
        #[arg(long)]
        embeddings: Option<PathBuf>,
        /// Tensor name inside the embeddings file
        #[arg(long, default_value = "embedding.token")]
        embeddings_tensor: String,
        /// Output model directory
        #[arg(long, default_value = "model")]
        out: PathBuf,
    },
    /// Show hyperparameters, parameter counts and training history
    Info {
        /// Model directory
        #[arg(long)]
        model: PathBuf,
    },
    /// Run one forward pass and print the next-token logits
    Forward {
        #[arg(long)]
        model: PathBuf,
        /// Comma-separated token ids
        #[arg(long)]
        ids: String,
        /// Disable the causal mask
        #[arg(long)]
        no_causal: bool,
        /// Also print the attention weights
        #[arg(long)]
        attention: bool,
    },
    /// Generate tokens after a prompt
    Generate {
        #[arg(long)]
        model: PathBuf,
        /// Comma-separated prompt token ids
        #[arg(long)]
        prompt: String,
        #[arg(long, default_value = "16")]
        max_new_tokens: usize,
        #[arg(long, default_value = "1.0")]
        temperature: f32,
        /// Sampling seed
        #[arg(long, default_value = "0")]
        seed: u64,
    },
    /// Run training steps on one (ids, target) example and save the result
    Train {
        #[arg(long)]
        model: PathBuf,
        /// Comma-separated context token ids
        #[arg(long)]
        ids: String,
        /// Expected next token id
        #[arg(long)]
        target: usize,
        #[arg(long, default_value = "10")]
        steps: usize,
        /// Apply SGD to the output head instead of only recording the loss
        #[arg(long)]
        update_head: bool,
    },
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Init { model, seed, embeddings, embeddings_tensor, out } => {
            cmd_init(&model, seed, embeddings.as_deref(), &embeddings_tensor, &out)
        }
        Commands::Info { model } => cmd_info(&model),
        Commands::Forward { model, ids, no_causal, attention } => {
            cmd_forward(&model, &ids, !no_causal, attention)
        }
        Commands::Generate { model, prompt, max_new_tokens, temperature, seed } => {
            cmd_generate(&model, &prompt, max_new_tokens, temperature, seed)
        }
        Commands::Train { model, ids, target, steps, update_head } => {
            cmd_train(&model, &ids, target, steps, update_head)
        }
    };

    if let Err(e) = result {
        eprintln!("error: {}", e);
        process::exit(1);
    }
}

fn parse_ids(s: &str) -> Result<Vec<usize>> {
    s.split(',')
        .map(|t| t.trim())
        .filter(|t| !t.is_empty())
        .map(|t| {
            t.parse::<usize>()
                .map_err(|_| QuillError::ParseError(format!("invalid token id {:?}", t)))
        })
        .collect()
}

fn cmd_init(
    args: &ModelArgs,
    seed: u64,
    embeddings: Option<&Path>,
    embeddings_tensor: &str,
    out: &Path,
) -> Result<()> {
    let config = args.to_config()?;
    let mut model = Transformer::with_seed(config, seed)?;

    if let Some(path) = embeddings {
        let weight = load_tensor(path, embeddings_tensor)?;
        model.load_embeddings(weight)?;
        println!("Loaded embeddings {} from {}", embeddings_tensor, path.display());
    }

    model.save(out)?;
    println!("Initialized model ({} params) at {}", model.param_count(), out.display());
    Ok(())
}

fn cmd_info(dir: &Path) -> Result<()> {
    let model = Transformer::load(dir)?;
    let c = model.config();

    println!("{}", BANNER);
    println!("  v{}  -  minimal causal transformer\n", env!("CARGO_PKG_VERSION"));

    println!("Config");
    println!("  vocab_size:    {}", c.vocab_size);
    println!("  embedding_dim: {}", c.embedding_dim);
    println!("  ffn_dim:       {}", c.ffn_dim());
    println!("  max_seq_len:   {}", c.max_seq_len);
    println!("  learning_rate: {}", c.learning_rate);

    println!("\nParameters ({})", model.param_count());
    for (name, t) in model.parameters() {
        println!("  {:<20} {:?}", name, t.dims());
    }

    let history = model.training_history();
    println!("\nTraining history ({} steps)", history.len());
    if let (Some(first), Some(last)) = (history.first(), history.last()) {
        println!("  first loss: {:.6}", first);
        println!("  last loss:  {:.6}", last);
    }
    Ok(())
}

fn cmd_forward(dir: &Path, ids: &str, causal: bool, attention: bool) -> Result<()> {
    let model = Transformer::load(dir)?;
    let ids = parse_ids(ids)?;
    let out = model.forward(&ids, causal)?;

    println!("logits: {:?}", out.logits.as_f32_slice());
    println!("argmax: {}", quill_transformer::sampler::argmax(out.logits.as_f32_slice()));

    if attention {
        let weights = model.attention_weights(&ids, causal)?;
        let n = ids.len();
        println!("\nattention weights [{}, {}]", n, n);
        for row in weights.as_f32_slice().chunks(n) {
            let cells: Vec<String> = row.iter().map(|w| format!("{:.4}", w)).collect();
            println!("  {}", cells.join(" "));
        }
    }
    Ok(())
}

fn cmd_generate(dir: &Path, prompt: &str, max_new_tokens: usize, temperature: f32, seed: u64) -> Result<()> {
    let model = Transformer::load(dir)?;
    let prompt = parse_ids(prompt)?;
    let mut rng = StdRng::seed_from_u64(seed);
    let tokens = model.generate(&prompt, max_new_tokens, temperature, &mut rng)?;

    let line: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    println!("{}", line.join(","));
    Ok(())
}

fn cmd_train(dir: &Path, ids: &str, target: usize, steps: usize, update_head: bool) -> Result<()> {
    let mut model = Transformer::load(dir)?;
    let ids = parse_ids(ids)?;

    println!("=== Quill Training ===");
    println!("Steps: {}, LR: {}, update head: {}", steps, model.config().learning_rate, update_head);
    println!("\n{:<8} {:>10}", "Step", "Loss");
    println!("{}", "-".repeat(20));

    for step in 0..steps {
        let loss = if update_head {
            model.train_step_output_head(&ids, target)?.loss()
        } else {
            model.train_step(&ids, target)?
        };
        if step % (steps / 10).max(1) == 0 || step == steps - 1 {
            println!("{:<8} {:>10.6}", step, loss);
        }
    }

    model.save(dir)?;
    println!("\nSaved model to {}", dir.display());
    Ok(())
}
