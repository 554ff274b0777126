//! strkernel command line interface
//!
//! Computes weighted-degree string kernel matrices through the row cache,
//! scores sequences against a support-vector expansion via the substring
//! trie, and inspects kernel weight tables.

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use env_logger::Env;
use log::{error, info, warn};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use strkernel::cache::{CacheStats, KernelRowCache};
use strkernel::core::{Alphabet, Result, SequenceSet, StringKernelError};
use strkernel::data::{load_support_weights, DenseSequenceSet};
use strkernel::kernel::{wd_block_weights, wd_weights, WeightedDegreeKernel};

#[derive(Parser)]
#[command(name = "strkernel")]
#[command(about = "Weighted-degree string kernel engine")]
#[command(version = env!("CARGO_PKG_VERSION"))]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Enable debug output
    #[arg(short, long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Compute the kernel matrix of a sequence file
    Gram(GramArgs),
    /// Score sequences against a weighted support set
    Score(ScoreArgs),
    /// Display kernel weight tables
    Info(InfoArgs),
}

#[derive(Args)]
struct GramArgs {
    /// Sequence file ("label sequence" per line)
    #[arg(long)]
    data: PathBuf,

    /// Maximum substring length
    #[arg(long, default_value = "4")]
    degree: usize,

    /// Mismatch budget per substring
    #[arg(long, default_value = "0")]
    max_mismatch: usize,

    /// Alphabet symbols, in rank order
    #[arg(long, default_value = "ACGT")]
    alphabet: String,

    /// Kernel cache size in MB
    #[arg(long, default_value = "100")]
    cache_size: usize,

    /// Skip kernel normalization (raw substring counts)
    #[arg(long)]
    raw: bool,

    /// Output JSON report file (prints a summary to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct ScoreArgs {
    /// Support sequence file ("label sequence" per line)
    #[arg(long)]
    support: PathBuf,

    /// Support coefficient file ("index weight" per line)
    #[arg(long)]
    weights: PathBuf,

    /// Sequences to score
    #[arg(long)]
    data: PathBuf,

    /// Maximum substring length
    #[arg(long, default_value = "4")]
    degree: usize,

    /// Mismatch budget per substring
    #[arg(long, default_value = "0")]
    max_mismatch: usize,

    /// Alphabet symbols, in rank order
    #[arg(long, default_value = "ACGT")]
    alphabet: String,

    /// Break scores down by substring length
    #[arg(long)]
    levels: bool,

    /// Output scores file (prints to stdout if not specified)
    #[arg(short, long)]
    output: Option<PathBuf>,
}

#[derive(Args)]
struct InfoArgs {
    /// Maximum substring length
    #[arg(long, default_value = "4")]
    degree: usize,

    /// Mismatch budget per substring
    #[arg(long, default_value = "0")]
    max_mismatch: usize,

    /// Alphabet symbols, in rank order
    #[arg(long, default_value = "ACGT")]
    alphabet: String,

    /// Sequence length the block weights cover
    #[arg(long, default_value = "16")]
    length: usize,
}

/// JSON report written by the gram command
#[derive(Serialize)]
struct GramReport {
    generated_at: DateTime<Utc>,
    data_file: String,
    degree: usize,
    max_mismatch: usize,
    normalized: bool,
    num_sequences: usize,
    sequence_length: usize,
    cache: CacheStats,
    matrix: Vec<Vec<f64>>,
}

fn main() {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.debug {
        "debug"
    } else if cli.verbose {
        "info"
    } else {
        "warn"
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(log_level)).init();

    let result = match cli.command {
        Commands::Gram(args) => gram_command(args),
        Commands::Score(args) => score_command(args),
        Commands::Info(args) => info_command(args),
    };

    if let Err(e) = result {
        error!("Error: {e}");
        process::exit(1);
    }
}

fn gram_command(args: GramArgs) -> Result<()> {
    info!("Computing kernel matrix for {:?}", args.data);
    info!(
        "Parameters: degree={}, max_mismatch={}, cache={}MB",
        args.degree, args.max_mismatch, args.cache_size
    );

    let alphabet = Alphabet::new(args.alphabet.as_bytes())?;
    let sequences = Arc::new(DenseSequenceSet::from_file(&args.data, &alphabet)?);
    let n = sequences.len();
    let seq_length = sequences.max_len();
    info!("Loaded {} sequences of length {}", n, seq_length);

    let kernel = Arc::new(WeightedDegreeKernel::with_options(
        Arc::clone(&sequences),
        args.degree,
        args.max_mismatch,
        true,
        !args.raw,
    )?);
    let mut cache =
        KernelRowCache::with_maximum_size(kernel, args.cache_size * 1024 * 1024)?;

    let mut matrix = Vec::with_capacity(n);
    for i in 0..n {
        let row = cache.query_row(i, n);
        matrix.push(row.to_vec());
    }

    let stats = cache.stats();
    info!(
        "Cache: {} hits, {} misses, {} evictions, {} bytes resident",
        stats.hits, stats.misses, stats.evictions, stats.current_bytes
    );

    let report = GramReport {
        generated_at: Utc::now(),
        data_file: args.data.display().to_string(),
        degree: args.degree,
        max_mismatch: args.max_mismatch,
        normalized: !args.raw,
        num_sequences: n,
        sequence_length: seq_length,
        cache: stats,
        matrix,
    };

    if let Some(output_path) = args.output {
        let file = File::create(&output_path).map_err(StringKernelError::IoError)?;
        serde_json::to_writer_pretty(BufWriter::new(file), &report)
            .map_err(|e| StringKernelError::SerializationError(e.to_string()))?;
        info!("Report saved to: {output_path:?}");
    } else {
        println!("=== Kernel Matrix ===");
        println!("Sequences: {} (length {})", n, seq_length);
        println!(
            "Degree: {} (mismatch budget {})",
            args.degree, args.max_mismatch
        );
        for row in &report.matrix {
            let line: Vec<String> = row.iter().map(|v| format!("{v:.6}")).collect();
            println!("{}", line.join(" "));
        }
        println!(
            "\nCache: {} hits, {} misses, hit rate {:.1}%",
            report.cache.hits,
            report.cache.misses,
            100.0 * report.cache.hits as f64
                / (report.cache.hits + report.cache.misses).max(1) as f64
        );
    }

    Ok(())
}

fn score_command(args: ScoreArgs) -> Result<()> {
    info!("Loading support set from {:?}", args.support);
    let alphabet = Alphabet::new(args.alphabet.as_bytes())?;
    let support = Arc::new(DenseSequenceSet::from_file(&args.support, &alphabet)?);

    let pairs = load_support_weights(&args.weights)?;
    if pairs.is_empty() {
        return Err(StringKernelError::InvalidParameter(
            "support weight file is empty".to_string(),
        ));
    }
    let (indices, alphas): (Vec<usize>, Vec<f64>) = pairs.into_iter().unzip();
    info!("Support set: {} sequences, {} coefficients", support.len(), indices.len());

    let kernel =
        WeightedDegreeKernel::new(Arc::clone(&support), args.degree, args.max_mismatch)?;
    let trie = kernel.init_optimization(&indices, &alphas)?;

    info!("Scoring sequences from {:?}", args.data);
    let targets = DenseSequenceSet::from_file(&args.data, &alphabet)?;
    if targets.max_len() != support.max_len() {
        warn!(
            "scoring sequences of length {} against a support set of length {}",
            targets.max_len(),
            support.max_len()
        );
    }

    let mut scores = Vec::with_capacity(targets.len());
    let mut level_contribs = Vec::new();
    for j in 0..targets.len() {
        let seq = targets.sequence(j);
        scores.push(kernel.compute_by_tree(&trie, seq));
        if args.levels {
            let mut levels = vec![0.0; args.degree];
            kernel.compute_by_tree_levels(&trie, seq, &mut levels);
            level_contribs.push(levels);
        }
    }

    if let Some(output_path) = args.output {
        let file = File::create(&output_path).map_err(StringKernelError::IoError)?;
        let mut writer = BufWriter::new(file);
        write_scores(&mut writer, &scores, &level_contribs, args.levels)
            .map_err(StringKernelError::IoError)?;
        info!("Scores saved to: {output_path:?}");
    } else {
        let stdout = std::io::stdout();
        let mut writer = stdout.lock();
        write_scores(&mut writer, &scores, &level_contribs, args.levels)
            .map_err(StringKernelError::IoError)?;
    }

    Ok(())
}

fn write_scores<W: Write>(
    writer: &mut W,
    scores: &[f64],
    level_contribs: &[Vec<f64>],
    levels: bool,
) -> std::io::Result<()> {
    writeln!(writer, "# Scores for {} sequences", scores.len())?;
    writeln!(
        writer,
        "# Format: sequence_index score{}",
        if levels { " level_contributions..." } else { "" }
    )?;
    for (j, score) in scores.iter().enumerate() {
        if levels {
            let parts: Vec<String> = level_contribs[j].iter().map(|v| format!("{v:.6}")).collect();
            writeln!(writer, "{} {:.6} {}", j, score, parts.join(" "))?;
        } else {
            writeln!(writer, "{} {:.6}", j, score)?;
        }
    }
    Ok(())
}

fn info_command(args: InfoArgs) -> Result<()> {
    if args.degree == 0 {
        return Err(StringKernelError::InvalidParameter(
            "degree must be positive".to_string(),
        ));
    }
    if args.length == 0 {
        return Err(StringKernelError::InvalidParameter(
            "length must be positive".to_string(),
        ));
    }
    let alphabet = Alphabet::new(args.alphabet.as_bytes())?;

    let weights = wd_weights(args.degree, args.max_mismatch, alphabet.size());
    let block = wd_block_weights(args.degree, args.length);

    println!("=== Weighted-Degree Kernel ===");
    println!("Degree:          {}", args.degree);
    println!("Mismatch budget: {}", args.max_mismatch);
    println!("Alphabet size:   {}", alphabet.size());
    println!("Sequence length: {}", args.length);

    println!("\nPer-level weights:");
    for (k, &w) in weights.iter().enumerate().take(args.degree) {
        println!("  w[{k}] = {w:.6}");
    }

    for m in 1..=args.max_mismatch {
        println!("\nWeights with {m} mismatch(es):");
        for k in 0..args.degree {
            println!("  w[{k}] = {:.6}", weights[k + m * args.degree]);
        }
    }

    println!("\nBlock weights (by match run length):");
    let n_show = block.len().min(10);
    for (r, &w) in block.iter().enumerate().take(n_show) {
        println!("  run {} = {w:.6}", r + 1);
    }
    if block.len() > n_show {
        println!("  ... ({} more)", block.len() - n_show);
    }

    println!("\nNormalization constant: {:.6}", block[args.length - 1]);

    Ok(())
}
