//! Command-line front end: build k-mer trees from GenBank files and query them.
#![forbid(unsafe_code)]

mod config;
mod ui;

use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use clap::{Args, Parser, Subcommand, ValueEnum};
use genebank::{
    admin::{self, StatsReport, VerifyReport},
    config::DEFAULT_BLOCK_SIZE,
    genbank::KmerReader,
    kmer, logging, BTree, GeneBankError, TreeOptions,
};
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, info, warn};

use config::{CliConfig, ConfigError};
use ui::{format_duration, Ui};

const DEFAULT_LOG_LEVEL: &str = "warn";
const PROGRESS_EVERY: u64 = 50_000;

#[derive(Parser, Debug)]
#[command(
    name = "genebank",
    version,
    about = "Build and query disk-resident k-mer count trees",
    disable_help_subcommand = true
)]
struct Cli {
    #[arg(
        long,
        global = true,
        value_name = "FILTER",
        help = "Log filter such as `info` or `genebank=trace` (RUST_LOG takes precedence)"
    )]
    log_level: Option<String>,

    #[arg(
        long,
        global = true,
        env = "GENEBANK_CONFIG",
        value_name = "PATH",
        help = "CLI config file (defaults to <config dir>/genebank/cli.toml)"
    )]
    config: Option<PathBuf>,

    #[arg(
        long,
        global = true,
        value_enum,
        default_value_t = OutputFormat::Text,
        help = "Output format for structured responses"
    )]
    format: OutputFormat,

    #[arg(long, global = true, help = "Hide progress spinners")]
    quiet: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(about = "Index every k-mer of a GenBank file into a new tree")]
    Create(CreateArgs),
    #[command(about = "Look up the k-mers listed in a query file")]
    Search(SearchArgs),
    #[command(about = "Write every stored k-mer with its count")]
    Dump {
        #[arg(value_name = "BTREE")]
        btree: PathBuf,
        #[arg(short = 'k', long, help = "k-mer length (inferred from the file name if omitted)")]
        kmer_len: Option<usize>,
        #[arg(long, value_name = "PATH", help = "Write to PATH instead of stdout")]
        output: Option<PathBuf>,
    },
    #[command(about = "Print tree geometry and content totals")]
    Stats {
        #[arg(value_name = "BTREE")]
        btree: PathBuf,
        #[arg(long, value_name = "NODES", help = "Page cache capacity (0 disables)")]
        cache: Option<usize>,
    },
    #[command(about = "Check the on-disk tree structure")]
    Verify {
        #[arg(value_name = "BTREE")]
        btree: PathBuf,
    },
}

#[derive(Args, Debug)]
struct CreateArgs {
    #[arg(value_name = "GBK")]
    gbk: PathBuf,
    #[arg(short = 'k', long, help = "k-mer length, 1 to 31")]
    kmer_len: usize,
    #[arg(long, help = "Tree order; 0 picks the largest order fitting a 4096-byte block")]
    order: Option<u32>,
    #[arg(long, value_name = "NODES", help = "Page cache capacity (0 disables)")]
    cache: Option<usize>,
    #[arg(long, help = "Also write <output>.dump")]
    dump: bool,
    #[arg(
        long,
        value_name = "PATH",
        help = "Tree file (defaults to <gbk>.btree.data.<k>.<order>)"
    )]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct SearchArgs {
    #[arg(value_name = "BTREE")]
    btree: PathBuf,
    #[arg(value_name = "QUERIES")]
    queries: PathBuf,
    #[arg(long, value_name = "NODES", help = "Page cache capacity (0 disables)")]
    cache: Option<usize>,
    #[arg(short = 'k', long, help = "k-mer length (inferred from the file name if omitted)")]
    kmer_len: Option<usize>,
    #[arg(long, value_name = "PATH", help = "Also write matches to PATH")]
    output: Option<PathBuf>,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
}

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Tree(#[from] GeneBankError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to serialize output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{path}: {source}")]
    File { path: PathBuf, source: io::Error },
    #[error("cannot infer the k-mer length from {path}; pass --kmer-len")]
    UnknownKmerLen { path: PathBuf },
    #[error("query {query:?} on line {line} has length {len}, expected {expected}")]
    QueryLength {
        line: usize,
        query: String,
        len: usize,
        expected: usize,
    },
}

type CliResult<T> = Result<T, CliError>;

#[derive(Debug, Serialize)]
struct CreateReport {
    output: String,
    kmer_len: usize,
    order: u32,
    cache_capacity: Option<usize>,
    sections: u64,
    kmers_read: u64,
    distinct_kmers: u64,
    node_count: u64,
    file_size_bytes: u64,
    dump: Option<String>,
    elapsed_ms: u128,
}

#[derive(Debug, Serialize)]
struct SearchHit {
    query: String,
    count: u32,
}

#[derive(Debug, Serialize)]
struct SearchReport {
    queries: u64,
    skipped: u64,
    hits: Vec<SearchHit>,
}

fn main() {
    if let Err(err) = run() {
        eprintln!("error: {err}");
        std::process::exit(1);
    }
}

fn run() -> CliResult<()> {
    let cli = Cli::parse();
    let config = CliConfig::load(cli.config.clone())?;
    let level = cli
        .log_level
        .as_deref()
        .or(config.log_level())
        .unwrap_or(DEFAULT_LOG_LEVEL);
    logging::init_logging(level)?;
    debug!(config = ?config.path(), "cli.config");
    let ui = Ui::new(cli.quiet || cli.format == OutputFormat::Json);

    match cli.command {
        Command::Create(args) => {
            let report = create(&args, &config, &ui)?;
            emit(cli.format, &report, || print_create_text(&report))?;
        }
        Command::Search(args) => {
            let report = search(&args, &config)?;
            emit(cli.format, &report, || {
                for hit in &report.hits {
                    println!("{}: {}", hit.query, hit.count);
                }
            })?;
        }
        Command::Dump {
            btree,
            kmer_len,
            output,
        } => {
            let k = resolve_kmer_len(&btree, kmer_len)?;
            let mut tree = BTree::open(&btree, None)?;
            let written = match output {
                Some(path) => {
                    let mut out = BufWriter::new(create_file(&path)?);
                    admin::dump(&mut tree, k, &mut out)?
                }
                None => admin::dump(&mut tree, k, &mut io::stdout().lock())?,
            };
            info!(records = written, "cli.dump");
        }
        Command::Stats { btree, cache } => {
            let cache = resolve_cache(cache, &config);
            let report = admin::stats(&btree, cache)?;
            emit(cli.format, &report, || print_stats_text(&report))?;
        }
        Command::Verify { btree } => {
            let report = admin::verify(&btree)?;
            emit(cli.format, &report, || print_verify_text(&report))?;
            if !report.success {
                std::process::exit(2);
            }
        }
    }
    Ok(())
}

fn create(args: &CreateArgs, config: &CliConfig, ui: &Ui) -> CliResult<CreateReport> {
    kmer::check_len(args.kmer_len)?;
    let order = match args.order.or(config.order()).unwrap_or(0) {
        0 => TreeOptions::optimal_order(DEFAULT_BLOCK_SIZE)?,
        order => order,
    };
    let mut options = TreeOptions::new(order);
    options.cache_capacity = resolve_cache(args.cache, config);

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_tree_path(&args.gbk, args.kmer_len, order));
    let input = BufReader::new(open_file(&args.gbk)?);
    let mut reader = KmerReader::new(input, args.kmer_len)?;
    let mut tree = BTree::create(&output, &options)?;
    info!(
        gbk = %args.gbk.display(),
        output = %output.display(),
        order,
        kmer_len = args.kmer_len,
        "cli.create"
    );

    let task = ui.task(format!("indexing {}", args.gbk.display()));
    let mut kmers_read = 0u64;
    for key in reader.by_ref() {
        tree.insert(key?)?;
        kmers_read += 1;
        if kmers_read % PROGRESS_EVERY == 0 {
            task.progress(format!("{kmers_read} k-mers"));
        }
    }
    tree.sync()?;
    let elapsed = task.finish();

    let dump = if args.dump {
        let mut name = output.clone().into_os_string();
        name.push(".dump");
        let path = PathBuf::from(name);
        let mut out = BufWriter::new(create_file(&path)?);
        admin::dump(&mut tree, args.kmer_len, &mut out)?;
        Some(path.display().to_string())
    } else {
        None
    };

    Ok(CreateReport {
        output: output.display().to_string(),
        kmer_len: args.kmer_len,
        order,
        cache_capacity: options.cache_capacity,
        sections: reader.sections(),
        kmers_read,
        distinct_kmers: tree.stats().inserts,
        node_count: tree.node_count(),
        file_size_bytes: tree.file_len(),
        dump,
        elapsed_ms: elapsed.as_millis(),
    })
}

fn search(args: &SearchArgs, config: &CliConfig) -> CliResult<SearchReport> {
    let k = resolve_kmer_len(&args.btree, args.kmer_len)?;
    let mut tree = BTree::open(&args.btree, resolve_cache(args.cache, config))?;
    let queries = BufReader::new(open_file(&args.queries)?);
    let mut results = match &args.output {
        Some(path) => Some(BufWriter::new(create_file(path)?)),
        None => None,
    };

    let mut report = SearchReport {
        queries: 0,
        skipped: 0,
        hits: Vec::new(),
    };
    for (idx, line) in queries.lines().enumerate() {
        let line = line.map_err(|source| CliError::File {
            path: args.queries.clone(),
            source,
        })?;
        let query = line.trim().to_ascii_lowercase();
        if query.is_empty() {
            continue;
        }
        if query.len() != k {
            return Err(CliError::QueryLength {
                line: idx + 1,
                len: query.len(),
                query,
                expected: k,
            });
        }
        let key = match kmer::encode(&query) {
            Ok(key) => key,
            Err(err) => {
                warn!(line = idx + 1, query = %query, error = %err, "cli.search.skip");
                report.skipped += 1;
                continue;
            }
        };
        report.queries += 1;
        let Some(count) = tree.get(key)? else {
            continue;
        };
        if let Some(out) = results.as_mut() {
            writeln!(out, "{query}: {count}").map_err(GeneBankError::from)?;
        }
        report.hits.push(SearchHit { query, count });
    }
    if let Some(mut out) = results {
        out.flush().map_err(GeneBankError::from)?;
    }
    if let Some(stats) = tree.cache_stats() {
        debug!(
            accesses = stats.accesses,
            hits = stats.hits,
            hit_rate = stats.hit_rate,
            "cli.search.cache"
        );
    }
    Ok(report)
}

fn resolve_cache(flag: Option<usize>, config: &CliConfig) -> Option<usize> {
    flag.or(config.cache_capacity()).filter(|&n| n > 0)
}

/// `<gbk>.btree.data.<k>.<order>`
fn default_tree_path(gbk: &Path, kmer_len: usize, order: u32) -> PathBuf {
    let mut name = gbk.as_os_str().to_owned();
    name.push(format!(".btree.data.{kmer_len}.{order}"));
    PathBuf::from(name)
}

/// Explicit length, else the second-to-last dot component of the file name.
fn resolve_kmer_len(path: &Path, explicit: Option<usize>) -> CliResult<usize> {
    let k = match explicit {
        Some(k) => k,
        None => infer_kmer_len(path).ok_or_else(|| CliError::UnknownKmerLen {
            path: path.to_path_buf(),
        })?,
    };
    kmer::check_len(k)?;
    Ok(k)
}

fn infer_kmer_len(path: &Path) -> Option<usize> {
    let name = path.file_name()?.to_str()?;
    let mut parts = name.rsplit('.');
    parts.next()?;
    parts.next()?.parse().ok()
}

fn open_file(path: &Path) -> CliResult<File> {
    File::open(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })
}

fn create_file(path: &Path) -> CliResult<File> {
    File::create(path).map_err(|source| CliError::File {
        path: path.to_path_buf(),
        source,
    })
}

fn emit<T, F>(format: OutputFormat, value: &T, printer: F) -> CliResult<()>
where
    T: Serialize,
    F: FnOnce(),
{
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value)?;
            println!("{json}");
        }
        OutputFormat::Text => printer(),
    }
    Ok(())
}

fn print_create_text(report: &CreateReport) {
    println!("Created {}", report.output);
    println!(
        "  kmer_len={} order={} cache={}",
        report.kmer_len,
        report.order,
        report
            .cache_capacity
            .map_or_else(|| "off".to_string(), |n| n.to_string())
    );
    println!(
        "  sections={} kmers={} distinct={} nodes={} size={}",
        report.sections,
        report.kmers_read,
        report.distinct_kmers,
        report.node_count,
        report.file_size_bytes
    );
    if let Some(dump) = &report.dump {
        println!("  dump={dump}");
    }
    println!(
        "  elapsed={}",
        format_duration(std::time::Duration::from_millis(report.elapsed_ms as u64))
    );
}

fn print_stats_text(report: &StatsReport) {
    println!("Tree: {}", report.path);
    println!(
        "  order={} min_degree={} record_len={} root_offset={}",
        report.order, report.min_degree, report.record_len, report.root_offset
    );
    println!(
        "  nodes={} height={} size={}",
        report.node_count, report.height, report.file_size_bytes
    );
    println!(
        "  distinct_keys={} total_occurrences={}",
        report.distinct_keys, report.total_occurrences
    );
    println!(
        "  node_reads={} node_writes={}",
        report.io.node_reads, report.io.node_writes
    );
    if let Some(cache) = &report.cache {
        println!(
            "  cache capacity={} accesses={} hits={} hit_rate={:.3}",
            cache.capacity, cache.accesses, cache.hits, cache.hit_rate
        );
    }
}

fn print_verify_text(report: &VerifyReport) {
    println!(
        "Verify: {}",
        if report.success { "ok" } else { "FAILED" }
    );
    println!(
        "  records={} reached={} leaves={} keys={} occurrences={}",
        report.counts.records_in_file,
        report.counts.nodes_reached,
        report.counts.leaves,
        report.counts.keys,
        report.counts.occurrences
    );
    for finding in &report.findings {
        println!("  - [{:?}] {}", finding.severity, finding.message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn infers_kmer_len_from_tree_name() {
        assert_eq!(infer_kmer_len(Path::new("x/test.gbk.btree.data.6.205")), Some(6));
        assert_eq!(infer_kmer_len(Path::new("tree.bin")), None);
        assert_eq!(infer_kmer_len(Path::new("tree")), None);
    }

    #[test]
    fn default_path_appends_suffix() {
        assert_eq!(
            default_tree_path(Path::new("data/a.gbk"), 4, 128),
            PathBuf::from("data/a.gbk.btree.data.4.128")
        );
    }
}
