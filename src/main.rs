// src/main.rs
use clap::Parser;
use rayon::prelude::*;
use split_miner_rs::miner::hash::CandidateBuffer;
use split_miner_rs::monitor::ProcessListProbe;
use split_miner_rs::types::{HASH_SIZE, target_with_leading_zero_bits};
use split_miner_rs::utils::init_bench_logging;
use split_miner_rs::{self, *};
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::runtime::Runtime;

/// Nonces a benchmark thread hashes between clock checks
const BENCH_CHUNK: u64 = 4_096;

/// Main entry point for the split miner
///
/// # Returns
/// - `Ok(())` on successful execution
/// - `Err(MinerError)` if any operation fails
///
/// # Flow
/// 1. Parses command line arguments
/// 2. Delegates to appropriate subcommand handler
/// 3. Propagates any errors upward
fn main() -> Result<(), MinerError> {
    let cli = cli::Commands::parse();

    match cli.action {
        cli::Action::Start(opts) => start_mining(opts),
        cli::Action::Benchmark(opts) => run_benchmark(opts),
        cli::Action::Config(opts) => generate_config(opts),
    }
}

/// Starts the mining operation with given configuration options
///
/// # Arguments
/// * `opts` - Command line options for mining operation
///
/// # Operations
/// 1. Loads configuration and applies CLI overrides
/// 2. Initializes logging
/// 3. Connects to the pool, or builds offline work
/// 4. Starts the miner and the stats reporter
/// 5. Hands control to the console (or waits for Ctrl-C when headless)
fn start_mining(opts: cli::StartOptions) -> Result<(), MinerError> {
    let mut config = config::load(&opts.config)?;
    // Apply CLI overrides
    if let Some(threads) = opts.threads {
        config.performance.threads = threads;
    }
    if let Some(split) = opts.split {
        config.advanced.split_strategy = split;
    }
    if let Some(source) = opts.hashrate_source {
        config.advanced.hashrate_source = source;
    }

    utils::init_logging(&config.logging.level);

    // Runtime setup
    let rt = Runtime::new()?;
    let network_cancel = CancelToken::new();

    let (source, submitter): (Arc<dyn JobSource>, Arc<dyn ShareSubmitter>) = if opts.offline {
        let header: [u8; HASH_SIZE] = rand::random();
        log::info!(
            "Offline mode: header {}, {} leading zero bits",
            hex::encode(header),
            opts.offline_difficulty
        );
        let source = LocalJobSource::new(
            header,
            target_with_leading_zero_bits(opts.offline_difficulty),
            config.performance.batch_size,
        );
        let source: Arc<dyn JobSource> = Arc::new(source);
        let submitter: Arc<dyn ShareSubmitter> = Arc::new(LogSubmitter);
        (source, submitter)
    } else {
        let pool = Arc::new(PoolClient::new(
            config.pool_config(),
            config.performance.batch_size,
        ));
        let work = pool.work();
        let cancel = network_cancel.clone();
        rt.spawn(async move {
            if let Err(e) = pool.run(cancel).await {
                log::error!("Pool client stopped: {}", e);
            }
        });
        let source: Arc<dyn JobSource> = work.clone();
        let submitter: Arc<dyn ShareSubmitter> = work;
        (source, submitter)
    };

    let probe = Arc::new(ProcessListProbe::new(&config.performance.game_processes));
    let miner = Miner::builder(config, source, submitter)
        .foreground_probe(probe)
        .build();

    StatsReporter::new().start_reporting(miner.subscribe())?;
    miner.start()?;

    if opts.headless {
        rt.block_on(tokio::signal::ctrl_c())?;
        log::info!("Interrupted, shutting down");
        miner.stop();
    } else {
        let stdin = io::stdin();
        cli::Console::new(miner.clone()).run(stdin.lock(), &mut io::stdout())?;
    }

    network_cancel.cancel();
    rt.shutdown_timeout(Duration::from_secs(2));
    log::info!("Split miner stopped");
    Ok(())
}

/// Runs the digest benchmark
///
/// # Arguments
/// * `opts` - Benchmark configuration options
///
/// # Operations
/// 1. Initializes benchmark-specific logging
/// 2. Builds a rayon pool with the requested thread count
/// 3. Hashes consecutive nonce chunks on every thread until the deadline
/// 4. Reports total hashes and average hashrate
fn run_benchmark(opts: cli::BenchmarkOptions) -> Result<(), MinerError> {
    init_bench_logging();

    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(opts.threads.max(1))
        .thread_name(|i| format!("bench-{}", i))
        .build()
        .map_err(|e| MinerError::TaskError(format!("Failed to build thread pool: {}", e)))?;

    let hasher = MixedSha256::new();
    let next_nonce = AtomicU64::new(0);
    let total = AtomicU64::new(0);

    log::info!(
        "Starting {} benchmark for {} seconds on {} threads",
        hasher.name(),
        opts.duration,
        opts.threads
    );

    let start_time = Instant::now();
    let deadline = start_time + Duration::from_secs(opts.duration);

    pool.install(|| {
        (0..opts.threads.max(1)).into_par_iter().for_each(|thread| {
            let mut candidate = CandidateBuffer::new(&[0u8; HASH_SIZE]);
            let mut last_log = Instant::now();
            let mut hashes = 0u64;

            while Instant::now() < deadline {
                let base = next_nonce.fetch_add(BENCH_CHUNK, Ordering::Relaxed);
                for nonce in base..base + BENCH_CHUNK {
                    candidate.set_nonce(nonce);
                    std::hint::black_box(hasher.digest(candidate.as_bytes()));
                }
                total.fetch_add(BENCH_CHUNK, Ordering::Relaxed);
                hashes += BENCH_CHUNK;

                // Log progress every second
                if last_log.elapsed().as_secs() >= 1 {
                    log::debug!(
                        "Thread {}: {:.1} H/s",
                        thread,
                        hashes as f64 / last_log.elapsed().as_secs_f64()
                    );
                    hashes = 0;
                    last_log = Instant::now();
                }
            }
        });
    });

    // Report final results
    let elapsed = start_time.elapsed().as_secs_f64();
    let total = total.load(Ordering::Relaxed);
    log::info!("Benchmark results:");
    log::info!("Total hashes: {}", total);
    log::info!("Average hashrate: {:.2} H/s", total as f64 / elapsed.max(f64::EPSILON));
    log::logger().flush(); // Ensure final results appear

    Ok(())
}

/// Generates configuration template file
///
/// # Arguments
/// * `opts` - Configuration generation options
///
/// # Operations
/// 1. Refuses to overwrite an existing file unless forced
/// 2. Writes the template to the specified output file
fn generate_config(opts: cli::ConfigOptions) -> Result<(), MinerError> {
    if opts.output.exists() && !opts.force {
        return Err(MinerError::ConfigError(format!(
            "{} already exists (use --force to overwrite)",
            opts.output.display()
        )));
    }

    std::fs::write(&opts.output, config::generate_template())?;
    println!("Configuration template written to {}", opts.output.display());
    Ok(())
}
