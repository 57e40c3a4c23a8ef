use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Command-line arguments; every flag also reads from the environment.
#[derive(Debug, Parser)]
#[command(name = "lantern-server", version, about)]
pub struct CliArgs {
    /// Address to bind, `host:port`.
    #[arg(long, env = "LANTERN_ADDR", default_value = "127.0.0.1:8080")]
    pub addr: String,

    /// Path of the durable board pool file.
    #[arg(long, env = "LANTERN_POOL_PATH", default_value = "lantern-pool.jsonl")]
    pub pool_path: PathBuf,

    /// Number of background generation workers. Defaults to the CPU count.
    #[arg(long, env = "LANTERN_NUM_WORKERS")]
    pub num_workers: Option<usize>,

    /// Standing inventory each pool key is topped back up to after a fetch.
    #[arg(long, env = "LANTERN_BACKLOG_TARGET", default_value_t = 5)]
    pub backlog_target: usize,

    /// Generation jobs each worker queue can hold before dispatch drops.
    #[arg(long, env = "LANTERN_JOB_BUFFER", default_value_t = 32)]
    pub job_buffer: usize,

    /// Largest accepted board width or height.
    #[arg(long, env = "LANTERN_MAX_BOARD_DIM", default_value_t = 20)]
    pub max_board_dim: u32,

    /// How long a store operation may wait for the pool lock, in
    /// milliseconds.
    #[arg(long, env = "LANTERN_LOCK_TIMEOUT_MS", default_value_t = 5_000)]
    pub lock_timeout_ms: u64,

    /// Grace period per worker while shutting down, in seconds.
    #[arg(long, env = "LANTERN_SHUTDOWN_TIMEOUT_SECS", default_value_t = 3)]
    pub shutdown_timeout_secs: u64,

    /// Comma-separated SHA-256 digests (hex) of accepted bearer tokens.
    /// Leaving the list empty disables authentication.
    #[arg(long, env = "LANTERN_TOKEN_DIGESTS", value_delimiter = ',', num_args = 0..)]
    pub token_digests: Vec<String>,
}

/// Validated runtime configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub addr: String,
    pub pool_path: PathBuf,
    pub num_workers: usize,
    pub backlog_target: usize,
    pub job_buffer: usize,
    pub max_board_dim: u32,
    pub lock_timeout: Duration,
    pub shutdown_timeout: Duration,
    pub token_digests: Vec<String>,
}

impl TryFrom<CliArgs> for ServerConfig {
    type Error = anyhow::Error;

    fn try_from(args: CliArgs) -> Result<Self, Self::Error> {
        let num_workers = args.num_workers.unwrap_or_else(num_cpus::get);
        anyhow::ensure!(num_workers > 0, "num_workers must be at least 1");
        anyhow::ensure!(args.backlog_target > 0, "backlog_target must be at least 1");
        anyhow::ensure!(
            args.job_buffer >= args.backlog_target,
            "job_buffer must hold at least one full replenishment burst ({})",
            args.backlog_target
        );
        anyhow::ensure!(args.max_board_dim > 0, "max_board_dim must be at least 1");

        Ok(Self {
            addr: args.addr,
            pool_path: args.pool_path,
            num_workers,
            backlog_target: args.backlog_target,
            job_buffer: args.job_buffer,
            max_board_dim: args.max_board_dim,
            lock_timeout: Duration::from_millis(args.lock_timeout_ms),
            shutdown_timeout: Duration::from_secs(args.shutdown_timeout_secs),
            token_digests: args.token_digests,
        })
    }
}
