use anyhow::{bail, Context as _};
use clap::Parser;
use manifest_probe::{
    circuit_breaker::Context, init_json_tracing, init_tracing, ProbeConfig, Prober,
};
use std::path::PathBuf;
use std::process;

/// Analyze streaming manifests (DASH MPD and HLS M3U8)
#[derive(Debug, Parser)]
#[command(name = "manifest-probe", version)]
struct Cli {
    /// Manifest URL
    url: String,

    /// YAML configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Proxy URL (e.g., http://proxy:8080)
    #[arg(long)]
    proxy: Option<String>,

    /// Custom User-Agent string
    #[arg(long)]
    ua: Option<String>,

    /// Timeout in seconds
    #[arg(long)]
    timeout: Option<u64>,

    /// Extra request header as "Name: value" (repeatable)
    #[arg(long = "header", short = 'H')]
    headers: Vec<String>,

    /// Disable gzip/deflate compression
    #[arg(long)]
    no_compression: bool,

    /// Disable browser-like headers
    #[arg(long)]
    no_camouflage: bool,

    /// Maximum number of retries
    #[arg(long)]
    max_retries: Option<u32>,

    /// Disable the circuit breaker
    #[arg(long)]
    no_circuit_breaker: bool,

    /// Emit logs as JSON
    #[arg(long)]
    log_json: bool,
}

impl Cli {
    /// Load the config file (if any) and apply flag overrides
    fn probe_config(&self) -> anyhow::Result<ProbeConfig> {
        let mut config = match &self.config {
            Some(path) => ProbeConfig::from_file(path)
                .with_context(|| format!("failed to load configuration from {}", path.display()))?,
            None => ProbeConfig::default(),
        };

        if let Some(proxy) = &self.proxy {
            config.http.proxy_url = Some(proxy.clone());
        }
        if let Some(ua) = &self.ua {
            config.http.user_agent = Some(ua.clone());
        }
        if let Some(timeout) = self.timeout {
            config.http.timeout_secs = timeout;
        }
        for header in &self.headers {
            let Some((name, value)) = header.split_once(':') else {
                bail!("invalid header '{}', expected \"Name: value\"", header);
            };
            config
                .http
                .custom_headers
                .insert(name.trim().to_string(), value.trim().to_string());
        }
        config.http.disable_compression |= self.no_compression;
        config.http.disable_camouflage |= self.no_camouflage;

        if let Some(max_retries) = self.max_retries {
            config.retry.max_retries = max_retries;
        }
        if self.no_circuit_breaker {
            config.circuit_breaker = None;
        }

        Ok(config)
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let prober = Prober::new(cli.probe_config()?)?;

    let ctx = Context::new();
    let cancel = ctx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            cancel.cancel();
        }
    });

    let report = prober.report(&ctx, &cli.url).await?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    if cli.log_json {
        init_json_tracing();
    } else {
        init_tracing();
    }

    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        process::exit(1);
    }
}
