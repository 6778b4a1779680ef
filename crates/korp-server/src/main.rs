use std::env;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use axum::middleware;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{Level, info};
use tracing_subscriber::EnvFilter;

use korp_corpus::{Corpus, LoadMode};
use korp_mwe::OverflowLog;
use korp_server::{AppState, RateLimiter, rate_limit, router};
use korp_types::{Mode, SentenceElement};

const DEFAULT_PORT: u16 = 8080;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_RATE_LIMIT_RPS: u32 = 5;
const DEFAULT_RATE_LIMIT_BURST: u32 = 10;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = load_config();

    let overflow = config
        .overflow_path
        .as_ref()
        .map(|path| Arc::new(OverflowLog::new(path)));
    if let Some(log) = overflow.as_ref() {
        info!("logging overflowed sentences to {}", log.path().display());
    }

    if let Some(extract) = config.extract.as_ref() {
        return run_extract(extract, config.mode, config.corpus_mode, overflow.as_deref());
    }

    info!("binding to {}:{}", config.host, config.port);
    info!(
        "rate limit: {} req/s (burst {})",
        config.rate_limit_rps, config.rate_limit_burst
    );

    let state = AppState { overflow };
    let limiter = RateLimiter::new(config.rate_limit_rps, config.rate_limit_burst);
    let app = router(state)
        .layer(middleware::from_fn_with_state(limiter, rate_limit::enforce))
        .layer(TraceLayer::new_for_http());
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("invalid listen address")?;
    let listener = TcpListener::bind(addr).await?;

    axum::serve(listener, app).await?;
    Ok(())
}

/// Stream a corpus export through the resolver, one output line per
/// sentence. Sentences the resolver declines (structural markup, cutoff
/// overflow) pass through as their surface forms.
fn run_extract(
    corpus_path: &Path,
    mode: Mode,
    load_mode: LoadMode,
    overflow: Option<&OverflowLog>,
) -> anyhow::Result<()> {
    info!(
        "extracting {} annotations from {}",
        mode,
        corpus_path.display()
    );
    let corpus = Corpus::load_with_mode(corpus_path, load_mode)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    let mut resolved = 0u64;
    let mut passed_through = 0u64;
    for sentence in corpus.sentences() {
        let sentence = sentence?;
        match korp_mwe::resolve(&sentence, mode, overflow) {
            Some(values) => {
                writeln!(out, "{}", values.join("\t"))?;
                resolved += 1;
            }
            None => {
                let surfaces: Vec<&str> = sentence
                    .iter()
                    .filter_map(|element| match element {
                        SentenceElement::Word(word) => Some(word.surface()),
                        SentenceElement::Other(_) => None,
                    })
                    .collect();
                writeln!(out, "{}", surfaces.join("\t"))?;
                passed_through += 1;
            }
        }
    }
    info!(
        "done: {} sentences resolved, {} passed through",
        resolved, passed_through
    );
    Ok(())
}

#[derive(Debug, Clone)]
struct Config {
    host: String,
    port: u16,
    mode: Mode,
    corpus_mode: LoadMode,
    overflow_path: Option<PathBuf>,
    extract: Option<PathBuf>,
    rate_limit_rps: u32,
    rate_limit_burst: u32,
}

fn load_config() -> Config {
    let mut cli_extract: Option<PathBuf> = None;
    let mut cli_mode: Option<Mode> = None;
    let mut cli_corpus_mode: Option<LoadMode> = None;
    let mut args = env::args().skip(1).peekable();
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--extract" => {
                if let Some(path) = args.next() {
                    cli_extract = Some(PathBuf::from(path));
                }
            }
            _ => {
                if let Some(path) = arg.strip_prefix("--extract=") {
                    cli_extract = Some(PathBuf::from(path));
                } else if let Some(mode) = arg.strip_prefix("--mode=") {
                    cli_mode = Mode::from_name(mode);
                } else if let Some(mode) = arg.strip_prefix("--corpus-mode=") {
                    cli_corpus_mode = parse_load_mode(mode);
                }
            }
        }
    }

    let host = env::var("HOST").unwrap_or_else(|_| DEFAULT_HOST.to_string());
    let port = env::var("PORT")
        .ok()
        .and_then(|p| p.parse::<u16>().ok())
        .unwrap_or(DEFAULT_PORT);
    let mode = cli_mode
        .or_else(|| env::var("MWE_MODE").ok().as_deref().and_then(Mode::from_name))
        .unwrap_or(Mode::Lex);
    let corpus_mode = cli_corpus_mode
        .or_else(|| {
            env::var("CORPUS_LOAD_MODE")
                .ok()
                .as_deref()
                .and_then(parse_load_mode)
        })
        .unwrap_or(LoadMode::Mmap);
    let overflow_path = env::var("OVERFLOW_LOG")
        .ok()
        .filter(|v| !v.is_empty())
        .map(PathBuf::from);
    let rate_limit_rps = env::var("RATE_LIMIT_RPS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RATE_LIMIT_RPS);
    let rate_limit_burst = env::var("RATE_LIMIT_BURST")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_RATE_LIMIT_BURST);

    Config {
        host,
        port,
        mode,
        corpus_mode,
        overflow_path,
        extract: cli_extract,
        rate_limit_rps,
        rate_limit_burst,
    }
}

fn parse_load_mode(raw: &str) -> Option<LoadMode> {
    match raw.to_ascii_lowercase().as_str() {
        "mmap" => Some(LoadMode::Mmap),
        "owned" => Some(LoadMode::Owned),
        _ => None,
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info"))
        .unwrap_or_else(|_| EnvFilter::new("info"));
    let max_level = env_filter
        .max_level_hint()
        .and_then(|hint| hint.into_level())
        .unwrap_or(Level::INFO);
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_level(true)
        .with_max_level(max_level)
        .init();
}
