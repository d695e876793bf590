//! # storerpc CLI Entry Point
//!
//! Main binary for storerpc. Serves the demo router or calls a procedure
//! through the reactive store client.
//!
//! ## Usage
//!
//! ```bash
//! # Serve the demo router under /rpc
//! storerpc serve -b 127.0.0.1:8080
//!
//! # Call a procedure (one JSON line per observed state)
//! storerpc call http://127.0.0.1:8080/rpc system.echo -a '[1, "a"]'
//!
//! # Go through the deferred mode and trigger once
//! storerpc call http://127.0.0.1:8080/rpc system.ping --later
//! ```
//!
//! ## URL Format
//!
//! All URLs must include the `http://` or `https://` prefix:
//! - ✅ `http://127.0.0.1:8080/rpc`
//! - ❌ `127.0.0.1:8080/rpc`

use anyhow::Result;
use argh::FromArgs;
use std::net::SocketAddr;

use storerpc_cli::{call, demo};
use storerpc_server::{HandlerOptions, HttpServer, RpcHandler};

/// Validates that a URL string starts with http:// or https://
fn validate_http_url(url: &str, description: &str) -> Result<()> {
    if url.starts_with("http://") || url.starts_with("https://") {
        Ok(())
    } else {
        Err(anyhow::anyhow!(
            "Invalid {}: '{}' must start with http:// or https://",
            description,
            url
        ))
    }
}

#[derive(FromArgs)]
/// storerpc - remote procedures as reactive stores
struct Cli {
    #[argh(subcommand)]
    command: Commands,
}

#[derive(FromArgs)]
#[argh(subcommand)]
enum Commands {
    Serve(ServeArgs),
    Call(CallArgs),
}

/// Arguments for serving the demo router.
///
/// # Example
///
/// ```bash
/// storerpc serve -b 0.0.0.0:8080 --prefix /api/rpc
/// ```
#[derive(FromArgs)]
#[argh(subcommand, name = "serve")]
/// serve the demo system.* procedures over HTTP
struct ServeArgs {
    /// address to bind the HTTP server to
    #[argh(option, short = 'b', default = "\"127.0.0.1:8080\".into()")]
    bind: String,

    /// URL path prefix the procedures are served under
    #[argh(option, long = "prefix", default = "\"/rpc\".into()")]
    prefix: String,

    /// maximum request body size in bytes
    #[argh(
        option,
        long = "max-body-bytes",
        default = "storerpc_server::handler::DEFAULT_MAX_BODY_BYTES"
    )]
    max_body_bytes: usize,
}

/// Arguments for calling a single procedure.
///
/// Every state the call's store goes through is printed to stdout as one
/// JSON line (`{"loading":..,"success":..,"error":..,"response":..}`), so
/// the output pipes cleanly into `jq`. The process exits non-zero when the
/// call settles as a failure.
#[derive(FromArgs)]
#[argh(subcommand, name = "call")]
/// call a procedure and print each observed state
struct CallArgs {
    /// base URL of the RPC endpoint (e.g. http://127.0.0.1:8080/rpc)
    #[argh(positional)]
    url: String,

    /// dotted procedure path (e.g. user.get)
    #[argh(positional)]
    path: String,

    /// JSON arguments; an array is spread into positional arguments
    #[argh(option, short = 'a', long = "args", default = "\"[]\".into()")]
    args: String,

    /// call through the deferred mode and trigger it once
    #[argh(switch, long = "later")]
    later: bool,

    /// extra request header as "name: value" (repeatable)
    #[argh(option, short = 'H', long = "header")]
    headers: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli: Cli = argh::from_env();

    // call: keep stdout clean for piping
    if !matches!(cli.command, Commands::Call(_)) {
        // Set default log level to INFO, but allow RUST_LOG env var to override
        let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        tracing_subscriber::fmt().with_env_filter(env_filter).init();
    }

    match cli.command {
        Commands::Serve(args) => run_serve(args).await,
        Commands::Call(args) => {
            let failed = run_call(args).await?;
            if failed {
                std::process::exit(1);
            }
            Ok(())
        }
    }
}

async fn run_serve(args: ServeArgs) -> Result<()> {
    tracing::info!("Starting storerpc demo server");
    tracing::info!("Binding to: {} (prefix {})", args.bind, args.prefix);

    let options = HandlerOptions::<()>::new(args.prefix).max_body_bytes(args.max_body_bytes);
    let hook = RpcHandler::new(options).hook(demo::router());

    let addr: SocketAddr = args
        .bind
        .parse()
        .map_err(|e| anyhow::anyhow!("Invalid bind address {}: {}", args.bind, e))?;
    HttpServer::new(hook).run(addr).await?;

    Ok(())
}

/// Executes the `call` subcommand; returns whether the call failed.
async fn run_call(args: CallArgs) -> Result<bool> {
    validate_http_url(&args.url, "server URL")?;

    let request = call::CallRequest {
        url: args.url,
        path: args.path,
        args: call::parse_args(&args.args)?,
        later: args.later,
        headers: args
            .headers
            .iter()
            .map(String::as_str)
            .map(call::parse_header)
            .collect::<Result<_>>()?,
    };

    let mut stdout = std::io::stdout().lock();
    let settled = call::run(request, &mut stdout).await?;
    Ok(settled.is_failure())
}
