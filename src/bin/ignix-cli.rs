/*!
 * Ignix Command-Line Client
 *
 * Sends a single command to a RESP server and prints the reply the way
 * redis-cli does. Exits with a non-zero status if the command could not be
 * delivered or the server answered with an error.
 */

use anyhow::{Context, Result};
use bytes::Bytes;
use clap::Parser;
use ignix_client::{Command, Driver, DriverConfig, DEFAULT_HOST, DEFAULT_PORT};
use std::time::Duration;

/// Ignix CLI
#[derive(Parser, Debug)]
#[command(name = "ignix-cli")]
#[command(about = "Send one command to a RESP server and print the reply")]
#[command(version)]
struct Args {
    /// Server host
    #[arg(short = 'H', long, default_value = DEFAULT_HOST)]
    host: String,

    /// Server port
    #[arg(short, long, default_value_t = DEFAULT_PORT)]
    port: u16,

    /// Read timeout in milliseconds
    #[arg(short, long, default_value_t = 2000)]
    timeout_ms: u64,

    /// Reject malformed integer lines instead of reading them leniently
    #[arg(long)]
    strict: bool,

    /// Command name followed by its arguments, e.g. `SET key value`
    #[arg(required = true, num_args = 1..)]
    command: Vec<String>,
}

fn main() -> Result<()> {
    // Initialize logging - respects RUST_LOG environment variable
    // Example: RUST_LOG=debug ignix-cli PING
    env_logger::init();

    let args = Args::parse();

    let config = DriverConfig::builder()
        .host(&args.host)
        .port(args.port)
        .read_timeout(Duration::from_millis(args.timeout_ms))
        .strict_integers(args.strict)
        .build();

    let mut driver = Driver::tcp_with_config(config)?;
    driver
        .open_default()
        .with_context(|| format!("could not connect to {}:{}", args.host, args.port))?;

    let command = Command::new(args.command.into_iter().map(Bytes::from))?;
    let reply = driver.request(&command)?;
    println!("{}", reply);
    driver.close();

    if reply.is_error() {
        std::process::exit(1);
    }
    Ok(())
}
