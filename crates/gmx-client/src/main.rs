//! gmxc: inspect values published by gmx-instrumented processes.
//!
//! - no `-p`/`-n`/`--port`: list every discoverable process with its arguments
//! - `-n NAME`: resolve a process by program name (fails if ambiguous)
//! - `-p PID` or `--port PORT`: target directly
//!
//! Positional arguments are regex patterns selecting which keys to print.

use std::io::Write;
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;
use std::process::ExitCode;
use std::time::Duration;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use gmx_client::discovery::{self, Process};
use gmx_client::poll::{compile_patterns, PollOptions, Poller};
use gmx_core::endpoint::default_socket_dir;
use gmx_core::error::Result;
use gmx_core::protocol::PROTOCOL_VERSION;
use gmx_core::{Endpoint, EndpointName, Value};

#[derive(Debug, Parser)]
#[command(name = "gmxc", version, about = "Inspect values published by gmx-instrumented processes")]
struct Cli {
    /// Delay between updates, in milliseconds
    #[arg(short = 'd', long = "delay-ms", default_value_t = 0)]
    delay_ms: u64,

    /// Keep printing updates for this many milliseconds
    #[arg(short = 'D', long = "duration-ms", default_value_t = 0)]
    duration_ms: u64,

    /// Keep printing updates until interrupted
    #[arg(short = 'f', long, conflicts_with = "duration_ms")]
    follow: bool,

    /// Process to inspect
    #[arg(short = 'p', long, conflicts_with = "name")]
    pid: Option<u32>,

    /// Program name of the process to inspect
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Loopback TCP port printed by a process without unix sockets
    #[arg(long, conflicts_with_all = ["pid", "name"])]
    port: Option<u16>,

    /// Directory holding gmx sockets (default: system temp dir)
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Regex patterns selecting keys to print (default: all)
    patterns: Vec<String>,
}

#[tokio::main]
async fn main() -> ExitCode {
    init_tracing();
    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("gmxc: {e}");
            ExitCode::FAILURE
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

async fn run(cli: Cli) -> Result<()> {
    let patterns = compile_patterns(&cli.patterns)?;
    let dir = cli.dir.clone().unwrap_or_else(default_socket_dir);
    let mut stdout = std::io::stdout().lock();

    let endpoint = if let Some(port) = cli.port {
        Endpoint::Tcp(SocketAddr::from((Ipv4Addr::LOCALHOST, port)))
    } else if let Some(pid) = cli.pid {
        Endpoint::unix_in(&dir, EndpointName::new(pid, PROTOCOL_VERSION))
    } else if let Some(name) = cli.name.as_deref() {
        let resolution = discovery::find_by_name(&dir, name).await?;
        if let discovery::Resolution::Ambiguous(candidates) = &resolution {
            for p in candidates {
                writeln!(stdout, "candidate {}\t{}", p.pid(), args_value(p))?;
            }
        }
        let p = resolution.into_result(name)?;
        let argv0 = p.args.first().map(String::as_str).unwrap_or_default();
        writeln!(stdout, "Using {argv0}\t{}", args_value(&p))?;
        p.endpoint
    } else {
        discovery::list(&dir, &mut stdout).await?;
        return Ok(());
    };

    let opts = PollOptions {
        delay: Duration::from_millis(cli.delay_ms),
        duration: (!cli.follow).then(|| Duration::from_millis(cli.duration_ms)),
    };
    let mut poller = Poller::connect(&endpoint, &patterns, opts).await?;
    poller.run(&mut stdout).await?;
    Ok(())
}

fn args_value(p: &Process) -> Value {
    Value::from(p.args.clone())
}
