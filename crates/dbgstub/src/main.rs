use std::io::{self, Read, Write};
use std::net::TcpListener;
use std::process;

use clap::{Parser, Subcommand};
use dbgstub_core::arch::{Architecture, I386, I386_REGISTER_COUNT, MOCK_REGISTER_COUNT, Mock};
use dbgstub_core::error::TransportError;
use dbgstub_core::types::{DebugState, Signal};
use dbgstub_core::{IoTransport, RamTarget, Target, Transport};
use dbgstub_protocol::{PacketError, Session, SessionEnd};
use dbgstub_utils::{LogLevel, debug, info, init_logging_with_level, warn};

mod config;

use config::{ArchKind, TargetConfig};

type HostResult<T> = Result<T, Box<dyn std::error::Error>>;

/// A GDB remote stub serving a RAM-backed target.
#[derive(Parser, Debug)]
#[command(name = "dbgstub")]
#[command(version)]
#[command(about = "A minimal GDB remote stub serving a RAM-backed target over TCP or stdio", long_about = None)]
struct Cli
{
    /// Log level (overrides RUST_LOG)
    #[arg(long, global = true, env = "DBGSTUB_LOG_LEVEL")]
    log_level: Option<LogLevel>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands
{
    /// Accept debugger connections over TCP, one at a time
    Serve
    {
        /// Address to listen on
        #[arg(long, default_value = "127.0.0.1:1234", env = "DBGSTUB_LISTEN")]
        listen: String,

        #[command(flatten)]
        target: TargetConfig,
    },
    /// Talk to a single debugger over stdin/stdout
    ///
    /// Use from GDB with `target remote | dbgstub stdio`.
    Stdio
    {
        #[command(flatten)]
        target: TargetConfig,
    },
}

/// What happened over one connection
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct ConnectionSummary
{
    resumes: usize,
    steps: usize,
}

fn main()
{
    let cli = Cli::parse();

    let _guard = match init_logging_with_level(cli.log_level) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            process::exit(1);
        }
    };

    if let Err(e) = run_command(cli.command) {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}

fn run_command(command: Commands) -> HostResult<()>
{
    match command {
        Commands::Serve { listen, target } => serve_tcp(&listen, &target),
        Commands::Stdio { target } => {
            info!(arch = ?target.arch, "serving over stdio");
            let transport = IoTransport::new(io::stdin().lock(), io::stdout().lock());
            let summary = serve_connection(transport, &target)?;
            info!(resumes = summary.resumes, steps = summary.steps, "stdio session closed");
            Ok(())
        }
    }
}

fn serve_tcp(listen: &str, target: &TargetConfig) -> HostResult<()>
{
    let listener = TcpListener::bind(listen)?;
    info!(address = %listener.local_addr()?, arch = ?target.arch, "listening for debugger");

    for stream in listener.incoming() {
        let stream = match stream {
            Ok(stream) => stream,
            Err(e) => {
                warn!("failed to accept connection: {e}");
                continue;
            }
        };
        let peer = stream.peer_addr()?;
        stream.set_nodelay(true)?;
        info!(%peer, "debugger connected");

        // every client gets a fresh target
        match serve_connection(IoTransport::new(stream.try_clone()?, stream), target) {
            Ok(summary) => info!(%peer, resumes = summary.resumes, steps = summary.steps, "debugger disconnected"),
            Err(e) => warn!(%peer, "connection failed: {e}"),
        }
    }

    Ok(())
}

fn serve_connection<R: Read, W: Write>(transport: IoTransport<R, W>, config: &TargetConfig) -> HostResult<ConnectionSummary>
{
    match config.arch {
        ArchKind::Mock => serve_target::<_, Mock, MOCK_REGISTER_COUNT>(transport, config),
        ArchKind::I386 => serve_target::<_, I386, I386_REGISTER_COUNT>(transport, config),
    }
}

/// Re-enter the session every time the simulated target traps, until the debugger leaves
///
/// There is no CPU behind the RAM, so a resumed or stepped target traps again
/// straight away with `SIGTRAP`.
fn serve_target<T, A, const N: usize>(transport: T, config: &TargetConfig) -> HostResult<ConnectionSummary>
where
    T: Transport,
    A: Architecture,
    RamTarget<A>: Target<N>,
{
    let target = config.build_target::<A>()?;
    let mut state = config.initial_state::<N>();
    let mut session = Session::new(transport, target);
    let mut summary = ConnectionSummary::default();

    loop {
        let end = session.run(&mut state)?;
        log_registers::<A, N>(&state);
        match end {
            SessionEnd::Disconnected => return Ok(summary),
            SessionEnd::Resumed => {
                summary.resumes += 1;
                if !announce(&mut session, "target has no code to run; trapping again\n")? {
                    return Ok(summary);
                }
            }
            SessionEnd::Stepped => summary.steps += 1,
        }
        state.signal = Signal::TRAP;
    }
}

fn log_registers<A: Architecture, const N: usize>(state: &DebugState<N>)
{
    for (index, value) in state.registers.iter().enumerate() {
        debug!(
            arch = A::NAME,
            register = A::register_name(index).unwrap_or("?"),
            "{value:#010x}"
        );
    }
}

/// Print on the debugger console; `false` when the debugger has gone away
fn announce<T: Transport, G>(session: &mut Session<T, G>, message: &str) -> HostResult<bool>
{
    match session.console(message) {
        Ok(()) => Ok(true),
        Err(PacketError::Transport(TransportError::Closed)) => Ok(false),
        Err(e) if e.is_fatal() => Err(e.into()),
        Err(e) => {
            warn!("console message not delivered: {e}");
            Ok(true)
        }
    }
}

#[cfg(test)]
mod tests
{
    use clap::CommandFactory;
    use dbgstub_core::types::Address;

    use super::*;

    #[test]
    fn test_cli_is_well_formed()
    {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_serve_defaults()
    {
        let cli = Cli::try_parse_from(["dbgstub", "serve"]).unwrap();
        let Commands::Serve { listen, target } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(listen, "127.0.0.1:1234");
        assert_eq!(target.arch, ArchKind::Mock);
        assert_eq!(target.memory_size, 256);
        assert_eq!(target.load_address, Address::ZERO);
        assert_eq!(target.signal, 5);
    }

    #[test]
    fn test_stdio_target_options()
    {
        let cli = Cli::try_parse_from([
            "dbgstub",
            "--log-level",
            "debug",
            "stdio",
            "--arch",
            "i386",
            "--memory-size",
            "4096",
            "--load-address",
            "0x100",
        ])
        .unwrap();
        assert_eq!(cli.log_level, Some(LogLevel::Debug));
        let Commands::Stdio { target } = cli.command else {
            panic!("expected stdio");
        };
        assert_eq!(target.arch, ArchKind::I386);
        assert_eq!(target.memory_size, 4096);
        assert_eq!(target.load_address, Address::new(0x100));
    }

    #[test]
    fn test_serve_connection_reenters_until_disconnect()
    {
        // continue, then step, then hang up
        let input = b"+$c#63++$s#73+";
        let transport = IoTransport::new(&input[..], Vec::new());
        let config = TargetConfig {
            arch: ArchKind::I386,
            memory_size: 16,
            image: None,
            load_address: Address::ZERO,
            signal: 5,
        };

        let summary = serve_connection(transport, &config).unwrap();
        assert_eq!(summary, ConnectionSummary { resumes: 1, steps: 1 });
    }
}
