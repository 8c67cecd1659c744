// crates/certsync-cli/src/main.rs
// ============================================================================
// Module: Certsync CLI Entry Point
// Description: Command dispatcher for the registry server and producer tooling.
// Purpose: Run the registry, feed authority events, and manage buffered files.
// Dependencies: clap, certsync-config, certsync-exit, certsync-server, tokio.
// ============================================================================

//! ## Overview
//! The `certsync` binary hosts both halves of the pipeline. `serve` runs the
//! registry; `emit` is the host adapter that hands one authority notification
//! to the exit module; `buffer` lists and redelivers files the exit module
//! preserved after a failed delivery.
//!
//! Security posture: inputs are untrusted and must be validated; see
//! `Docs/security/threat_model.md`.


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;

use certsync_config::CertsyncConfig;
use certsync_core::EventKind;
use certsync_exit::BufferStore;
use certsync_exit::ExitError;
use certsync_exit::ExitModule;
use certsync_exit::PropertyBag;
use certsync_server::RegistryServer;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use serde::Serialize;
use thiserror::Error;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of a property bag JSON input.
const MAX_PROPERTIES_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "certsync", version, disable_help_subcommand = true)]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Start the certificate registry server.
    Serve(ConfigArgs),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
    /// Hand one authority notification to the exit module.
    Emit(EmitCommand),
    /// Buffered payload utilities.
    Buffer {
        /// Selected buffer subcommand.
        #[command(subcommand)]
        command: BufferCommand,
    },
}

/// Shared config path argument.
#[derive(Args, Debug)]
struct ConfigArgs {
    /// Optional config file path (defaults to certsync.toml or env override).
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Validate a certsync configuration file.
    Validate(ConfigArgs),
}

/// Arguments for the `emit` command.
#[derive(Args, Debug)]
struct EmitCommand {
    /// Notification kind raised by the authority.
    #[arg(long, value_parser = parse_event_kind)]
    kind: EventKind,
    /// JSON file holding the request property bag.
    #[arg(long, value_name = "FILE")]
    properties: PathBuf,
    /// Authority callback context handle.
    #[arg(long, default_value_t = 0)]
    context: i64,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Buffer subcommands.
#[derive(Subcommand, Debug)]
enum BufferCommand {
    /// List buffered files.
    List(ConfigArgs),
    /// Redeliver one buffered envelope.
    Resubmit(ResubmitCommand),
}

/// Arguments for `buffer resubmit`.
#[derive(Args, Debug)]
struct ResubmitCommand {
    /// Buffered file name.
    #[arg(long, value_name = "NAME")]
    file: String,
    /// Keep the file after a successful delivery.
    #[arg(long)]
    keep: bool,
    /// Config selection.
    #[command(flatten)]
    config: ConfigArgs,
}

/// Outcome printed by `buffer resubmit`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ResubmitReport<'a> {
    /// Redelivered file.
    file: &'a str,
    /// HTTP status returned by the registry.
    status: u16,
    /// Whether the file is still in the buffer directory.
    kept: bool,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error wrapper for operator-facing messages.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    match run(Cli::parse()) {
        Ok(code) => code,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the CLI command dispatcher.
fn run(cli: Cli) -> CliResult<ExitCode> {
    match cli.command {
        Commands::Serve(args) => command_serve(&args),
        Commands::Config {
            command: ConfigCommand::Validate(args),
        } => command_config_validate(&args),
        Commands::Emit(command) => command_emit(&command),
        Commands::Buffer {
            command,
        } => match command {
            BufferCommand::List(args) => command_buffer_list(&args),
            BufferCommand::Resubmit(command) => command_buffer_resubmit(&command),
        },
    }
}

// ============================================================================
// SECTION: Server Commands
// ============================================================================

/// Executes the `serve` command.
fn command_serve(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let server = RegistryServer::from_config(&config)
        .map_err(|err| CliError::new(format!("server init failed: {err}")))?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|err| CliError::new(format!("runtime init failed: {err}")))?;
    runtime
        .block_on(server.serve())
        .map_err(|err| CliError::new(format!("server failed: {err}")))?;
    Ok(ExitCode::SUCCESS)
}

/// Executes the config validation command.
fn command_config_validate(args: &ConfigArgs) -> CliResult<ExitCode> {
    let _config = load_config(args)?;
    write_stdout_line("config ok")?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Producer Commands
// ============================================================================

/// Executes the `emit` host adapter command.
fn command_emit(command: &EmitCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let exit = config.require_exit().map_err(|err| CliError::new(err.to_string()))?;
    let properties = read_properties(&command.properties)?;
    let module = ExitModule::from_config(exit)
        .map_err(|err| CliError::new(format!("exit module init failed: {err}")))?;
    match module.on_certificate_event(command.context, command.kind, &properties) {
        Ok(report) => {
            write_json(&report)?;
            Ok(ExitCode::SUCCESS)
        }
        Err(err @ ExitError::BufferWrite { .. }) => Err(CliError::new(err.to_string())),
        Err(err) => Err(CliError::new(format!("event handling failed: {err}"))),
    }
}

/// Executes `buffer list`.
fn command_buffer_list(args: &ConfigArgs) -> CliResult<ExitCode> {
    let config = load_config(args)?;
    let exit = config.require_exit().map_err(|err| CliError::new(err.to_string()))?;
    let store = BufferStore::open(&exit.buffer_dir)
        .map_err(|err| CliError::new(format!("buffer unavailable: {err}")))?;
    let entries =
        store.list().map_err(|err| CliError::new(format!("buffer listing failed: {err}")))?;
    write_json(&entries)?;
    Ok(ExitCode::SUCCESS)
}

/// Executes `buffer resubmit`.
fn command_buffer_resubmit(command: &ResubmitCommand) -> CliResult<ExitCode> {
    let config = load_config(&command.config)?;
    let exit = config.require_exit().map_err(|err| CliError::new(err.to_string()))?;
    let module = ExitModule::from_config(exit)
        .map_err(|err| CliError::new(format!("exit module init failed: {err}")))?;
    let receipt = module
        .redeliver(&command.file, command.keep)
        .map_err(|err| CliError::new(format!("resubmit of {} failed: {err}", command.file)))?;
    write_json(&ResubmitReport {
        file: &command.file,
        status: receipt.status,
        kept: command.keep,
    })?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Parses an event kind label.
fn parse_event_kind(value: &str) -> Result<EventKind, String> {
    value.parse()
}

/// Loads and validates configuration.
fn load_config(args: &ConfigArgs) -> CliResult<CertsyncConfig> {
    CertsyncConfig::load(args.config.as_deref())
        .map_err(|err| CliError::new(format!("config load failed: {err}")))
}

/// Reads a property bag from a JSON file.
fn read_properties(path: &Path) -> CliResult<PropertyBag> {
    let bytes = read_bytes_with_limit(path, MAX_PROPERTIES_BYTES).map_err(|err| match err {
        ReadLimitError::Io(err) => {
            CliError::new(format!("failed to read {}: {err}", path.display()))
        }
        ReadLimitError::TooLarge {
            size,
            limit,
        } => CliError::new(format!(
            "{} is too large ({size} bytes, limit {limit})",
            path.display()
        )),
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid property bag {}: {err}", path.display())))
}

/// Errors returned by bounded file reads.
#[derive(Debug)]
enum ReadLimitError {
    /// File I/O failure.
    Io(std::io::Error),
    /// File size exceeds the configured limit.
    TooLarge {
        /// Actual size in bytes.
        size: u64,
        /// Allowed limit in bytes.
        limit: usize,
    },
}

/// Reads a file from disk while enforcing a hard size limit.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path).map_err(ReadLimitError::Io)?;
    let size = file.metadata().map_err(ReadLimitError::Io)?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes).map_err(ReadLimitError::Io)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Writes pretty JSON to stdout.
fn write_json<T: Serialize>(value: &T) -> CliResult<()> {
    let text = serde_json::to_string_pretty(value)
        .map_err(|err| CliError::new(format!("output serialization failed: {err}")))?;
    write_stdout_line(&text)
}

/// Writes a line to stdout.
fn write_stdout_line(message: &str) -> CliResult<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
        .map_err(|err| CliError::new(format!("failed to write to stdout: {err}")))
}

/// Writes a line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
