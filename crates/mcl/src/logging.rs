use clap::ValueEnum;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Crates whose events describe the session: connect, readiness, writes.
const SESSION_TARGETS: [&str; 3] = ["mcl", "mcl_client", "mcl_params"];

/// Crates that log per chunk or per frame.
const WIRE_TARGETS: [&str; 2] = ["mcl_frame", "mcl_transport"];

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
pub enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn as_filter(self) -> LevelFilter {
        match self {
            LogLevel::Error => LevelFilter::ERROR,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Trace => LevelFilter::TRACE,
        }
    }

    /// Level for the framing and transport crates.
    ///
    /// A waveform stream produces a frame event every few milliseconds, so
    /// `debug` keeps those crates at `info` and only `trace` opens them up.
    fn wire_filter(self) -> LevelFilter {
        match self {
            LogLevel::Debug => LevelFilter::INFO,
            other => other.as_filter(),
        }
    }
}

/// Per-crate directives for `level`.
///
/// Anything outside this workspace stays at `warn` or quieter.
pub fn directives(level: LogLevel) -> Targets {
    let session = level.as_filter();
    let wire = level.wire_filter();
    let mut targets = Targets::new().with_default(session.min(LevelFilter::WARN));
    for target in SESSION_TARGETS {
        targets = targets.with_target(target, session);
    }
    for target in WIRE_TARGETS {
        targets = targets.with_target(target, wire);
    }
    targets
}

/// Install the stderr subscriber. Stdout is reserved for command output.
pub fn init_logging(format: LogFormat, level: LogLevel) {
    let layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_thread_names(true);
    let registry = tracing_subscriber::registry().with(directives(level));

    let _ = match format {
        LogFormat::Text => registry.with(layer).try_init(),
        LogFormat::Json => registry.with(layer.json()).try_init(),
    };
}
