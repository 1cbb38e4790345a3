use std::net::IpAddr;

use clap::{Args, Subcommand};
use mcl_client::{Client, ClientConfig};
use mcl_params::{ParamKey, Registry};
use mcl_transport::READ_PORT;
use tracing::info;

use crate::exit::{client_error, param_error, parse_duration, CliError, CliResult, USAGE};
use crate::output::OutputFormat;

pub mod discover;
pub mod get;
pub mod set;
pub mod version;
pub mod watch;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Find systems on the local network.
    Discover(DiscoverArgs),
    /// Print the current value of a parameter.
    Get(GetArgs),
    /// Change one field of a configuration parameter.
    Set(SetArgs),
    /// Print lock-in readings as they stream in.
    Watch(WatchArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Discover(args) => discover::run(args, format),
        Command::Get(args) => get::run(args, format),
        Command::Set(args) => set::run(args, format),
        Command::Watch(args) => watch::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

/// Where and how to open a session.
#[derive(Args, Debug)]
pub struct ConnectArgs {
    /// System address.
    pub ip: IpAddr,
    /// Read channel port; the write channel uses the next port.
    #[arg(long, default_value_t = READ_PORT)]
    pub port: u16,
    /// Give up if the configuration has not arrived within this time (e.g. 30s).
    #[arg(long, default_value = "30s")]
    pub timeout: String,
}

impl ConnectArgs {
    pub fn config(&self) -> CliResult<ClientConfig> {
        Ok(ClientConfig {
            base_port: self.port,
            readiness_timeout: Some(parse_duration(&self.timeout)?),
            ..ClientConfig::default()
        })
    }

    pub fn connect(&self, client: &mut Client) -> CliResult<()> {
        client
            .connect(self.ip)
            .map_err(|err| client_error("connect failed", err))?;
        info!(ip = %self.ip, port = self.port, "connected");
        Ok(())
    }
}

/// Resolve a numeric index within `category` or a parameter name.
pub fn resolve(registry: &Registry, category: u8, parameter: &str) -> CliResult<ParamKey> {
    let key = match parameter.parse::<u16>() {
        Ok(index) => ParamKey::new(category, index),
        Err(_) => registry
            .by_name(parameter)
            .map(|p| p.key())
            .ok_or_else(|| CliError::new(USAGE, format!("unknown parameter: {parameter}")))?,
    };
    registry
        .parameter(key)
        .map_err(|err| param_error("lookup failed", err))?;
    Ok(key)
}

#[derive(Args, Debug)]
pub struct DiscoverArgs {
    /// Stop listening after this long without a reply (e.g. 1s, 500ms).
    #[arg(long, default_value = "1s")]
    pub timeout: String,
    /// Query ports (comma-separated). Replies arrive on port + 2.
    #[arg(long, value_delimiter = ',')]
    pub ports: Option<Vec<u16>>,
}

#[derive(Args, Debug)]
pub struct GetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Parameter category (0-4).
    #[arg(long, short = 'c', default_value = "2")]
    pub category: u8,
    /// Parameter index, or a parameter name such as `amplitude_1`.
    pub parameter: String,
}

#[derive(Args, Debug)]
pub struct SetArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Configuration index, or a parameter name such as `amplitude_1`.
    pub parameter: String,
    /// Field to change.
    pub field: String,
    /// New value, parsed as the field's type.
    #[arg(allow_hyphen_values = true)]
    pub value: String,
}

#[derive(Args, Debug)]
pub struct WatchArgs {
    #[command(flatten)]
    pub connect: ConnectArgs,
    /// Lock-in stream to watch.
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u8).range(1..=2))]
    pub lockin: u8,
    /// Exit after printing this many readings.
    #[arg(long)]
    pub count: Option<usize>,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Include build details.
    #[arg(long)]
    pub extended: bool,
}
