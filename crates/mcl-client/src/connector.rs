use std::net::IpAddr;

use crate::client::Client;
use crate::config::ClientConfig;
use crate::error::Result;

/// Connect to the system at `ip` with default settings and wait until it is ready.
pub fn connect(ip: IpAddr) -> Result<Client> {
    connect_with_config(ip, ClientConfig::default())
}

/// Connect with explicit configuration.
pub fn connect_with_config(ip: IpAddr, config: ClientConfig) -> Result<Client> {
    let mut client = Client::new(config);
    client.connect(ip)?;
    Ok(client)
}
