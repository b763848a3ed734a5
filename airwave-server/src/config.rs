use clap::Parser;
use std::net::{IpAddr, Ipv4Addr, SocketAddr};

/// Relay server settings, from flags or the environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "airwave-relay", about = "Room registry and signaling relay")]
pub struct RelayConfig {
    /// Address to bind.
    #[arg(long, env = "HOST", default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Port to listen on.
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
}

impl RelayConfig {
    pub fn addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            port: 3000,
        }
    }
}
