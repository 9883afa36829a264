//! Network context: which gateway and which network are we on.
//!
//! The gateway comes from the kernel routing table and the network identity
//! from the BSSID of the access point we are associated with. Both can be
//! overridden in configuration, which is required on wired hosts.

use std::fmt;
use std::future::Future;
use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::time::Duration;

use tracing::debug;

use super::command::CommandRunner;
use crate::config::NetworkSettings;

/// Stable identifier of the network the host is attached to.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NetworkId(String);

impl NetworkId {
    /// Create an identifier; surrounding whitespace is ignored and blank
    /// identifiers are rejected.
    pub fn new(id: impl AsRef<str>) -> Option<Self> {
        let id = id.as_ref().trim();
        if id.is_empty() {
            None
        } else {
            Some(Self(id.to_owned()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NetworkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Supplies the current gateway and network identity.
pub trait NetworkContext: Send + Sync + 'static {
    /// IPv4 address of the default gateway, if one is configured.
    fn gateway_ip(&self) -> impl Future<Output = Option<Ipv4Addr>> + Send;

    /// Identity of the current network, if connected.
    fn network_id(&self) -> impl Future<Output = Option<NetworkId>> + Send;
}

/// Default route as read from the kernel routing table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefaultRoute {
    pub interface: String,
    pub gateway: Ipv4Addr,
}

/// Convert a 32-bit address in host byte order, as printed by the kernel
/// in `/proc/net/route`, to an IPv4 address.
pub const fn ipv4_from_host_order(raw: u32) -> Ipv4Addr {
    let [a, b, c, d] = raw.to_ne_bytes();
    Ipv4Addr::new(a, b, c, d)
}

/// Find the default route in the content of `/proc/net/route`.
pub fn parse_default_route(content: &str) -> Option<DefaultRoute> {
    content.lines().skip(1).find_map(|line| {
        let fields: Vec<&str> = line.split_whitespace().collect();
        if fields.len() < 3 || fields[1] != "00000000" {
            return None;
        }

        let raw = u32::from_str_radix(fields[2], 16).ok()?;
        let gateway = ipv4_from_host_order(raw);
        if gateway.is_unspecified() {
            return None;
        }

        Some(DefaultRoute {
            interface: fields[0].to_owned(),
            gateway,
        })
    })
}

/// Extract the access point BSSID from `iw dev <interface> link` output.
///
/// ```text
/// Connected to aa:bb:cc:dd:ee:ff (on wlan0)
/// ```
pub fn parse_iw_link<I, S>(lines: I) -> Option<NetworkId>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    lines.into_iter().find_map(|line| {
        let rest = line.as_ref().trim().strip_prefix("Connected to ")?;
        let bssid = rest.split_whitespace().next()?;
        NetworkId::new(bssid.to_ascii_lowercase())
    })
}

/// Network context read from the running Linux system.
#[derive(Debug, Clone)]
pub struct SystemContext<R: CommandRunner> {
    runner: R,
    interface: Option<String>,
    gateway_ip: Option<Ipv4Addr>,
    network_id: Option<NetworkId>,
    route_table_path: PathBuf,
    command_timeout: Duration,
}

impl<R: CommandRunner> SystemContext<R> {
    pub fn new(runner: R, settings: &NetworkSettings, command_timeout: Duration) -> Self {
        Self {
            runner,
            interface: settings.interface.clone(),
            gateway_ip: settings.gateway_ip,
            network_id: settings.network_id.as_deref().and_then(NetworkId::new),
            route_table_path: settings.route_table_path.clone(),
            command_timeout,
        }
    }

    async fn default_route(&self) -> Option<DefaultRoute> {
        match tokio::fs::read_to_string(&self.route_table_path).await {
            Ok(content) => parse_default_route(&content),
            Err(err) => {
                debug!(
                    path = %self.route_table_path.display(),
                    "failed to read routing table: {err}"
                );
                None
            }
        }
    }

    async fn wireless_interface(&self) -> Option<String> {
        if let Some(interface) = &self.interface {
            return Some(interface.clone());
        }
        self.default_route().await.map(|route| route.interface)
    }
}

impl<R: CommandRunner> NetworkContext for SystemContext<R> {
    async fn gateway_ip(&self) -> Option<Ipv4Addr> {
        if self.gateway_ip.is_some() {
            return self.gateway_ip;
        }
        self.default_route().await.map(|route| route.gateway)
    }

    async fn network_id(&self) -> Option<NetworkId> {
        if self.network_id.is_some() {
            return self.network_id.clone();
        }

        let interface = self.wireless_interface().await?;
        let args = ["dev".to_owned(), interface, "link".to_owned()];
        match self.runner.run("iw", &args, self.command_timeout).await {
            Ok(output) => parse_iw_link(&output.lines),
            Err(err) => {
                debug!("failed to query access point: {err}");
                None
            }
        }
    }
}
