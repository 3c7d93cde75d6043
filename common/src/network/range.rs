//! # Range Specification Model
//!
//! A [`RangeSpec`] is one line of the address source: either a single host
//! (`203.0.113.5`, `2606:4700::1`) or a CIDR prefix (`104.16.0.0/13`,
//! `2606:4700::/32`). Host bits in a prefix are masked off while parsing, so
//! `1.1.1.7/24` and `1.1.1.0/24` describe the same block.

use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use pnet::ipnetwork::{IpNetwork, Ipv4Network, Ipv6Network};

use crate::error::RangeError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Family {
    V4,
    V6,
}

impl Family {
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => Family::V4,
            IpAddr::V6(_) => Family::V6,
        }
    }

    pub fn max_prefix(self) -> u8 {
        match self {
            Family::V4 => 32,
            Family::V6 => 128,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RangeSpec {
    /// A bare address without a prefix length.
    Host { addr: IpAddr },
    /// A normalized CIDR block.
    Prefix { network: IpNetwork },
}

impl RangeSpec {
    pub fn family(&self) -> Family {
        match self {
            RangeSpec::Host { addr } => Family::of(addr),
            RangeSpec::Prefix { network } => Family::of(&network.ip()),
        }
    }

    pub fn is_host(&self) -> bool {
        matches!(self, RangeSpec::Host { .. })
    }

    /// First address of the block.
    pub fn base(&self) -> IpAddr {
        match self {
            RangeSpec::Host { addr } => *addr,
            RangeSpec::Prefix { network } => network.network(),
        }
    }

    pub fn prefix(&self) -> u8 {
        match self {
            RangeSpec::Host { addr } => Family::of(addr).max_prefix(),
            RangeSpec::Prefix { network } => network.prefix(),
        }
    }

    /// Number of addresses covered, saturating at `u128::MAX` for `::/0`.
    pub fn size(&self) -> u128 {
        let host_bits: u32 = u32::from(self.family().max_prefix() - self.prefix());
        1u128.checked_shl(host_bits).unwrap_or(u128::MAX)
    }

    pub fn contains(&self, addr: IpAddr) -> bool {
        match self {
            RangeSpec::Host { addr: host } => *host == addr,
            RangeSpec::Prefix { network } => network.contains(addr),
        }
    }
}

impl fmt::Display for RangeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RangeSpec::Host { addr } => write!(f, "{addr}"),
            RangeSpec::Prefix { network } => write!(f, "{}/{}", network.network(), network.prefix()),
        }
    }
}

impl FromStr for RangeSpec {
    type Err = RangeError;

    /// Parses a single address or a CIDR prefix.
    ///
    /// Anything else is rejected; a malformed line in the source is fatal.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s: &str = s.trim();

        if let Some(spec) = parse_host(s) {
            return Ok(spec);
        }

        if let Some(spec) = parse_cidr(s)? {
            return Ok(spec);
        }

        Err(RangeError::Invalid {
            input: s.to_string(),
        })
    }
}

fn parse_host(s: &str) -> Option<RangeSpec> {
    s.parse::<IpAddr>().ok().map(|addr| RangeSpec::Host { addr })
}

fn parse_cidr(s: &str) -> Result<Option<RangeSpec>, RangeError> {
    let Some((ip_str, prefix_str)) = s.split_once('/') else {
        return Ok(None);
    };

    let Ok(addr) = ip_str.parse::<IpAddr>() else {
        return Err(RangeError::Invalid {
            input: s.to_string(),
        });
    };

    let prefix: u8 = prefix_str.parse::<u8>().map_err(|e| RangeError::Prefix {
        input: s.to_string(),
        reason: e.to_string(),
    })?;

    let network: IpNetwork = normalize(addr, prefix).map_err(|reason| RangeError::Prefix {
        input: s.to_string(),
        reason,
    })?;

    Ok(Some(RangeSpec::Prefix { network }))
}

fn normalize(addr: IpAddr, prefix: u8) -> Result<IpNetwork, String> {
    match addr {
        IpAddr::V4(v4) => {
            let net: Ipv4Network = Ipv4Network::new(v4, prefix).map_err(|e| e.to_string())?;
            let base: Ipv4Addr = net.network();
            Ipv4Network::new(base, prefix)
                .map(IpNetwork::V4)
                .map_err(|e| e.to_string())
        }
        IpAddr::V6(v6) => {
            let net: Ipv6Network = Ipv6Network::new(v6, prefix).map_err(|e| e.to_string())?;
            let base: Ipv6Addr = net.network();
            Ipv6Network::new(base, prefix)
                .map(IpNetwork::V6)
                .map_err(|e| e.to_string())
        }
    }
}

// ╔════════════════════════════════════════════╗
// ║ ████████╗███████╗███████╗████████╗███████╗ ║
// ║ ╚══██╔══╝██╔════╝██╔════╝╚══██╔══╝██╔════╝ ║
// ║    ██║   █████╗  ███████╗   ██║   ███████╗ ║
// ║    ██║   ██╔══╝  ╚════██║   ██║   ╚════██║ ║
// ║    ██║   ███████╗███████║   ██║   ███████║ ║
// ║    ╚═╝   ╚══════╝╚══════╝   ╚═╝   ╚══════╝ ║
// ╚════════════════════════════════════════════╝
