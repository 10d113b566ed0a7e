//! The host (service name + network address) that recorded an annotation.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

/// Which IP family an [`IpAddress`] carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IpVersion {
    /// IPv4.
    V4,
    /// IPv6.
    V6,
}

/// A network address attached to an [`Endpoint`].
///
/// An empty address (`IpAddress::default()`) is considered invalid/absent,
/// mirroring the original's `friendly_address_.empty()` validity check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IpAddress {
    addr: Option<IpAddr>,
    port: u16,
}

impl IpAddress {
    /// Builds an address from a parsed `std::net::IpAddr` and port.
    pub fn new(addr: IpAddr, port: u16) -> Self {
        Self {
            addr: Some(addr),
            port,
        }
    }

    /// Parses a dotted-quad or colon-hex address string; an unparsable or
    /// empty string yields an invalid (absent) address rather than an
    /// error, matching the original's permissive construction.
    pub fn parse(address: &str, port: u16) -> Self {
        match address.parse::<IpAddr>() {
            Ok(addr) => Self::new(addr, port),
            Err(_) => Self::default(),
        }
    }

    /// `true` unless this address was never set / failed to parse.
    pub fn is_valid(&self) -> bool {
        self.addr.is_some()
    }

    /// Which IP family this address is, if valid.
    pub fn version(&self) -> Option<IpVersion> {
        match self.addr {
            Some(IpAddr::V4(_)) => Some(IpVersion::V4),
            Some(IpAddr::V6(_)) => Some(IpVersion::V6),
            None => None,
        }
    }

    /// The port, or 0 if never set.
    pub fn port(&self) -> u16 {
        self.port
    }

    /// The canonical string form of the address (empty if invalid).
    pub fn address_as_string(&self) -> String {
        match self.addr {
            Some(addr) => addr.to_string(),
            None => String::new(),
        }
    }

    pub(crate) fn as_v4(&self) -> Option<Ipv4Addr> {
        match self.addr {
            Some(IpAddr::V4(v4)) => Some(v4),
            _ => None,
        }
    }

    pub(crate) fn as_v6(&self) -> Option<Ipv6Addr> {
        match self.addr {
            Some(IpAddr::V6(v6)) => Some(v6),
            _ => None,
        }
    }
}

/// The service and network location where an annotation or binary
/// annotation was recorded. Immutable once built, per the tracer's
/// construction-time endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Endpoint {
    service_name: String,
    address: IpAddress,
}

impl Endpoint {
    /// Builds an endpoint from a service name and address.
    pub fn new(service_name: impl Into<String>, address: IpAddress) -> Self {
        Self {
            service_name: service_name.into(),
            address,
        }
    }

    /// The service name this endpoint identifies.
    pub fn service_name(&self) -> &str {
        &self.service_name
    }

    /// The network address of this endpoint.
    pub fn address(&self) -> &IpAddress {
        &self.address
    }
}
