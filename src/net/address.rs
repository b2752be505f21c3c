/*!
 * Socket Addresses
 * Opaque, family-tagged address buffers exchanged with user space
 */

use crate::core::errors::{SocketError, SocketResult};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// IPv4 address family
pub const AF_INET: i32 = 2;

/// Connection-oriented byte stream
pub const SOCK_STREAM: i32 = 1;

/// Connectionless datagrams
pub const SOCK_DGRAM: i32 = 2;

/// TCP protocol number
pub const IPPROTO_TCP: i32 = 6;

/// UDP protocol number
pub const IPPROTO_UDP: i32 = 17;

/// `sizeof(struct sockaddr_in)`
pub const SOCKADDR_IN_LEN: usize = 16;

/// Bytes of a sockaddr_in that carry meaning (family, port, address)
const SOCKADDR_IN_MIN_LEN: usize = 8;

/// Raw socket address as copied in from (or out to) user space
///
/// The gateway never looks inside; only the socket layer decodes it.
#[derive(Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketAddress {
    bytes: Vec<u8>,
}

impl SocketAddress {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            bytes: bytes.into(),
        }
    }

    #[inline]
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Address family tag from the first two bytes, if present
    pub fn family(&self) -> Option<i32> {
        match self.bytes.as_slice() {
            [lo, hi, ..] => Some(i32::from(u16::from_le_bytes([*lo, *hi]))),
            _ => None,
        }
    }
}

impl fmt::Debug for SocketAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SocketAddress")
            .field("family", &self.family())
            .field("len", &self.len())
            .finish()
    }
}

impl From<InetAddr> for SocketAddress {
    fn from(addr: InetAddr) -> Self {
        Self::from_bytes(addr.encode())
    }
}

/// Decoded `sockaddr_in`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct InetAddr {
    pub ip: Ipv4Addr,
    pub port: u16,
}

impl InetAddr {
    pub const fn new(ip: Ipv4Addr, port: u16) -> Self {
        Self { ip, port }
    }

    pub const fn loopback(port: u16) -> Self {
        Self::new(Ipv4Addr::LOCALHOST, port)
    }

    /// Encode as a 16-byte sockaddr_in (family in host order, port and
    /// address in network order, zero padding)
    pub fn encode(&self) -> [u8; SOCKADDR_IN_LEN] {
        let mut raw = [0u8; SOCKADDR_IN_LEN];
        raw[0..2].copy_from_slice(&(AF_INET as u16).to_le_bytes());
        raw[2..4].copy_from_slice(&self.port.to_be_bytes());
        raw[4..8].copy_from_slice(&self.ip.octets());
        raw
    }

    pub fn decode(raw: &[u8]) -> SocketResult<Self> {
        if raw.len() < SOCKADDR_IN_MIN_LEN {
            return Err(SocketError::BadAddress);
        }
        let family = i32::from(u16::from_le_bytes([raw[0], raw[1]]));
        if family != AF_INET {
            return Err(SocketError::BadAddress);
        }
        let port = u16::from_be_bytes([raw[2], raw[3]]);
        let ip = Ipv4Addr::new(raw[4], raw[5], raw[6], raw[7]);
        Ok(Self { ip, port })
    }
}

impl fmt::Display for InetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.ip, self.port)
    }
}
