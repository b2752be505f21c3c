/*!
 * Syscall Numbers
 * Socket syscall numbering, continuing after xv6's `close` (21)
 */

use serde::{Deserialize, Serialize};

pub const SYS_SOCKET: u32 = 22;
pub const SYS_CONNECT: u32 = 23;
pub const SYS_BIND: u32 = 24;
pub const SYS_LISTEN: u32 = 25;
pub const SYS_ACCEPT: u32 = 26;
pub const SYS_RECV: u32 = 27;
pub const SYS_SEND: u32 = 28;
pub const SYS_RECVFROM: u32 = 29;
pub const SYS_SENDTO: u32 = 30;

/// The socket syscalls this gateway handles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u32)]
pub enum SyscallNumber {
    Socket = SYS_SOCKET,
    Connect = SYS_CONNECT,
    Bind = SYS_BIND,
    Listen = SYS_LISTEN,
    Accept = SYS_ACCEPT,
    Recv = SYS_RECV,
    Send = SYS_SEND,
    Recvfrom = SYS_RECVFROM,
    Sendto = SYS_SENDTO,
}

impl SyscallNumber {
    pub const ALL: [SyscallNumber; 9] = [
        SyscallNumber::Socket,
        SyscallNumber::Connect,
        SyscallNumber::Bind,
        SyscallNumber::Listen,
        SyscallNumber::Accept,
        SyscallNumber::Recv,
        SyscallNumber::Send,
        SyscallNumber::Recvfrom,
        SyscallNumber::Sendto,
    ];

    /// Dense index for counter tables
    #[inline]
    pub const fn index(self) -> usize {
        (self as u32 - SYS_SOCKET) as usize
    }

    pub const fn name(self) -> &'static str {
        match self {
            Self::Socket => "socket",
            Self::Connect => "connect",
            Self::Bind => "bind",
            Self::Listen => "listen",
            Self::Accept => "accept",
            Self::Recv => "recv",
            Self::Send => "send",
            Self::Recvfrom => "recvfrom",
            Self::Sendto => "sendto",
        }
    }

    /// Whether the call may block the caller inside the socket layer
    pub const fn may_block(self) -> bool {
        matches!(self, Self::Accept | Self::Recv | Self::Recvfrom)
    }
}

impl TryFrom<u32> for SyscallNumber {
    type Error = u32;

    fn try_from(number: u32) -> Result<Self, Self::Error> {
        Self::ALL
            .into_iter()
            .find(|call| *call as u32 == number)
            .ok_or(number)
    }
}

impl From<SyscallNumber> for u32 {
    fn from(call: SyscallNumber) -> Self {
        call as u32
    }
}
