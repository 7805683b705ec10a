//! Obsdoc multicast listener
//!
//! Joins the UDP multicast group the control system broadcasts observation
//! documents on and hands back one raw document per datagram.

use std::net::{Ipv4Addr, SocketAddr};

use socket2::{Domain, Protocol, Socket, Type};
use thiserror::Error;
use tokio::net::UdpSocket;

use crate::config::defaults::OBSDOC_MAX_DATAGRAM_BYTES;

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("{0} is not a multicast group address")]
    NotMulticast(Ipv4Addr),

    #[error("failed to join {group}:{port}: {source}")]
    Join {
        group: Ipv4Addr,
        port: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("receive failed: {0}")]
    Receive(#[from] std::io::Error),
}

/// UDP multicast receiver for observation documents.
pub struct ObsdocListener {
    socket: UdpSocket,
    group: Ipv4Addr,
    port: u16,
    buf: Vec<u8>,
    datagrams_received: u64,
}

impl ObsdocListener {
    /// Bind to `port` on all interfaces and join `group`.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(group: Ipv4Addr, port: u16) -> Result<Self, ListenerError> {
        if !group.is_multicast() {
            return Err(ListenerError::NotMulticast(group));
        }

        let join_err = |source| ListenerError::Join { group, port, source };

        let socket = Socket::new(Domain::IPV4, Type::DGRAM, Some(Protocol::UDP)).map_err(join_err)?;
        // Other listeners on the same host share the stream.
        socket.set_reuse_address(true).map_err(join_err)?;
        socket
            .bind(&SocketAddr::from((Ipv4Addr::UNSPECIFIED, port)).into())
            .map_err(join_err)?;
        socket
            .join_multicast_v4(&group, &Ipv4Addr::UNSPECIFIED)
            .map_err(join_err)?;
        socket.set_nonblocking(true).map_err(join_err)?;

        let socket = UdpSocket::from_std(socket.into()).map_err(join_err)?;
        tracing::info!(group = %group, port = port, "Joined obsdoc multicast group");

        Ok(Self {
            socket,
            group,
            port,
            buf: vec![0u8; OBSDOC_MAX_DATAGRAM_BYTES],
            datagrams_received: 0,
        })
    }

    /// Wait for the next datagram and return its payload.
    pub async fn recv_document(&mut self) -> Result<&[u8], ListenerError> {
        let (len, from) = self.socket.recv_from(&mut self.buf).await?;
        self.datagrams_received += 1;
        tracing::debug!(bytes = len, from = %from, "Received obsdoc datagram");
        Ok(&self.buf[..len])
    }

    pub fn group(&self) -> Ipv4Addr {
        self.group
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn datagrams_received(&self) -> u64 {
        self.datagrams_received
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_rejects_unicast_group() {
        assert!(matches!(
            ObsdocListener::bind(Ipv4Addr::new(10, 0, 0, 1), 53_001),
            Err(ListenerError::NotMulticast(_))
        ));
    }
}
