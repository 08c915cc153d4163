//! Client for the knxd daemon socket protocol.
//!
//! Every message on the socket is a 2-byte big-endian length followed by the
//! body; the body starts with a 2-byte message type.

use super::address::{GroupAddress, IndividualAddress};
use super::bus::BusClient;
use super::telegram::GroupTelegram;
use crate::error::{BridgeError, Result};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use futures_util::{SinkExt, StreamExt};
use log::{debug, info};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio_util::codec::{Framed, LengthDelimitedCodec};

/// Default TCP port of knxd's client socket.
pub const DEFAULT_KNXD_PORT: u16 = 6720;

const EIB_RESET_CONNECTION: u16 = 0x0004;
const EIB_OPEN_T_GROUP: u16 = 0x0022;
const EIB_APDU_PACKET: u16 = 0x0025;
const EIB_OPEN_GROUPCON: u16 = 0x0026;
const EIB_GROUP_PACKET: u16 = 0x0027;

const WRITE_ONLY: u8 = 0xFF;

/// Byte stream the client can run over.
pub trait Transport: AsyncRead + AsyncWrite + Unpin + Send {}

impl<T: AsyncRead + AsyncWrite + Unpin + Send> Transport for T {}

/// Address of a knxd daemon: `ip:host[:port]` or `local:/path/to/socket`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KnxdUrl {
    Ip { host: String, port: u16 },
    Local(PathBuf),
}

impl FromStr for KnxdUrl {
    type Err = BridgeError;

    fn from_str(url: &str) -> Result<Self> {
        if let Some(path) = url.strip_prefix("local:") {
            if path.is_empty() {
                return Err(BridgeError::InvalidConfig(format!(
                    "missing socket path in knxd URL: {}",
                    url
                )));
            }
            return Ok(KnxdUrl::Local(PathBuf::from(path)));
        }

        let Some(rest) = url.strip_prefix("ip:") else {
            return Err(BridgeError::InvalidConfig(format!(
                "knxd URL must start with ip: or local:, got: {}",
                url
            )));
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse().map_err(|_| {
                    BridgeError::InvalidConfig(format!("invalid port in knxd URL: {}", url))
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_KNXD_PORT),
        };

        if host.is_empty() {
            return Err(BridgeError::InvalidConfig(format!(
                "missing host in knxd URL: {}",
                url
            )));
        }

        Ok(KnxdUrl::Ip {
            host: host.to_string(),
            port,
        })
    }
}

impl fmt::Display for KnxdUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KnxdUrl::Ip { host, port } => write!(f, "ip:{}:{}", host, port),
            KnxdUrl::Local(path) => write!(f, "local:{}", path.display()),
        }
    }
}

/// Connection to a knxd daemon.
pub struct KnxdClient {
    framed: Framed<Box<dyn Transport>, LengthDelimitedCodec>,
}

impl KnxdClient {
    /// Open the daemon socket.
    pub async fn connect(url: &KnxdUrl) -> Result<Self> {
        info!("[KNX] Connecting to knxd at {}", url);

        let transport: Box<dyn Transport> = match url {
            KnxdUrl::Ip { host, port } => Box::new(
                tokio::net::TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|e| BridgeError::ConnectionFailed(format!("{}: {}", url, e)))?,
            ),
            #[cfg(unix)]
            KnxdUrl::Local(path) => Box::new(
                tokio::net::UnixStream::connect(path)
                    .await
                    .map_err(|e| BridgeError::ConnectionFailed(format!("{}: {}", url, e)))?,
            ),
            #[cfg(not(unix))]
            KnxdUrl::Local(_) => {
                return Err(BridgeError::InvalidConfig(format!(
                    "unix sockets are not supported on this platform: {}",
                    url
                )));
            }
        };

        Ok(Self::from_transport(transport))
    }

    /// Run the protocol over an already open stream.
    pub fn from_transport<T: Transport + 'static>(transport: T) -> Self {
        let codec = LengthDelimitedCodec::builder()
            .length_field_length(2)
            .max_frame_length(u16::MAX as usize)
            .new_codec();
        let transport: Box<dyn Transport> = Box::new(transport);
        Self {
            framed: Framed::new(transport, codec),
        }
    }

    async fn send(&mut self, msg_type: u16, body: &[u8]) -> Result<()> {
        let mut frame = Vec::with_capacity(2 + body.len());
        frame.extend_from_slice(&msg_type.to_be_bytes());
        frame.extend_from_slice(body);
        debug!("[KNX] -> {:02X?}", frame);
        self.framed.send(Bytes::from(frame)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Result<BytesMut> {
        match self.framed.next().await {
            Some(Ok(frame)) => {
                debug!("[KNX] <- {:02X?}", &frame[..]);
                Ok(frame)
            }
            Some(Err(e)) => Err(e.into()),
            None => Err(BridgeError::ConnectionFailed(
                "knxd closed the connection".to_string(),
            )),
        }
    }

    /// Send a request and wait for the reply of the same type.
    async fn request(&mut self, msg_type: u16, body: &[u8]) -> Result<()> {
        self.send(msg_type, body).await?;
        let reply = self.recv().await?;
        match frame_type(&reply) {
            Some(t) if t == msg_type => Ok(()),
            other => Err(BridgeError::ConnectionFailed(format!(
                "knxd rejected request 0x{:04X} (reply {:04X?})",
                msg_type, other
            ))),
        }
    }
}

fn frame_type(frame: &[u8]) -> Option<u16> {
    match frame {
        [hi, lo, ..] => Some(u16::from_be_bytes([*hi, *lo])),
        _ => None,
    }
}

#[async_trait]
impl BusClient for KnxdClient {
    async fn open_group_socket(&mut self) -> Result<()> {
        self.request(EIB_OPEN_GROUPCON, &[0x00, 0x00, 0x00]).await
    }

    async fn read_group_telegram(&mut self) -> Result<GroupTelegram> {
        let frame = self.recv().await?;
        if frame_type(&frame) != Some(EIB_GROUP_PACKET) || frame.len() < 6 {
            return Err(BridgeError::ConnectionFailed(format!(
                "unexpected message from knxd: {:02X?}",
                &frame[..]
            )));
        }

        Ok(GroupTelegram {
            source: IndividualAddress::from(u16::from_be_bytes([frame[2], frame[3]])),
            dest: GroupAddress::from(u16::from_be_bytes([frame[4], frame[5]])),
            apdu: frame[6..].to_vec(),
        })
    }

    async fn reset_connection(&mut self) -> Result<()> {
        self.request(EIB_RESET_CONNECTION, &[]).await
    }

    async fn send_apdu(&mut self, dest: GroupAddress, apdu: &[u8]) -> Result<()> {
        let [hi, lo] = dest.raw().to_be_bytes();
        self.request(EIB_OPEN_T_GROUP, &[hi, lo, WRITE_ONLY]).await?;
        self.send(EIB_APDU_PACKET, apdu).await
    }

    async fn close(&mut self) -> Result<()> {
        SinkExt::<Bytes>::close(&mut self.framed).await?;
        Ok(())
    }
}
