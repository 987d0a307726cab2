//! Blocking SOCKS5 client (RFC 1928), no-authentication method only.
//!
//! The client negotiates over a reader/writer pair and hands the pair back
//! once the proxy has connected to the target, so TLS can be layered on top.

use std::io::{Read, Write};
use std::net::{Ipv4Addr, Ipv6Addr};

use crate::address::{Address, NetLocation};

pub const VER_SOCKS5: u8 = 0x05;

pub const METHOD_NONE: u8 = 0x00;

pub const ADDR_TYPE_IPV4: u8 = 0x01;
pub const ADDR_TYPE_DOMAIN_NAME: u8 = 0x03;
pub const ADDR_TYPE_IPV6: u8 = 0x04;

pub const RESULT_SUCCESS: u8 = 0x0;

pub const CMD_CONNECT: u8 = 0x01;

/// Longest hostname a CONNECT request can carry.
const MAX_HOSTNAME_LEN: usize = 255;

#[derive(Debug)]
pub struct Socks5Client<R, W> {
    reader: R,
    writer: W,
}

impl<R: Read, W: Write> Socks5Client<R, W> {
    /// No IO happens until `handshake()`.
    pub fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Handshake and connect in one go, returning the stream pair.
    pub fn request(reader: R, writer: W, hostname: &str, port: u16) -> std::io::Result<(R, W)> {
        let mut client = Self::new(reader, writer);
        client.handshake()?;
        client.connect(hostname, port)?;
        Ok(client.into_inner())
    }

    /// Offer the no-authentication method and check the server accepts it.
    pub fn handshake(&mut self) -> std::io::Result<()> {
        self.writer.write_all(&[VER_SOCKS5, 1, METHOD_NONE])?;
        self.writer.flush()?;

        let mut reply = [0u8; 2];
        self.read_exact(&mut reply)?;

        if reply[0] != VER_SOCKS5 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("SOCKS5: unsupported server protocol version: {}", reply[0]),
            ));
        }
        if reply[1] != METHOD_NONE {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("SOCKS5: unsupported authentication method: {}", reply[1]),
            ));
        }
        Ok(())
    }

    /// Ask the proxy to connect to `hostname:port`.
    ///
    /// Returns the bound address the proxy reported.
    pub fn connect(&mut self, hostname: &str, port: u16) -> std::io::Result<NetLocation> {
        if hostname.is_empty() {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "SOCKS5: hostname is empty",
            ));
        }
        if hostname.len() > MAX_HOSTNAME_LEN {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "SOCKS5: hostname is too long",
            ));
        }
        if port == 0 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                "SOCKS5: port number is invalid",
            ));
        }

        let hostname_bytes = hostname.as_bytes();
        let mut request = Vec::with_capacity(7 + hostname_bytes.len());
        request.extend_from_slice(&[
            VER_SOCKS5,
            CMD_CONNECT,
            0x0, // reserved
            ADDR_TYPE_DOMAIN_NAME,
            hostname_bytes.len() as u8,
        ]);
        request.extend_from_slice(hostname_bytes);
        request.extend_from_slice(&port.to_be_bytes());

        self.writer.write_all(&request)?;
        self.writer.flush()?;

        let mut reply = [0u8; 4];
        self.read_exact(&mut reply)?;

        if reply[0] != VER_SOCKS5 {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("SOCKS5: unsupported server protocol version: {}", reply[0]),
            ));
        }
        if reply[1] != RESULT_SUCCESS {
            return Err(std::io::Error::new(
                std::io::ErrorKind::ConnectionRefused,
                format!("SOCKS5: connection error: {}", reply[1]),
            ));
        }

        let bound = self.read_location(reply[3])?;
        log::debug!("SOCKS5 proxy connected to {hostname}:{port}, bound to {bound}");
        Ok(bound)
    }

    pub fn into_inner(self) -> (R, W) {
        (self.reader, self.writer)
    }

    fn read_location(&mut self, address_type: u8) -> std::io::Result<NetLocation> {
        match address_type {
            ADDR_TYPE_IPV4 => {
                let mut address_bytes = [0u8; 6];
                self.read_exact(&mut address_bytes)?;

                let v4addr = Ipv4Addr::new(
                    address_bytes[0],
                    address_bytes[1],
                    address_bytes[2],
                    address_bytes[3],
                );
                let port = u16::from_be_bytes([address_bytes[4], address_bytes[5]]);

                Ok(NetLocation::new(Address::Ipv4(v4addr), port))
            }
            ADDR_TYPE_IPV6 => {
                let mut address_bytes = [0u8; 18];
                self.read_exact(&mut address_bytes)?;

                let mut octets = [0u8; 16];
                octets.copy_from_slice(&address_bytes[0..16]);
                let port = u16::from_be_bytes([address_bytes[16], address_bytes[17]]);

                Ok(NetLocation::new(Address::Ipv6(Ipv6Addr::from(octets)), port))
            }
            ADDR_TYPE_DOMAIN_NAME => {
                let mut address_len = [0u8; 1];
                self.read_exact(&mut address_len)?;
                let address_len = address_len[0] as usize;

                let mut address_bytes = vec![0u8; address_len + 2];
                self.read_exact(&mut address_bytes)?;

                let address_str = match std::str::from_utf8(&address_bytes[0..address_len]) {
                    Ok(s) => s,
                    Err(e) => {
                        return Err(std::io::Error::new(
                            std::io::ErrorKind::InvalidData,
                            format!("SOCKS5: failed to decode bound address: {e}"),
                        ));
                    }
                };
                let port =
                    u16::from_be_bytes([address_bytes[address_len], address_bytes[address_len + 1]]);

                // Some servers put ip addresses in the domain name field.
                let address = Address::from(address_str)
                    .unwrap_or_else(|_| Address::Hostname(address_str.to_string()));
                Ok(NetLocation::new(address, port))
            }
            _ => Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("SOCKS5: unknown address type: {address_type}"),
            )),
        }
    }

    fn read_exact(&mut self, buf: &mut [u8]) -> std::io::Result<()> {
        self.reader.read_exact(buf).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                std::io::Error::new(
                    std::io::ErrorKind::UnexpectedEof,
                    "SOCKS5: unexpected end of stream",
                )
            } else {
                e
            }
        })
    }
}
