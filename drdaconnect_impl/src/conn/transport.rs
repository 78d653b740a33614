use std::{
    io::{Read, Write},
    net::{SocketAddr, TcpStream},
};

/// The byte stream a session runs on.
///
/// The session owns no transport lifecycle beyond reading and writing;
/// a confidentiality layer can sit underneath.
pub trait Transport: Read + Write + Send {
    /// The local address, from which the session's correlation token is derived.
    fn local_addr(&self) -> Option<SocketAddr> {
        None
    }
}

impl Transport for TcpStream {
    fn local_addr(&self) -> Option<SocketAddr> {
        TcpStream::local_addr(self).ok()
    }
}
