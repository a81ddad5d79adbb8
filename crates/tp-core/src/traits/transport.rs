//! Transport trait

use std::time::Duration;

use bytes::Bytes;

use crate::error::TransportError;

/// Blocking, message-oriented duplex connection.
///
/// Each `send` delivers one complete message and each successful `recv`
/// yields one complete message, in the order the peer sent them.
pub trait Transport {
    /// Send one message without waiting for any acknowledgement
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError>;

    /// Wait up to `timeout` for the next message.
    ///
    /// Returns `TransportError::Timeout` if nothing arrived in time.
    fn recv(&mut self, timeout: Duration) -> Result<Bytes, TransportError>;

    /// Close the connection. Closing twice is not an error.
    fn close(&mut self) -> Result<(), TransportError>;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        (**self).recv(timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}

impl<T: Transport + ?Sized> Transport for &mut T {
    fn send(&mut self, data: &[u8]) -> Result<(), TransportError> {
        (**self).send(data)
    }

    fn recv(&mut self, timeout: Duration) -> Result<Bytes, TransportError> {
        (**self).recv(timeout)
    }

    fn close(&mut self) -> Result<(), TransportError> {
        (**self).close()
    }
}
