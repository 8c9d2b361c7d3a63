//
// eqdriver - equatorial telescope mount driver core
// Copyright (c) 2026 the eqdriver authors
//
// This project is licensed under the terms of the MIT license
// (see the LICENSE file for details).
//

//!
//! Command channel: framed request/response exchanges over a half-duplex port.
//!

use std::io::{Read, Write};
use thiserror::Error;

/// Upper bound on the length of any single response.
const MAX_RESPONSE_LEN: usize = 1024;

#[derive(Debug, Error)]
pub enum ChannelError {
    #[error("failed to write command to the device: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("timed out waiting for a response")]
    ReadTimeout,

    #[error("malformed response: {0}")]
    Malformed(String),
}

/// What the device is expected to send back after a command.
#[derive(Debug, Clone)]
pub enum Expect {
    /// No response at all.
    Nothing,
    /// Bytes up to and including the given terminator.
    Terminator(u8),
    /// An exact number of bytes.
    ByteCount(usize),
    /// An exact acknowledgement string (commonly a single `1`).
    Ack(&'static [u8]),
}

/// Transport seam: an open, bidirectional byte port with purgeable buffers.
///
/// Implemented for `Box<dyn serialport::SerialPort>`; tests substitute an
/// in-memory port.
pub trait Port: Read + Write + Send {
    fn discard_buffers(&mut self) -> std::io::Result<()>;

    fn set_read_timeout(&mut self, timeout: std::time::Duration) -> std::io::Result<()>;
}

impl Port for Box<dyn serialport::SerialPort> {
    fn discard_buffers(&mut self) -> std::io::Result<()> {
        self.clear(serialport::ClearBuffer::All)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }

    fn set_read_timeout(&mut self, timeout: std::time::Duration) -> std::io::Result<()> {
        self.set_timeout(timeout)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))
    }
}

/// Opens a serial device with the line settings common to the supported mounts.
///
/// # Parameters
///
/// * `device` - System device name, e.g., "COM3" on Windows or "/dev/ttyUSB0" on Linux.
///
pub fn open_serial(device: &str, baud_rate: u32) -> serialport::Result<Box<dyn serialport::SerialPort>> {
    serialport::new(device, baud_rate)
        .data_bits(serialport::DataBits::Eight)
        .flow_control(serialport::FlowControl::None)
        .parity(serialport::Parity::None)
        .stop_bits(serialport::StopBits::One)
        .timeout(std::time::Duration::from_millis(50))
        .open()
}

pub struct Channel<P: Port> {
    port: P
}

impl<P: Port> Channel<P> {
    pub fn new(port: P) -> Channel<P> {
        Channel{ port }
    }

    #[cfg(test)]
    pub(crate) fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    /// Writes a command, expecting no response.
    pub fn send(&mut self, command: &[u8]) -> Result<(), ChannelError> {
        self.exchange(command, Expect::Nothing, std::time::Duration::from_millis(0)).map(|_| ())
    }

    /// Writes a command and reads back the expected response.
    ///
    /// Stale buffered bytes are discarded before the write, and again after a
    /// successful read, so that one partial exchange cannot poison the next.
    /// Exactly one attempt is made; any retry policy belongs to the caller.
    pub fn exchange(
        &mut self,
        command: &[u8],
        expect: Expect,
        timeout: std::time::Duration
    ) -> Result<Vec<u8>, ChannelError> {
        self.port.discard_buffers().map_err(ChannelError::WriteFailed)?;

        self.port.write_all(command).map_err(ChannelError::WriteFailed)?;
        self.port.flush().map_err(ChannelError::WriteFailed)?;

        let expected_len = match &expect {
            Expect::Nothing => return Ok(vec![]),
            Expect::ByteCount(0) => return Ok(vec![]),
            Expect::Ack(chars) if chars.is_empty() => return Ok(vec![]),
            Expect::Terminator(_) => None,
            Expect::ByteCount(num) => Some(*num),
            Expect::Ack(chars) => Some(chars.len()),
        };

        self.port.set_read_timeout(timeout).map_err(ChannelError::WriteFailed)?;

        let mut buf = vec![];
        loop {
            buf.push(0);
            if buf.len() > MAX_RESPONSE_LEN {
                return Err(ChannelError::Malformed("response has too many characters".into()));
            }
            let blen = buf.len();
            if let Err(e) = self.port.read_exact(&mut buf[blen - 1..blen]) {
                return match e.kind() {
                    std::io::ErrorKind::TimedOut | std::io::ErrorKind::WouldBlock =>
                        Err(ChannelError::ReadTimeout),
                    _ => Err(ChannelError::Malformed(format!("read error: {}", e)))
                };
            }

            let complete = match &expect {
                Expect::Terminator(ch) => buf[blen - 1] == *ch,
                _ => Some(buf.len()) == expected_len
            };
            if complete { break; }
        }

        if let Expect::Ack(chars) = &expect {
            if &buf[..] != *chars {
                return Err(ChannelError::Malformed(format!(
                    "expected acknowledgement {:?}, got {:?}",
                    String::from_utf8_lossy(chars), String::from_utf8_lossy(&buf)
                )));
            }
        }

        // leftover bytes (e.g., from an over-long previous reply) must not
        // leak into the next exchange
        self.port.discard_buffers().map_err(ChannelError::WriteFailed)?;

        Ok(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// In-memory port: scripted responses, recorded writes.
    struct MockPort {
        response: Vec<u8>,
        read_pos: usize,
        written: Vec<u8>,
        discard_count: usize
    }

    impl MockPort {
        fn new(response: &[u8]) -> MockPort {
            MockPort{ response: response.to_vec(), read_pos: 0, written: vec![], discard_count: 0 }
        }
    }

    impl Read for MockPort {
        fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
            if self.read_pos >= self.response.len() {
                return Err(std::io::Error::new(std::io::ErrorKind::TimedOut, "no more data"));
            }
            buf[0] = self.response[self.read_pos];
            self.read_pos += 1;
            Ok(1)
        }
    }

    impl Write for MockPort {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.written.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> { Ok(()) }
    }

    impl Port for MockPort {
        fn discard_buffers(&mut self) -> std::io::Result<()> {
            self.discard_count += 1;
            Ok(())
        }

        fn set_read_timeout(&mut self, _: std::time::Duration) -> std::io::Result<()> { Ok(()) }
    }

    fn ms(num: u64) -> std::time::Duration { std::time::Duration::from_millis(num) }

    #[test]
    fn reads_until_terminator() {
        let mut channel = Channel::new(MockPort::new(b"+054321#"));
        let reply = channel.exchange(b":GEC#", Expect::Terminator(b'#'), ms(100)).unwrap();
        assert_eq!(b"+054321#", &reply[..]);
    }

    #[test]
    fn command_is_written_verbatim() {
        let mut channel = Channel::new(MockPort::new(b"1"));
        channel.exchange(b":MS#", Expect::Ack(b"1"), ms(100)).unwrap();
        assert_eq!(b":MS#", &channel.port.written[..]);
    }

    #[test]
    fn buffers_discarded_before_and_after_exchange() {
        let mut channel = Channel::new(MockPort::new(b"1"));
        channel.exchange(b":MS#", Expect::Ack(b"1"), ms(100)).unwrap();
        assert_eq!(2, channel.port.discard_count);
    }

    #[test]
    fn missing_terminator_times_out() {
        let mut channel = Channel::new(MockPort::new(b"+0543"));
        match channel.exchange(b":GEC#", Expect::Terminator(b'#'), ms(100)) {
            Err(ChannelError::ReadTimeout) => (),
            other => panic!("expected ReadTimeout, got {:?}", other.map(|v| v.len()))
        }
    }

    #[test]
    fn wrong_ack_is_malformed() {
        let mut channel = Channel::new(MockPort::new(b"0"));
        assert!(matches!(
            channel.exchange(b":MS#", Expect::Ack(b"1"), ms(100)),
            Err(ChannelError::Malformed(_))
        ));
    }

    #[test]
    fn oversized_response_is_malformed() {
        let mut channel = Channel::new(MockPort::new(&[b'x'; 2000]));
        assert!(matches!(
            channel.exchange(b":GEC#", Expect::Terminator(b'#'), ms(100)),
            Err(ChannelError::Malformed(_))
        ));
    }

    #[test]
    fn nothing_expected_reads_nothing() {
        let mut channel = Channel::new(MockPort::new(b"junk"));
        let reply = channel.exchange(b":Q#", Expect::Nothing, ms(100)).unwrap();
        assert!(reply.is_empty());
        assert_eq!(0, channel.port.read_pos);
    }
}
