use crate::conn::SetReadTimeout;
use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::time::Duration;

pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    pub written_buf: Vec<u8>,
    pub read_timeouts: Vec<Option<Duration>>,
    err_on_read: bool,
    eof_on_read: bool,
    stall_when_drained: bool,
    read_delay: usize,
}

impl Default for MockStream {
    fn default() -> Self {
        MockStream {
            read_buf: Vec::new(),
            read_pos: 0,
            written_buf: Vec::new(),
            read_timeouts: Vec::new(),
            err_on_read: false,
            eof_on_read: false,
            stall_when_drained: false,
            read_delay: 0,
        }
    }
}

impl MockStream {
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(read_buf)
    }

    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    pub fn with_eof(mut self) -> MockStream {
        self.eof_on_read = true;
        self
    }

    pub fn with_err(mut self) -> MockStream {
        self.err_on_read = true;
        self
    }

    /// Once the scripted data runs out, behave like a silent server whose read timeout fired.
    pub fn with_stall(mut self) -> MockStream {
        self.stall_when_drained = true;
        self
    }

    pub fn with_delay(mut self) -> MockStream {
        self.read_delay = 1;
        self
    }

    pub fn written(&self) -> String {
        String::from_utf8_lossy(&self.written_buf).into_owned()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.eof_on_read {
            return Ok(0);
        }
        if self.err_on_read {
            return Err(Error::new(ErrorKind::Other, "MockStream Error"));
        }
        if self.read_pos >= self.read_buf.len() {
            if self.stall_when_drained {
                return Err(Error::new(ErrorKind::WouldBlock, "read timed out"));
            }
            return Ok(0);
        }
        let mut write_len = min(buf.len(), self.read_buf.len() - self.read_pos);
        if self.read_delay > 0 {
            self.read_delay -= 1;
            write_len = min(write_len, 1);
        }
        let max_pos = self.read_pos + write_len;
        buf[..write_len].copy_from_slice(&self.read_buf[self.read_pos..max_pos]);
        self.read_pos += write_len;
        Ok(write_len)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written_buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

impl SetReadTimeout for MockStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> crate::error::Result<()> {
        self.read_timeouts.push(timeout);
        Ok(())
    }
}
