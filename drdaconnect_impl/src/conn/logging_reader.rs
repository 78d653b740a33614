use std::io::Read;

// Counts the bytes of one reply chain, and dumps them when dropped.
pub(crate) struct LoggingReader<'a> {
    buf: Vec<u8>,
    given_out: u64,
    inner: &'a mut dyn Read,
}
impl<'a> LoggingReader<'a> {
    pub(crate) fn new(r: &'a mut dyn Read) -> LoggingReader<'a> {
        LoggingReader {
            buf: Vec::new(),
            given_out: 0,
            inner: r,
        }
    }

    pub(crate) fn given_out(&self) -> u64 {
        self.given_out
    }
}
impl<'a> std::fmt::Debug for LoggingReader<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "LoggingReader({} bytes read)", self.given_out)
    }
}
impl<'a> Read for LoggingReader<'a> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        if log_enabled!(log::Level::Trace) {
            self.buf.extend_from_slice(&buf[0..n]);
        }
        self.given_out += n as u64;
        Ok(n)
    }
}

impl<'a> Drop for LoggingReader<'a> {
    fn drop(&mut self) {
        if !self.buf.is_empty() {
            trace!(
                "FROM THE WIRE: {} bytes |{}|",
                self.buf.len(),
                self.buf
                    .iter()
                    .map(|b| format!("{b:02x} "))
                    .collect::<String>()
            );
        }
    }
}
