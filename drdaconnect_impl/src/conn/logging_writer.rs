use std::io::Write;

// Passes all bytes through to the transport and dumps what was sent on flush.
pub(crate) struct LoggingWriter<'a> {
    buf: Vec<u8>,
    written: usize,
    inner: &'a mut dyn Write,
}
impl<'a> LoggingWriter<'a> {
    pub(crate) fn new(w: &'a mut dyn Write) -> LoggingWriter<'a> {
        LoggingWriter {
            buf: Vec::new(),
            written: 0,
            inner: w,
        }
    }
}
impl<'a> std::fmt::Debug for LoggingWriter<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "LoggingWriter({} bytes written)", self.written)
    }
}
impl<'a> Write for LoggingWriter<'a> {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        let n = self.inner.write(buf)?;
        if log_enabled!(log::Level::Trace) {
            self.buf.extend_from_slice(&buf[0..n]);
        }
        self.written += n;
        Ok(n)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if !self.buf.is_empty() {
            trace!(
                "TO THE WIRE: {} bytes |{}|",
                self.buf.len(),
                self.buf
                    .iter()
                    .map(|b| format!("{b:02x} "))
                    .collect::<String>()
            );
            self.buf.clear();
        }
        self.inner.flush()
    }
}

#[cfg(test)]
mod test {
    use byteorder::{BigEndian, WriteBytesExt};
    use std::io::Write;

    #[test]
    fn test_logging_writer() {
        let mut dumbuf = Vec::<u8>::new();
        {
            let mut lw = super::LoggingWriter::new(&mut dumbuf);
            lw.write_u16::<BigEndian>(0x0006_u16).unwrap();
            lw.write_all(&[0xD0, 0x01, 0x00, 0x01]).unwrap();
            lw.flush().unwrap();
            assert_eq!(lw.written, 6);
        }
        assert_eq!(dumbuf, vec![0x00, 0x06, 0xD0, 0x01, 0x00, 0x01]);
    }
}
