use std::io::{self, Read, Write};

/// msb-first bit writer over a byte sink
pub struct BitWriter<W: Write> {
    inner: W,
    acc: u8,
    used: u8,
    bits: u64,
}

impl<W: Write> BitWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            acc: 0,
            used: 0,
            bits: 0,
        }
    }

    pub fn write_bit(&mut self, bit: bool) -> io::Result<()> {
        self.acc = (self.acc << 1) | bit as u8;
        self.used += 1;
        self.bits += 1;
        if self.used == 8 {
            self.inner.write_all(&[self.acc])?;
            self.acc = 0;
            self.used = 0;
        }
        Ok(())
    }

    /// pad the trailing partial byte with zero bits and flush
    ///
    /// returns the number of data bits written, excluding padding.
    pub fn finish(mut self) -> io::Result<u64> {
        if self.used > 0 {
            let padded = self.acc << (8 - self.used);
            self.inner.write_all(&[padded])?;
        }
        self.inner.flush()?;
        Ok(self.bits)
    }
}

/// msb-first bit reader over a byte source
pub struct BitReader<R: Read> {
    inner: R,
    acc: u8,
    left: u8,
}

impl<R: Read> BitReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            acc: 0,
            left: 0,
        }
    }

    /// next bit, or None once the underlying stream is exhausted
    pub fn read_bit(&mut self) -> io::Result<Option<bool>> {
        if self.left == 0 {
            let mut byte = [0u8; 1];
            loop {
                match self.inner.read(&mut byte) {
                    Ok(0) => return Ok(None),
                    Ok(_) => break,
                    Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                    Err(e) => return Err(e),
                }
            }
            self.acc = byte[0];
            self.left = 8;
        }
        self.left -= 1;
        Ok(Some((self.acc >> self.left) & 1 == 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_full_byte() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        for bit in [true, true, false, false, true, false, true, true] {
            w.write_bit(bit).unwrap();
        }
        let bits = w.finish().unwrap();
        assert_eq!(bits, 8);
        assert_eq!(out, vec![0xcb]);
    }

    #[test]
    fn test_partial_byte_is_zero_padded() {
        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        for bit in [true, false, true] {
            w.write_bit(bit).unwrap();
        }
        let bits = w.finish().unwrap();
        assert_eq!(bits, 3);
        assert_eq!(out, vec![0b1010_0000]);
    }

    #[test]
    fn test_empty_writer_emits_nothing() {
        let mut out = Vec::new();
        let w = BitWriter::new(&mut out);
        assert_eq!(w.finish().unwrap(), 0);
        assert!(out.is_empty());
    }

    #[test]
    fn test_reader_msb_first() {
        let data: &[u8] = &[0xcb]; // 1100 1011
        let mut r = BitReader::new(data);
        let expected = [true, true, false, false, true, false, true, true];
        for bit in expected {
            assert_eq!(r.read_bit().unwrap(), Some(bit));
        }
        assert_eq!(r.read_bit().unwrap(), None);
    }

    #[test]
    fn test_roundtrip() {
        let pattern: Vec<bool> = (0..21).map(|i| i % 3 == 0).collect();

        let mut out = Vec::new();
        let mut w = BitWriter::new(&mut out);
        for &bit in &pattern {
            w.write_bit(bit).unwrap();
        }
        w.finish().unwrap();

        let mut r = BitReader::new(&out[..]);
        for &bit in &pattern {
            assert_eq!(r.read_bit().unwrap(), Some(bit));
        }
    }
}
