//! Little-endian byte reader/writer shared by the wire messages.
//!
//! The codec only moves bytes around; it never decompresses points or does
//! any other cryptographic work.

use crate::error::{PsiError, Result};

/// Wire format version written at the start of every message.
pub const FORMAT_VERSION: u8 = 1;

/// Message kind tag following the version byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum MessageKind {
    Request = 1,
    Response = 2,
    Setup = 3,
}

impl MessageKind {
    fn name(self) -> &'static str {
        match self {
            MessageKind::Request => "request",
            MessageKind::Response => "response",
            MessageKind::Setup => "setup",
        }
    }
}

/// Append-only buffer for encoding messages.
#[derive(Debug, Default)]
pub struct Writer {
    buf: Vec<u8>,
}

impl Writer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: Vec::with_capacity(capacity),
        }
    }

    /// Start a message with the version and kind bytes.
    pub fn header(&mut self, kind: MessageKind) {
        self.put_u8(FORMAT_VERSION);
        self.put_u8(kind as u8);
    }

    pub fn put_u8(&mut self, value: u8) {
        self.buf.push(value);
    }

    pub fn put_u32(&mut self, value: u32) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u64(&mut self, value: u64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_u128(&mut self, value: u128) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_f64(&mut self, value: f64) {
        self.buf.extend_from_slice(&value.to_le_bytes());
    }

    pub fn put_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

/// Cursor over a received buffer. Every read fails with
/// `PsiError::MalformedMessage` instead of panicking on short input.
#[derive(Debug)]
pub struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    /// Read and check the version and kind bytes.
    pub fn header(&mut self, expected: MessageKind) -> Result<()> {
        let version = self.u8("format version")?;
        if version != FORMAT_VERSION {
            return Err(PsiError::malformed(format!(
                "unsupported format version {} (expected {})",
                version, FORMAT_VERSION
            )));
        }
        let kind = self.u8("message kind")?;
        if kind != expected as u8 {
            return Err(PsiError::malformed(format!(
                "expected a {} message, found kind tag {}",
                expected.name(),
                kind
            )));
        }
        Ok(())
    }

    pub fn take(&mut self, len: usize, what: &str) -> Result<&'a [u8]> {
        if self.remaining() < len {
            return Err(PsiError::malformed(format!(
                "truncated while reading {}: need {} bytes, {} left",
                what,
                len,
                self.remaining()
            )));
        }
        let bytes = &self.buf[self.pos..self.pos + len];
        self.pos += len;
        Ok(bytes)
    }

    pub fn array<const N: usize>(&mut self, what: &str) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N, what)?);
        Ok(out)
    }

    pub fn u8(&mut self, what: &str) -> Result<u8> {
        Ok(self.array::<1>(what)?[0])
    }

    pub fn u32(&mut self, what: &str) -> Result<u32> {
        Ok(u32::from_le_bytes(self.array(what)?))
    }

    pub fn u64(&mut self, what: &str) -> Result<u64> {
        Ok(u64::from_le_bytes(self.array(what)?))
    }

    pub fn u128(&mut self, what: &str) -> Result<u128> {
        Ok(u128::from_le_bytes(self.array(what)?))
    }

    pub fn f64(&mut self, what: &str) -> Result<f64> {
        Ok(f64::from_le_bytes(self.array(what)?))
    }

    /// Read `count` fixed-width items, checking the declared count against the
    /// bytes actually present before allocating anything.
    pub fn fixed_items<const N: usize>(&mut self, count: usize, what: &str) -> Result<Vec<[u8; N]>> {
        let needed = count
            .checked_mul(N)
            .ok_or_else(|| PsiError::malformed(format!("{} count {} overflows", what, count)))?;
        if needed > self.remaining() {
            return Err(PsiError::malformed(format!(
                "declared {} {} ({} bytes) but only {} bytes left",
                count,
                what,
                needed,
                self.remaining()
            )));
        }
        (0..count).map(|_| self.array::<N>(what)).collect()
    }

    /// Fail if any bytes are left over.
    pub fn finish(self) -> Result<()> {
        if self.remaining() != 0 {
            return Err(PsiError::malformed(format!(
                "{} trailing bytes after message",
                self.remaining()
            )));
        }
        Ok(())
    }
}
