//! Binary body codec.
//!
//! Layout of every body: `op:u32 | query_id:u64 | fields...`, big-endian.
//! Field encodings:
//!
//! | Field    | Encoding                       |
//! |----------|--------------------------------|
//! | coins    | `u64`                          |
//! | address  | `workchain:i8 ‖ hash:[u8; 32]` |
//! | blob     | `len:u32 ‖ bytes`              |

use bytes::{Buf, BufMut, Bytes, BytesMut};
use thiserror::Error;

use crate::address::{Address, ADDRESS_HASH_LENGTH};
use crate::Coins;

/// Encoded size of an address.
pub const ADDRESS_WIRE_SIZE: usize = 1 + ADDRESS_HASH_LENGTH;

/// Errors from decoding a message body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// The body ended before a field was complete.
    #[error("truncated body: {field} needs {needed} bytes, {available} left")]
    Truncated {
        /// Field being read.
        field: &'static str,
        /// Bytes the field needs.
        needed: usize,
        /// Bytes left in the body.
        available: usize,
    },

    /// The opcode is not one the reader understands.
    #[error("unknown opcode 0x{0:08x}")]
    UnknownOpcode(u32),

    /// A length-prefixed blob exceeds its limit.
    #[error("payload too large: {size} bytes (max {max})")]
    PayloadTooLarge {
        /// Declared size.
        size: usize,
        /// Allowed maximum.
        max: usize,
    },

    /// Bytes left over after the last field.
    #[error("{0} trailing bytes after message body")]
    TrailingBytes(usize),

    /// A body flagged as bounced does not carry the bounce prefix.
    #[error("bounced body does not start with 0xffffffff")]
    BadBouncePrefix,
}

/// Builder for message bodies.
#[derive(Debug)]
pub struct BodyWriter {
    buf: BytesMut,
}

impl BodyWriter {
    /// Starts a body with its opcode and query id.
    pub fn new(op: u32, query_id: u64) -> Self {
        let mut buf = BytesMut::with_capacity(64);
        buf.put_u32(op);
        buf.put_u64(query_id);
        Self { buf }
    }

    /// Starts a body without the standard header.
    pub fn raw() -> Self {
        Self {
            buf: BytesMut::new(),
        }
    }

    /// Appends a bare `u32`.
    pub fn u32(mut self, value: u32) -> Self {
        self.buf.put_u32(value);
        self
    }

    /// Appends a bare `u64`.
    pub fn u64(mut self, value: u64) -> Self {
        self.buf.put_u64(value);
        self
    }

    /// Appends a coin amount.
    pub fn coins(self, value: Coins) -> Self {
        self.u64(value)
    }

    /// Appends an address.
    pub fn address(mut self, address: &Address) -> Self {
        self.buf.put_i8(address.workchain);
        self.buf.put_slice(&address.hash);
        self
    }

    /// Appends a length-prefixed blob.
    pub fn blob(mut self, data: &[u8]) -> Self {
        // Blobs are bounded by MAX_CODE_SIZE long before u32 overflows.
        self.buf.put_u32(data.len() as u32);
        self.buf.put_slice(data);
        self
    }

    /// Appends raw bytes with no length prefix.
    pub fn bytes(mut self, data: &[u8]) -> Self {
        self.buf.put_slice(data);
        self
    }

    /// Freezes the body.
    pub fn finish(self) -> Bytes {
        self.buf.freeze()
    }
}

/// Cursor over a message body.
#[derive(Debug)]
pub struct BodyReader<'a> {
    buf: &'a [u8],
}

impl<'a> BodyReader<'a> {
    /// Wraps a body.
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf }
    }

    /// Bytes not yet consumed.
    pub fn remaining(&self) -> usize {
        self.buf.len()
    }

    fn ensure(&self, field: &'static str, needed: usize) -> Result<(), CodecError> {
        if self.remaining() < needed {
            return Err(CodecError::Truncated {
                field,
                needed,
                available: self.remaining(),
            });
        }
        Ok(())
    }

    /// Reads a `u32`.
    pub fn u32(&mut self, field: &'static str) -> Result<u32, CodecError> {
        self.ensure(field, 4)?;
        Ok(self.buf.get_u32())
    }

    /// Reads a `u64`.
    pub fn u64(&mut self, field: &'static str) -> Result<u64, CodecError> {
        self.ensure(field, 8)?;
        Ok(self.buf.get_u64())
    }

    /// Reads a coin amount.
    pub fn coins(&mut self, field: &'static str) -> Result<Coins, CodecError> {
        self.u64(field)
    }

    /// Reads an address.
    pub fn address(&mut self, field: &'static str) -> Result<Address, CodecError> {
        self.ensure(field, ADDRESS_WIRE_SIZE)?;
        let workchain = self.buf.get_i8();
        let mut hash = [0u8; ADDRESS_HASH_LENGTH];
        self.buf.copy_to_slice(&mut hash);
        Ok(Address::new(workchain, hash))
    }

    /// Reads a length-prefixed blob of at most `max` bytes.
    pub fn blob(&mut self, field: &'static str, max: usize) -> Result<Bytes, CodecError> {
        let len = self.u32(field)? as usize;
        if len > max {
            return Err(CodecError::PayloadTooLarge { size: len, max });
        }
        self.ensure(field, len)?;
        let data = Bytes::copy_from_slice(&self.buf[..len]);
        self.buf.advance(len);
        Ok(data)
    }

    /// Fails if anything is left unread.
    pub fn finish(self) -> Result<(), CodecError> {
        match self.remaining() {
            0 => Ok(()),
            n => Err(CodecError::TrailingBytes(n)),
        }
    }
}
