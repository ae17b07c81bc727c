//! Transaction byte codec (BCS-style, little-endian).
//!
//! Layout:
//!   version:u8 | sender:[u8;32] | module_address:[u8;32] | module_name:str
//!   | function_name:str | type_args:vec<str> | args:vec<bytes> | fee_payer:option<[u8;32]>
//!
//! `str` and `bytes` are ULEB128 length-prefixed; `vec<T>` is a ULEB128 count
//! followed by the items; `option<T>` is a 0/1 tag byte. Each argument is the
//! encoding of its value (addresses as 32 bytes, u64 as 8 LE bytes).
//!
//! The signing digest is SHA-256 over `DIGEST_PREFIX || bytes`.

use sha2::{Digest, Sha256};
use smoothsend_types::{address_to_bytes, bytes_to_hex, ADDRESS_LENGTH};
use thiserror::Error;

use crate::{EntryFunctionId, MoveArg, UnsignedTransaction};

pub const CODEC_VERSION: u8 = 1;
pub const DIGEST_PREFIX: &[u8] = b"SMOOTHSEND::UnsignedTransaction";

const ARG_TAG_ADDRESS: u8 = 0;
const ARG_TAG_U64: u8 = 1;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    #[error("unexpected end of input at offset {0}")]
    UnexpectedEof(usize),
    #[error("unsupported codec version {0}")]
    UnsupportedVersion(u8),
    #[error("invalid tag {tag} at offset {offset}")]
    InvalidTag { tag: u8, offset: usize },
    #[error("invalid utf-8 string at offset {0}")]
    InvalidUtf8(usize),
    #[error("length prefix overflow at offset {0}")]
    LengthOverflow(usize),
    #[error("invalid address: {0}")]
    InvalidAddress(String),
    #[error("{0} trailing bytes")]
    TrailingBytes(usize),
}

/// Encode a transaction to its canonical bytes.
pub fn encode(tx: &UnsignedTransaction) -> Result<Vec<u8>, CodecError> {
    let mut out = Vec::with_capacity(256);
    out.push(CODEC_VERSION);
    put_address(&mut out, &tx.sender)?;
    put_address(&mut out, &tx.function.module_address)?;
    put_str(&mut out, &tx.function.module_name);
    put_str(&mut out, &tx.function.function_name);

    put_uleb128(&mut out, tx.type_arguments.len() as u64);
    for ty in &tx.type_arguments {
        put_str(&mut out, ty);
    }

    put_uleb128(&mut out, tx.arguments.len() as u64);
    for arg in &tx.arguments {
        let mut value = Vec::with_capacity(ADDRESS_LENGTH + 1);
        match arg {
            MoveArg::Address(addr) => {
                value.push(ARG_TAG_ADDRESS);
                put_address(&mut value, addr)?;
            }
            MoveArg::U64(v) => {
                value.push(ARG_TAG_U64);
                value.extend_from_slice(&v.to_le_bytes());
            }
        }
        put_bytes(&mut out, &value);
    }

    match &tx.fee_payer {
        Some(addr) => {
            out.push(1);
            put_address(&mut out, addr)?;
        }
        None => out.push(0),
    }

    Ok(out)
}

/// Decode canonical bytes back into a transaction.
pub fn decode(data: &[u8]) -> Result<UnsignedTransaction, CodecError> {
    let mut r = Reader { data, pos: 0 };

    let version = r.u8()?;
    if version != CODEC_VERSION {
        return Err(CodecError::UnsupportedVersion(version));
    }
    let sender = r.address()?;
    let module_address = r.address()?;
    let module_name = r.string()?;
    let function_name = r.string()?;

    let n_types = r.uleb128()?;
    let mut type_arguments = Vec::new();
    for _ in 0..n_types {
        type_arguments.push(r.string()?);
    }

    let n_args = r.uleb128()?;
    let mut arguments = Vec::new();
    for _ in 0..n_args {
        let start = r.pos;
        let value = r.bytes()?;
        let mut inner = Reader { data: value, pos: 0 };
        let arg = match inner.u8()? {
            ARG_TAG_ADDRESS => MoveArg::Address(inner.address()?),
            ARG_TAG_U64 => MoveArg::U64(inner.u64()?),
            tag => return Err(CodecError::InvalidTag { tag, offset: start }),
        };
        if inner.remaining() != 0 {
            return Err(CodecError::TrailingBytes(inner.remaining()));
        }
        arguments.push(arg);
    }

    let tag_offset = r.pos;
    let fee_payer = match r.u8()? {
        0 => None,
        1 => Some(r.address()?),
        tag => return Err(CodecError::InvalidTag { tag, offset: tag_offset }),
    };

    if r.remaining() != 0 {
        return Err(CodecError::TrailingBytes(r.remaining()));
    }

    Ok(UnsignedTransaction {
        sender,
        function: EntryFunctionId {
            module_address,
            module_name,
            function_name,
        },
        type_arguments,
        arguments,
        fee_payer,
    })
}

/// SHA-256 signing digest over the domain prefix and the encoded bytes.
pub fn signing_digest(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(DIGEST_PREFIX);
    hasher.update(bytes);
    hasher.finalize().into()
}

/// Encode a transaction to a 0x-prefixed hex string.
pub fn encode_hex(tx: &UnsignedTransaction) -> Result<String, CodecError> {
    Ok(bytes_to_hex(&encode(tx)?))
}

fn put_uleb128(out: &mut Vec<u8>, mut value: u64) {
    loop {
        let byte = (value & 0x7f) as u8;
        value >>= 7;
        if value == 0 {
            out.push(byte);
            return;
        }
        out.push(byte | 0x80);
    }
}

fn put_bytes(out: &mut Vec<u8>, bytes: &[u8]) {
    put_uleb128(out, bytes.len() as u64);
    out.extend_from_slice(bytes);
}

fn put_str(out: &mut Vec<u8>, s: &str) {
    put_bytes(out, s.as_bytes());
}

fn put_address(out: &mut Vec<u8>, addr: &str) -> Result<(), CodecError> {
    let bytes = address_to_bytes(addr).map_err(|_| CodecError::InvalidAddress(addr.to_string()))?;
    out.extend_from_slice(&bytes);
    Ok(())
}

struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn remaining(&self) -> usize {
        self.data.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], CodecError> {
        if self.remaining() < n {
            return Err(CodecError::UnexpectedEof(self.pos));
        }
        let slice = &self.data[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, CodecError> {
        Ok(self.take(1)?[0])
    }

    fn u64(&mut self) -> Result<u64, CodecError> {
        let mut buf = [0u8; 8];
        buf.copy_from_slice(self.take(8)?);
        Ok(u64::from_le_bytes(buf))
    }

    fn uleb128(&mut self) -> Result<u64, CodecError> {
        let start = self.pos;
        let mut value = 0u64;
        for shift in (0..64).step_by(7) {
            let byte = self.u8()?;
            let low = (byte & 0x7f) as u64;
            if shift == 63 && low > 1 {
                return Err(CodecError::LengthOverflow(start));
            }
            value |= low << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
        }
        Err(CodecError::LengthOverflow(start))
    }

    fn bytes(&mut self) -> Result<&'a [u8], CodecError> {
        let start = self.pos;
        let len = usize::try_from(self.uleb128()?).map_err(|_| CodecError::LengthOverflow(start))?;
        self.take(len)
    }

    fn string(&mut self) -> Result<String, CodecError> {
        let start = self.pos;
        let raw = self.bytes()?;
        String::from_utf8(raw.to_vec()).map_err(|_| CodecError::InvalidUtf8(start))
    }

    fn address(&mut self) -> Result<String, CodecError> {
        Ok(bytes_to_hex(self.take(ADDRESS_LENGTH)?))
    }
}
