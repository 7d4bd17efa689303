//! Binary envelope stored in the remote repository.
//!
//! Layout (all lengths little-endian `u16`):
//!
//! ```text
//! keyHashLen | nonceHashLen | encFilenameLen | keyHash | nonceHash | encFilename | encFileContent
//! ```
//!
//! The content length is implicit: everything after the filename up to the
//! end of the buffer. There is no version tag.

use gitbox_common::{Error, Result};

/// Size of the fixed length header.
pub const HEADER_SIZE: usize = 6;

/// Decoded envelope fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    /// Hash of the secret key.
    pub key_hash: Vec<u8>,
    /// Hash of the secret nonce.
    pub nonce_hash: Vec<u8>,
    /// Encrypted UTF-8 filename.
    pub enc_filename: Vec<u8>,
    /// Encrypted file content.
    pub enc_content: Vec<u8>,
}

impl Envelope {
    /// Serialize to the wire layout.
    ///
    /// # Errors
    /// - `InvalidInput` if a length-prefixed field exceeds `u16::MAX` bytes
    pub fn encode(&self) -> Result<Vec<u8>> {
        let key_hash_len = field_len("key hash", &self.key_hash)?;
        let nonce_hash_len = field_len("nonce hash", &self.nonce_hash)?;
        let filename_len = field_len("encrypted filename", &self.enc_filename)?;

        let mut out = Vec::with_capacity(
            HEADER_SIZE
                + self.key_hash.len()
                + self.nonce_hash.len()
                + self.enc_filename.len()
                + self.enc_content.len(),
        );
        out.extend_from_slice(&key_hash_len.to_le_bytes());
        out.extend_from_slice(&nonce_hash_len.to_le_bytes());
        out.extend_from_slice(&filename_len.to_le_bytes());
        out.extend_from_slice(&self.key_hash);
        out.extend_from_slice(&self.nonce_hash);
        out.extend_from_slice(&self.enc_filename);
        out.extend_from_slice(&self.enc_content);
        Ok(out)
    }

    /// Parse the wire layout.
    ///
    /// # Errors
    /// - `TruncatedEnvelope` if the buffer is shorter than the header plus the
    ///   three declared field lengths
    pub fn decode(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE {
            return Err(Error::TruncatedEnvelope {
                declared: HEADER_SIZE,
                actual: bytes.len(),
            });
        }

        let key_hash_len = read_u16_le(bytes, 0);
        let nonce_hash_len = read_u16_le(bytes, 2);
        let filename_len = read_u16_le(bytes, 4);

        let key_hash_end = HEADER_SIZE + key_hash_len;
        let nonce_hash_end = key_hash_end + nonce_hash_len;
        let filename_end = nonce_hash_end + filename_len;

        if bytes.len() < filename_end {
            return Err(Error::TruncatedEnvelope {
                declared: filename_end,
                actual: bytes.len(),
            });
        }

        Ok(Self {
            key_hash: bytes[HEADER_SIZE..key_hash_end].to_vec(),
            nonce_hash: bytes[key_hash_end..nonce_hash_end].to_vec(),
            enc_filename: bytes[nonce_hash_end..filename_end].to_vec(),
            enc_content: bytes[filename_end..].to_vec(),
        })
    }
}

fn field_len(field: &str, data: &[u8]) -> Result<u16> {
    u16::try_from(data.len()).map_err(|_| {
        Error::InvalidInput(format!(
            "Envelope {} is {} bytes, at most {} fit the header",
            field,
            data.len(),
            u16::MAX
        ))
    })
}

fn read_u16_le(bytes: &[u8], offset: usize) -> usize {
    u16::from_le_bytes([bytes[offset], bytes[offset + 1]]) as usize
}
