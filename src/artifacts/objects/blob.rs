//! Git blob object
//!
//! Blobs store file content. They carry only the raw bytes, without any
//! metadata like filename or permissions (those are stored in trees).
//!
//! ## Format
//!
//! On disk: `blob <size>\0<content>`

use crate::artifacts::objects::object::Unpackable;
use crate::artifacts::objects::object::{Object, Packable};
use crate::artifacts::objects::object_type::ObjectType;
use bytes::Bytes;
use std::io::BufRead;

/// How far into a blob the binary sniffing looks for a NUL byte
pub const BINARY_SNIFF_LENGTH: usize = 8000;

/// Git blob object representing file content
///
/// Content is arbitrary bytes; nothing requires it to be UTF-8.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Blob {
    content: Bytes,
}

impl Blob {
    pub fn new(content: impl Into<Bytes>) -> Self {
        Blob {
            content: content.into(),
        }
    }

    pub fn content(&self) -> &Bytes {
        &self.content
    }

    pub fn into_content(self) -> Bytes {
        self.content
    }

    /// Whether the content looks binary (a NUL byte near the start)
    pub fn is_binary(&self) -> bool {
        is_binary(&self.content)
    }
}

pub fn is_binary(content: &[u8]) -> bool {
    content
        .iter()
        .take(BINARY_SNIFF_LENGTH)
        .any(|&byte| byte == 0)
}

impl Packable for Blob {
    fn serialize_body(&self) -> anyhow::Result<Vec<u8>> {
        Ok(self.content.to_vec())
    }
}

impl Unpackable for Blob {
    fn deserialize(mut reader: impl BufRead) -> anyhow::Result<Self> {
        // the header has already been read
        let mut content = Vec::new();
        reader.read_to_end(&mut content)?;

        Ok(Self::new(content))
    }
}

impl Object for Blob {
    fn object_type(&self) -> ObjectType {
        ObjectType::Blob
    }
}
