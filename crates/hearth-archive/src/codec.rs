//! Primary document codecs.
//!
//! The document entry is either CBOR ([`BinaryCodec`]) or an XML element
//! tree ([`XmlCodec`]). Both go through serde; content fields appear as
//! whatever [`hearth_core::ContentRef`] the writer substituted.

use std::io::{Read, Write};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::{ArchiveError, Result};
use crate::xml;

/// Entry name of the binary document.
pub const BINARY_ENTRY: &str = "Home";

/// Entry name of the XML document.
pub const XML_ENTRY: &str = "Home.xml";

/// Encoding of the primary document entry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CodecKind {
    #[default]
    Binary,
    Xml,
}

impl CodecKind {
    pub fn entry_name(self) -> &'static str {
        match self {
            CodecKind::Binary => BINARY_ENTRY,
            CodecKind::Xml => XML_ENTRY,
        }
    }

    /// The codec stored under `entry`, if any.
    pub fn for_entry(entry: &str) -> Option<Self> {
        match entry {
            BINARY_ENTRY => Some(CodecKind::Binary),
            XML_ENTRY => Some(CodecKind::Xml),
            _ => None,
        }
    }

    pub fn encode<D: Serialize, W: Write>(self, document: &D, writer: W) -> Result<()> {
        match self {
            CodecKind::Binary => BinaryCodec.encode(document, writer),
            CodecKind::Xml => XmlCodec.encode(document, writer),
        }
    }

    pub fn decode<D: DeserializeOwned, R: Read>(self, reader: R) -> Result<D> {
        match self {
            CodecKind::Binary => BinaryCodec.decode(reader),
            CodecKind::Xml => XmlCodec.decode(reader),
        }
    }
}

/// Serializes a document graph to and from a document entry.
pub trait DocumentCodec {
    fn kind(&self) -> CodecKind;

    fn encode<D: Serialize, W: Write>(&self, document: &D, writer: W) -> Result<()>;

    fn decode<D: DeserializeOwned, R: Read>(&self, reader: R) -> Result<D>;
}

/// CBOR encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct BinaryCodec;

impl DocumentCodec for BinaryCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Binary
    }

    fn encode<D: Serialize, W: Write>(&self, document: &D, writer: W) -> Result<()> {
        ciborium::into_writer(document, writer).map_err(|e| ArchiveError::Encoding(e.to_string()))
    }

    fn decode<D: DeserializeOwned, R: Read>(&self, reader: R) -> Result<D> {
        ciborium::from_reader(reader).map_err(|e| ArchiveError::Decoding(e.to_string()))
    }
}

/// XML element tree encoding.
#[derive(Clone, Copy, Debug, Default)]
pub struct XmlCodec;

impl DocumentCodec for XmlCodec {
    fn kind(&self) -> CodecKind {
        CodecKind::Xml
    }

    fn encode<D: Serialize, W: Write>(&self, document: &D, writer: W) -> Result<()> {
        let value = ciborium::value::Value::serialized(document).map_err(|e| ArchiveError::Encoding(e.to_string()))?;
        xml::write_document(&value, writer)
    }

    fn decode<D: DeserializeOwned, R: Read>(&self, reader: R) -> Result<D> {
        let value = xml::read_document(reader)?;
        value.deserialized().map_err(|e| ArchiveError::Decoding(e.to_string()))
    }
}
