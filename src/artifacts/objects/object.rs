use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::commit::Commit;
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::object_type::ObjectType;
use crate::artifacts::objects::tree::Tree;
use anyhow::Result;
use bytes::Bytes;
use std::io::{BufRead, Cursor, Write};

pub trait Packable {
    /// Serialize the object body (without the `<type> <size>\0` header)
    fn serialize_body(&self) -> Result<Vec<u8>>;

    /// Serialize the full loose-object form, header included
    fn serialize(&self) -> Result<Bytes>
    where
        Self: Object,
    {
        let body = self.serialize_body()?;

        let mut object_bytes = Vec::with_capacity(body.len() + 16);
        write!(object_bytes, "{} {}\0", self.object_type().as_str(), body.len())?;
        object_bytes.write_all(&body)?;

        Ok(Bytes::from(object_bytes))
    }
}

pub trait Unpackable {
    /// Parse an object body; the header has already been consumed
    fn deserialize(reader: impl BufRead) -> Result<Self>
    where
        Self: Sized;
}

pub trait Object: Packable {
    fn object_type(&self) -> ObjectType;

    fn object_id(&self) -> Result<ObjectId>
    where
        Self: Sized,
    {
        Ok(ObjectId::hash(&self.serialize()?))
    }
}

#[derive(Debug, Clone)]
pub enum ObjectBox {
    Blob(Box<Blob>),
    Tree(Box<Tree>),
    Commit(Box<Commit>),
}

impl ObjectBox {
    /// Parse a full loose object (header + body)
    pub fn parse(serialized: &[u8]) -> Result<Self> {
        let mut reader = Cursor::new(serialized);
        let (object_type, size) = ObjectType::parse_header(&mut reader)?;

        let body_len = serialized.len() - reader.position() as usize;
        if body_len != size {
            return Err(anyhow::anyhow!(
                "object size mismatch: header says {}, body has {}",
                size,
                body_len
            ));
        }

        Ok(match object_type {
            ObjectType::Blob => ObjectBox::Blob(Box::new(Blob::deserialize(reader)?)),
            ObjectType::Tree => ObjectBox::Tree(Box::new(Tree::deserialize(reader)?)),
            ObjectType::Commit => ObjectBox::Commit(Box::new(Commit::deserialize(reader)?)),
        })
    }

    pub fn object_type(&self) -> ObjectType {
        match self {
            ObjectBox::Blob(_) => ObjectType::Blob,
            ObjectBox::Tree(_) => ObjectType::Tree,
            ObjectBox::Commit(_) => ObjectType::Commit,
        }
    }
}
