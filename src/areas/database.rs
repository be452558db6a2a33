use crate::areas::store::ObjectStore;
use crate::artifacts::objects::object_id::ObjectId;
use crate::errors::{MergeError, MergeResult};
use bytes::Bytes;
use fake::rand;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

/// Loose-object database (`<git-dir>/objects`)
///
/// Objects are zlib-compressed and written through a temporary file that is
/// renamed into place, so readers never observe a half-written object.
#[derive(Debug)]
pub struct Database {
    path: Box<Path>,
}

// TODO: read packfiles so merges work on repositories after `git gc`
impl Database {
    pub fn new(path: Box<Path>) -> Self {
        Database { path }
    }

    pub fn objects_path(&self) -> &Path {
        &self.path
    }

    fn read_object(&self, object_id: &ObjectId, object_path: PathBuf) -> MergeResult<Bytes> {
        let object_content = match std::fs::read(&object_path) {
            Ok(content) => content,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(MergeError::ObjectNotFound(object_id.clone()));
            }
            Err(err) => return Err(err.into()),
        };

        Self::decompress(object_content.into())
            .map_err(|err| MergeError::malformed(object_id, err))
    }

    fn write_object(&self, object_path: PathBuf, object_content: Bytes) -> MergeResult<()> {
        let object_dir = object_path.parent().ok_or_else(|| {
            std::io::Error::other(format!("Invalid object path {}", object_path.display()))
        })?;
        std::fs::create_dir_all(object_dir)?;
        let temp_object_path = object_dir.join(Self::generate_temp_name());

        let object_content = Self::compress(object_content)?;

        let file = std::fs::OpenOptions::new()
            .read(true)
            .write(true)
            .create_new(true)
            .open(&temp_object_path)?;

        // rename the temp file to the object file to make it atomic
        let written = Self::fill(file, &object_content)
            .and_then(|()| std::fs::rename(&temp_object_path, &object_path));
        if let Err(err) = written {
            if let Err(cleanup) = std::fs::remove_file(&temp_object_path) {
                tracing::warn!(
                    path = %temp_object_path.display(),
                    %cleanup,
                    "temp object left behind"
                );
            }
            return Err(err.into());
        }

        Ok(())
    }

    fn fill(mut file: std::fs::File, content: &[u8]) -> std::io::Result<()> {
        file.write_all(content)?;
        file.sync_all()
    }

    fn compress(data: Bytes) -> std::io::Result<Bytes> {
        let mut encoder =
            flate2::write::ZlibEncoder::new(Vec::new(), flate2::Compression::default());
        encoder.write_all(&data)?;

        encoder
            .finish()
            .map(|compressed_content| compressed_content.into())
    }

    fn decompress(data: Bytes) -> std::io::Result<Bytes> {
        let mut decoder = flate2::read::ZlibDecoder::new(&*data);
        let mut decompressed_content = Vec::new();
        decoder.read_to_end(&mut decompressed_content)?;

        Ok(decompressed_content.into())
    }

    fn generate_temp_name() -> String {
        format!("tmp-obj-{}", rand::random::<u32>())
    }
}

impl ObjectStore for Database {
    fn load(&self, oid: &ObjectId) -> MergeResult<Bytes> {
        self.read_object(oid, self.path.join(oid.to_path()))
    }

    fn store(&self, oid: &ObjectId, serialized: Bytes) -> MergeResult<()> {
        let object_path = self.path.join(oid.to_path());

        // write the object to disk unless it already exists
        if !object_path.exists() {
            tracing::trace!(%oid, "writing loose object");
            self.write_object(object_path, serialized)?;
        }

        Ok(())
    }

    fn contains(&self, oid: &ObjectId) -> MergeResult<bool> {
        Ok(self.path.join(oid.to_path()).exists())
    }
}
