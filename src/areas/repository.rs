use crate::areas::database::Database;
use crate::areas::store::ObjectStore;
use crate::artifacts::objects::object_id::ObjectId;
use anyhow::Context;
use std::cell::{RefCell, RefMut};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Symbolic references followed before giving up
const MAX_SYMREF_DEPTH: usize = 5;

const SYMREF_PREFIX: &str = "ref: ";

pub struct Repository {
    git_dir: Box<Path>,
    writer: RefCell<Box<dyn std::io::Write>>,
    database: Arc<Database>,
}

impl Repository {
    pub fn new(git_dir: &Path, writer: Box<dyn std::io::Write>) -> anyhow::Result<Self> {
        if !git_dir.is_dir() {
            anyhow::bail!("not a git directory: {}", git_dir.display());
        }

        let database = Database::new(git_dir.join("objects").into_boxed_path());

        Ok(Repository {
            git_dir: git_dir.into(),
            writer: RefCell::new(writer),
            database: Arc::new(database),
        })
    }

    pub fn git_dir(&self) -> &Path {
        &self.git_dir
    }

    pub fn writer(&'_ self) -> RefMut<'_, Box<dyn std::io::Write>> {
        self.writer.borrow_mut()
    }

    pub fn database(&self) -> &Database {
        &self.database
    }

    /// The database as a shareable store handle
    pub fn store(&self) -> Arc<dyn ObjectStore> {
        self.database.clone()
    }

    /// Resolve a full object id or a ref name (`HEAD`, `main`,
    /// `refs/heads/main`, `tags/v1`) to a commit id
    ///
    /// Refs are only read, never written.
    pub fn resolve_revision(&self, revision: &str) -> anyhow::Result<ObjectId> {
        if let Ok(oid) = ObjectId::try_parse(revision.to_string()) {
            return Ok(oid);
        }

        let candidates = [
            self.git_dir.join(revision),
            self.git_dir.join("refs").join(revision),
            self.git_dir.join("refs").join("heads").join(revision),
            self.git_dir.join("refs").join("tags").join(revision),
        ];

        for path in candidates {
            if path.is_file() {
                return self
                    .read_ref_file(path, 0)
                    .with_context(|| format!("unable to resolve revision '{}'", revision));
            }
        }

        anyhow::bail!("unknown revision '{}'", revision)
    }

    fn read_ref_file(&self, path: PathBuf, depth: usize) -> anyhow::Result<ObjectId> {
        if depth > MAX_SYMREF_DEPTH {
            anyhow::bail!("too many levels of symbolic refs at {}", path.display());
        }

        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("unable to read ref {}", path.display()))?;
        let content = content.trim();

        match content.strip_prefix(SYMREF_PREFIX) {
            Some(target) => self.read_ref_file(self.git_dir.join(target.trim()), depth + 1),
            None => ObjectId::try_parse(content.to_string()),
        }
    }
}
