/// File mode of a tree entry
///
/// Only the five modes git writes are accepted. Anything else found in a
/// tree is malformed input and aborts the merge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum EntryMode {
    Regular,
    Executable,
    Symlink,
    Submodule,
    Directory,
}

/// Coarse kind of an entry; a change of kind is a type change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    File,
    Symlink,
    Submodule,
    Directory,
}

impl EntryMode {
    pub fn as_octal(&self) -> &'static str {
        match self {
            EntryMode::Regular => "100644",
            EntryMode::Executable => "100755",
            EntryMode::Symlink => "120000",
            EntryMode::Submodule => "160000",
            EntryMode::Directory => "40000",
        }
    }

    /// Parse an octal mode as written in tree objects
    ///
    /// `040000` is accepted as an alias of `40000`.
    pub fn parse(octal: &str) -> Option<Self> {
        match octal {
            "100644" => Some(EntryMode::Regular),
            "100755" => Some(EntryMode::Executable),
            "120000" => Some(EntryMode::Symlink),
            "160000" => Some(EntryMode::Submodule),
            "40000" | "040000" => Some(EntryMode::Directory),
            _ => None,
        }
    }

    pub fn kind(&self) -> EntryKind {
        match self {
            EntryMode::Regular | EntryMode::Executable => EntryKind::File,
            EntryMode::Symlink => EntryKind::Symlink,
            EntryMode::Submodule => EntryKind::Submodule,
            EntryMode::Directory => EntryKind::Directory,
        }
    }

    pub fn is_tree(&self) -> bool {
        matches!(self, EntryMode::Directory)
    }
}

impl std::fmt::Display for EntryMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_octal())
    }
}
