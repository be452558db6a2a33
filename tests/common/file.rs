use derive_new::new;
use fake::Fake;
use fake::faker::lorem::en::{Word, Words};
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Eq, PartialEq, new)]
pub struct FileSpec {
    pub path: PathBuf,
    pub content: String,
}

pub fn write_file(file_spec: FileSpec) {
    // make sure the parent directory exists
    if let Some(parent) = file_spec.path.parent() {
        std::fs::create_dir_all(parent)
            .unwrap_or_else(|e| panic!("Failed to create directory {:?}: {}", parent, e));
    }

    std::fs::write(&file_spec.path, &file_spec.content)
        .unwrap_or_else(|e| panic!("Failed to write file {:?}: {}", file_spec.path, e));
}

pub fn read_file(path: &Path) -> String {
    std::fs::read_to_string(path).unwrap_or_else(|e| panic!("Failed to read file {:?}: {}", path, e))
}

/// Random lines of lorem words, newline terminated
pub fn generated_lines(count: usize) -> String {
    (0..count)
        .map(|_| format!("{}\n", Words(3..8).fake::<Vec<String>>().join(" ")))
        .collect()
}

/// A random `<word>.txt` name
pub fn generated_file_name() -> String {
    format!("{}.txt", Word().fake::<String>())
}
