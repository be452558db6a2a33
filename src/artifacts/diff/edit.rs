use derive_new::new;
use std::ops::Range;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EditTag {
    Equal,
    Insert,
    Delete,
    Replace,
}

/// One edit operation over line ranges of the old and new sides
///
/// `Insert` has an empty `old` range positioned where the lines go;
/// `Delete` has an empty `new` range likewise.
#[derive(Debug, Clone, PartialEq, Eq, Hash, new)]
pub struct Edit {
    pub tag: EditTag,
    pub old: Range<usize>,
    pub new: Range<usize>,
}

impl Edit {
    /// Tag a changed region by which of its sides are empty
    pub fn change(old: Range<usize>, new: Range<usize>) -> Self {
        let tag = match (old.is_empty(), new.is_empty()) {
            (true, false) => EditTag::Insert,
            (false, true) => EditTag::Delete,
            _ => EditTag::Replace,
        };
        Edit::new(tag, old, new)
    }

    pub fn is_change(&self) -> bool {
        self.tag != EditTag::Equal
    }
}

/// Group matched line pairs into a complete, ascending edit script
///
/// # Arguments
///
/// * `old_len` / `new_len` - Number of lines on each side
/// * `matches` - Ascending `(old, new)` pairs of equal lines
pub fn edits_from_matches(old_len: usize, new_len: usize, matches: &[(usize, usize)]) -> Vec<Edit> {
    let mut edits: Vec<Edit> = Vec::new();
    let (mut old_pos, mut new_pos) = (0, 0);

    for &(x, y) in matches.iter().chain(std::iter::once(&(old_len, new_len))) {
        if x > old_pos || y > new_pos {
            edits.push(Edit::change(old_pos..x, new_pos..y));
        }
        if x == old_len && y == new_len {
            break;
        }

        match edits.last_mut() {
            Some(last) if last.tag == EditTag::Equal => {
                last.old.end = x + 1;
                last.new.end = y + 1;
            }
            _ => edits.push(Edit::new(EditTag::Equal, x..x + 1, y..y + 1)),
        }
        (old_pos, new_pos) = (x + 1, y + 1);
    }

    edits
}
