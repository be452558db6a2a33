//! Rename detection between one side and the ancestor

use crate::areas::store::ObjectStore;
use crate::artifacts::merge::cancellation::CancellationToken;
use crate::artifacts::objects::entry_mode::EntryKind;
use crate::artifacts::objects::tree::TreeEntry;
use crate::errors::MergeResult;
use bstr::{BStr, BString, ByteSlice};
use bytes::Bytes;
use derive_new::new;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// A deleted path paired with the added path that carries its content
#[derive(Debug, Clone, PartialEq, Eq, new)]
pub struct Rename {
    pub from: BString,
    pub to: BString,
    /// Similarity percentage; 100 for exact matches
    pub score: u8,
}

/// Byte-weighted line overlap of two contents, as a percentage
///
/// Lines are compared as multisets; each shared line counts with its byte
/// length, and the total is divided by the longer content.
pub fn similarity(a: &[u8], b: &[u8]) -> u8 {
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 100;
    }

    let mut counts = HashMap::<&[u8], usize>::new();
    for line in a.split_inclusive(|&byte| byte == b'\n') {
        *counts.entry(line).or_default() += 1;
    }

    let mut shared = 0usize;
    for line in b.split_inclusive(|&byte| byte == b'\n') {
        if let Some(count) = counts.get_mut(line).filter(|count| **count > 0) {
            *count -= 1;
            shared += line.len();
        }
    }

    ((shared * 100) / longest) as u8
}

pub struct RenameDetector<'r> {
    store: &'r dyn ObjectStore,
    threshold: u8,
    limit: usize,
    cancellation: &'r CancellationToken,
}

impl<'r> RenameDetector<'r> {
    pub fn new(
        store: &'r dyn ObjectStore,
        threshold: u8,
        limit: usize,
        cancellation: &'r CancellationToken,
    ) -> Self {
        RenameDetector {
            store,
            threshold,
            limit,
            cancellation,
        }
    }

    /// Pair deleted files with added files
    ///
    /// # Arguments
    ///
    /// * `deleted` - Paths present in the ancestor but missing on this side
    /// * `added` - Paths present on this side but missing in the ancestor
    pub fn detect(
        &self,
        deleted: &BTreeMap<BString, TreeEntry>,
        added: &BTreeMap<BString, TreeEntry>,
    ) -> MergeResult<Vec<Rename>> {
        let deleted = files_only(deleted);
        let added = files_only(added);
        if deleted.is_empty() || added.is_empty() {
            return Ok(Vec::new());
        }

        let mut renames = Vec::new();
        let mut taken_from = BTreeSet::new();
        let mut taken_to = BTreeSet::new();

        // exact content matches pair first, in path order
        for (from, from_entry) in &deleted {
            let exact = added
                .iter()
                .find(|(to, entry)| entry.oid == from_entry.oid && !taken_to.contains(*to));
            if let Some((to, _)) = exact {
                taken_from.insert(*from);
                taken_to.insert(*to);
                renames.push(Rename::new((*from).to_owned(), (*to).to_owned(), 100));
            }
        }

        let remaining_deleted = deleted
            .iter()
            .filter(|(path, _)| !taken_from.contains(*path))
            .collect::<Vec<_>>();
        let remaining_added = added
            .iter()
            .filter(|(path, _)| !taken_to.contains(*path))
            .collect::<Vec<_>>();

        let candidates = remaining_deleted.len() * remaining_added.len();
        if candidates == 0 {
            return Ok(sorted(renames));
        }
        if candidates > self.limit.saturating_mul(self.limit) {
            tracing::debug!(
                deleted = remaining_deleted.len(),
                added = remaining_added.len(),
                limit = self.limit,
                "skipping inexact rename detection"
            );
            return Ok(sorted(renames));
        }

        let mut contents = HashMap::<&BStr, Bytes>::new();
        for (path, entry) in remaining_deleted.iter().chain(remaining_added.iter()) {
            contents.insert(**path, self.store.get_blob(&entry.oid)?.into_content());
        }

        let mut scored = Vec::new();
        for (from, _) in &remaining_deleted {
            self.cancellation.check()?;
            for (to, _) in &remaining_added {
                let score = similarity(&contents[**from], &contents[**to]);
                if score >= self.threshold {
                    scored.push((score, **from, **to));
                }
            }
        }

        // best score first, then path order
        scored.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(b.1)).then(a.2.cmp(b.2)));
        for (score, from, to) in scored {
            if taken_from.contains(from) || taken_to.contains(to) {
                continue;
            }
            taken_from.insert(from);
            taken_to.insert(to);
            renames.push(Rename::new(from.to_owned(), to.to_owned(), score));
        }

        Ok(sorted(renames))
    }
}

fn files_only(entries: &BTreeMap<BString, TreeEntry>) -> BTreeMap<&BStr, &TreeEntry> {
    entries
        .iter()
        .filter(|(_, entry)| entry.mode.kind() == EntryKind::File)
        .map(|(path, entry)| (path.as_bstr(), entry))
        .collect()
}

fn sorted(mut renames: Vec<Rename>) -> Vec<Rename> {
    renames.sort_by(|a, b| a.from.cmp(&b.from));
    renames
}
