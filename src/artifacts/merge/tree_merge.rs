//! Three-way tree merge
//!
//! ## Phases
//!
//! 1. **Walk**: the three trees are walked together into one flat map from
//!    path to the entries each side has there. Subtrees that need no merging
//!    are kept as single entries instead of being expanded.
//! 2. **Renames**: per side, deleted files are paired with added files, and
//!    each pair is folded into one path at its new location.
//! 3. **Classify**: every path is either settled, a conflict, or a content
//!    merge job.
//! 4. **Content merges**: jobs run as blocking tasks, at most `workers` at a
//!    time, and report back to a single collecting loop.
//! 5. **Build**: the settled entries are nested back into trees, written to
//!    the staging overlay.

use crate::areas::staging::StagedStore;
use crate::areas::store::{ObjectStore, into_malformed};
use crate::artifacts::merge::cancellation::CancellationToken;
use crate::artifacts::merge::file_merge::{FileMergeResult, FileMerger};
use crate::artifacts::merge::options::MergeOptions;
use crate::artifacts::merge::outcome::{
    Conflict, ConflictKind, ConflictSide, MergeSide, TreeMergeResult,
};
use crate::artifacts::merge::rename::{Rename, RenameDetector};
use crate::artifacts::objects::blob::Blob;
use crate::artifacts::objects::entry_mode::{EntryKind, EntryMode};
use crate::artifacts::objects::object_id::ObjectId;
use crate::artifacts::objects::tree::{Tree, TreeBuilder, TreeEntry};
use crate::errors::{MergeError, MergeResult};
use bstr::{BString, ByteSlice};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// What happens to paths that conflict
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConflictPolicy {
    /// Leave conflicted paths out of the tree and report them
    #[default]
    Record,
    /// Keep something at every path and report nothing: marked blobs for
    /// content conflicts, the ancestor's entry (else ours, else theirs) for
    /// structural ones
    Embed,
}

#[derive(Debug, Clone)]
pub struct TreeMergeOptions {
    pub file_merger: FileMerger,
    pub find_renames: bool,
    pub rename_threshold: u8,
    pub rename_limit: usize,
    pub workers: usize,
    pub policy: ConflictPolicy,
}

impl From<&MergeOptions> for TreeMergeOptions {
    fn from(options: &MergeOptions) -> Self {
        TreeMergeOptions {
            file_merger: FileMerger::new(options.file_flags, options.labels.clone()),
            find_renames: options.find_renames,
            rename_threshold: options.rename_threshold,
            rename_limit: options.rename_limit,
            workers: options.worker_count(),
            policy: ConflictPolicy::Record,
        }
    }
}

impl Default for TreeMergeOptions {
    fn default() -> Self {
        TreeMergeOptions::from(&MergeOptions::default())
    }
}

/// An entry as one side has it, with the path it has there
#[derive(Debug, Clone, PartialEq, Eq)]
struct Version {
    path: BString,
    entry: TreeEntry,
}

impl Version {
    fn side(&self) -> ConflictSide {
        ConflictSide::from_entry(self.path.clone(), &self.entry)
    }
}

const ANCESTOR: usize = 0;
const OURS: usize = 1;
const THEIRS: usize = 2;

#[derive(Debug, Clone, Default)]
struct Triple {
    ancestor: Option<Version>,
    ours: Option<Version>,
    theirs: Option<Version>,
}

impl Triple {
    fn slot(&mut self, side: usize) -> &mut Option<Version> {
        match side {
            ANCESTOR => &mut self.ancestor,
            OURS => &mut self.ours,
            _ => &mut self.theirs,
        }
    }

    fn get(&self, side: usize) -> Option<&Version> {
        match side {
            ANCESTOR => self.ancestor.as_ref(),
            OURS => self.ours.as_ref(),
            _ => self.theirs.as_ref(),
        }
    }

    fn entry(&self, side: usize) -> Option<&TreeEntry> {
        self.get(side).map(|version| &version.entry)
    }

    fn conflict(&self, path: &[u8], kind: ConflictKind) -> Conflict {
        Conflict::new(
            path,
            kind,
            self.ancestor.as_ref().map(Version::side),
            self.ours.as_ref().map(Version::side),
            self.theirs.as_ref().map(Version::side),
        )
    }

    /// Entry an embedded structural conflict keeps
    fn fallback(&self) -> Option<TreeEntry> {
        self.ancestor
            .as_ref()
            .or(self.ours.as_ref())
            .or(self.theirs.as_ref())
            .map(|version| version.entry.clone())
    }
}

fn join_path(prefix: &[u8], name: &[u8]) -> BString {
    let mut path = BString::from(prefix);
    if !path.is_empty() {
        path.push(b'/');
    }
    path.extend_from_slice(name);
    path
}

/// Flattens three trees into per-path triples
struct TreeWalk<'w> {
    store: &'w dyn ObjectStore,
    cancellation: &'w CancellationToken,
    /// Without rename detection a subtree changed on one side only can be
    /// taken whole; with it, its files must stay visible to the detector
    collapse_one_sided: bool,
    paths: BTreeMap<BString, Triple>,
    /// Trees currently being walked, per side
    chains: [Vec<ObjectId>; 3],
}

impl<'w> TreeWalk<'w> {
    fn collapsible(&self, entries: &[Option<&TreeEntry>; 3]) -> bool {
        let [ancestor, ours, theirs] = entries;
        if ancestor == ours && ours == theirs {
            return true;
        }
        self.collapse_one_sided && (ours == theirs || ancestor == ours || ancestor == theirs)
    }

    fn walk(&mut self, prefix: &[u8], trees: [Option<ObjectId>; 3]) -> MergeResult<()> {
        self.cancellation.check()?;

        let mut loaded: [Option<Tree>; 3] = Default::default();
        for (side, oid) in trees.iter().enumerate() {
            let Some(oid) = oid else { continue };
            if self.chains[side].contains(oid) {
                return Err(MergeError::TreeCycle {
                    path: prefix.to_str_lossy().into_owned(),
                    oid: oid.clone(),
                });
            }
            loaded[side] = Some(self.store.get_tree(oid)?);
        }

        for (side, oid) in trees.iter().enumerate() {
            if let Some(oid) = oid {
                self.chains[side].push(oid.clone());
            }
        }

        let names = loaded
            .iter()
            .flatten()
            .flat_map(|tree| tree.entries().keys())
            .collect::<BTreeSet<_>>();

        for name in names {
            self.cancellation.check()?;

            let entries = [ANCESTOR, OURS, THEIRS]
                .map(|side| loaded[side].as_ref().and_then(|tree| tree.get(name)));
            let path = join_path(prefix, name);

            let mut triple = Triple::default();
            let mut subtrees: [Option<ObjectId>; 3] = Default::default();
            let collapse = self.collapsible(&entries);

            for (side, entry) in entries.iter().enumerate() {
                match entry {
                    Some(entry) if entry.is_tree() && !collapse => {
                        subtrees[side] = Some(entry.oid.clone());
                    }
                    Some(entry) => {
                        *triple.slot(side) = Some(Version {
                            path: path.clone(),
                            entry: (*entry).clone(),
                        });
                    }
                    None => {}
                }
            }

            if triple.ancestor.is_some() || triple.ours.is_some() || triple.theirs.is_some() {
                self.paths.insert(path.clone(), triple);
            }
            if subtrees.iter().any(Option::is_some) {
                self.walk(&path, subtrees)?;
            }
        }

        for (side, oid) in trees.iter().enumerate() {
            if oid.is_some() {
                self.chains[side].pop();
            }
        }

        Ok(())
    }
}

/// Deleted and added paths of one side relative to the ancestor
fn side_changes(
    paths: &BTreeMap<BString, Triple>,
    side: usize,
) -> (BTreeMap<BString, TreeEntry>, BTreeMap<BString, TreeEntry>) {
    let mut deleted = BTreeMap::new();
    let mut added = BTreeMap::new();

    for (path, triple) in paths {
        match (triple.entry(ANCESTOR), triple.entry(side)) {
            (Some(entry), None) => {
                deleted.insert(path.clone(), entry.clone());
            }
            (None, Some(entry)) => {
                added.insert(path.clone(), entry.clone());
            }
            _ => {}
        }
    }

    (deleted, added)
}

/// Fold detected renames into the path map
///
/// Returns the conflicts renames cause; their paths leave the map.
fn apply_renames(
    paths: &mut BTreeMap<BString, Triple>,
    ours: Vec<Rename>,
    theirs: Vec<Rename>,
) -> Vec<(BString, Triple, ConflictKind)> {
    let ours = ours
        .into_iter()
        .map(|rename| (rename.from.clone(), rename))
        .collect::<BTreeMap<_, _>>();
    let theirs = theirs
        .into_iter()
        .map(|rename| (rename.from.clone(), rename))
        .collect::<BTreeMap<_, _>>();
    let sources = ours.keys().chain(theirs.keys()).cloned().collect::<BTreeSet<_>>();

    let mut conflicts = Vec::new();
    let mut claimed = BTreeSet::new();

    for from in sources {
        let Some(source) = paths.remove(&from) else {
            continue;
        };

        match (ours.get(&from), theirs.get(&from)) {
            (Some(mine), Some(other)) if mine.to == other.to => {
                let target = paths.remove(&mine.to).unwrap_or_default();
                claimed.insert(mine.to.clone());
                paths.insert(
                    mine.to.clone(),
                    Triple {
                        ancestor: source.ancestor,
                        ours: target.ours,
                        theirs: target.theirs,
                    },
                );
            }
            (Some(mine), Some(other)) => {
                let mut ours_target = paths.remove(&mine.to).unwrap_or_default();
                let mut theirs_target = paths.remove(&other.to).unwrap_or_default();
                let triple = Triple {
                    ancestor: source.ancestor.clone(),
                    ours: ours_target.ours.clone(),
                    theirs: theirs_target.theirs.clone(),
                };
                conflicts.push((from.clone(), triple, ConflictKind::RenameRename));

                // either destination may also hold a file the other side added
                if let Some(added) = ours_target.theirs.take() {
                    let triple = Triple {
                        ancestor: source.ancestor.clone(),
                        ours: ours_target.ours,
                        theirs: Some(added),
                    };
                    conflicts.push((mine.to.clone(), triple, ConflictKind::RenameAdd));
                }
                if let Some(added) = theirs_target.ours.take() {
                    let triple = Triple {
                        ancestor: source.ancestor,
                        ours: Some(added),
                        theirs: theirs_target.theirs,
                    };
                    conflicts.push((other.to.clone(), triple, ConflictKind::RenameAdd));
                }
                claimed.insert(mine.to.clone());
                claimed.insert(other.to.clone());
            }
            (Some(rename), None) => {
                let conflict = rename_one_side(paths, &mut claimed, source, rename, OURS);
                conflicts.extend(conflict);
            }
            (None, Some(rename)) => {
                let conflict = rename_one_side(paths, &mut claimed, source, rename, THEIRS);
                conflicts.extend(conflict);
            }
            (None, None) => {
                paths.insert(from, source);
            }
        }
    }

    conflicts
}

fn rename_one_side(
    paths: &mut BTreeMap<BString, Triple>,
    claimed: &mut BTreeSet<BString>,
    mut source: Triple,
    rename: &Rename,
    renamed_by: usize,
) -> Option<(BString, Triple, ConflictKind)> {
    let other = if renamed_by == OURS { THEIRS } else { OURS };

    let target_taken = claimed.contains(&rename.to)
        || paths
            .get(&rename.to)
            .is_none_or(|target| target.get(renamed_by).is_none());
    if target_taken {
        // an earlier rename already consumed the destination
        return Some((rename.from.clone(), source, ConflictKind::RenameRename));
    }

    let mut target = paths.remove(&rename.to).unwrap_or_default();
    let mut triple = Triple {
        ancestor: source.ancestor.clone(),
        ..Triple::default()
    };
    *triple.slot(renamed_by) = target.slot(renamed_by).take();
    // a file the other side added at the destination stays in the record
    *triple.slot(other) = target.slot(other).take();

    if source.get(other).is_none() {
        return Some((rename.to.clone(), triple, ConflictKind::RenameDelete));
    }
    if triple.get(other).is_some() {
        // the other side's version of the source is settled at its old path
        paths.insert(rename.from.clone(), source);
        return Some((rename.to.clone(), triple, ConflictKind::RenameAdd));
    }

    *triple.slot(other) = source.slot(other).take();
    claimed.insert(rename.to.clone());
    paths.insert(rename.to.clone(), triple);
    None
}

/// Content merge of one path, run on a blocking worker
struct ContentJob {
    path: BString,
    triple: Triple,
    ancestor: Option<ObjectId>,
    ours: ObjectId,
    theirs: ObjectId,
    /// `None` when the modes cannot be reconciled
    mode: Option<EntryMode>,
    kind: ConflictKind,
}

struct ContentOutcome {
    result: FileMergeResult,
    blob: ObjectId,
}

enum Resolution {
    Take(Option<TreeEntry>),
    Conflict(ConflictKind),
    Merge(ContentJob),
}

fn merge_mode(ancestor: EntryMode, ours: EntryMode, theirs: EntryMode) -> Option<EntryMode> {
    if ours == theirs || ancestor == ours {
        Some(theirs)
    } else if ancestor == theirs {
        Some(ours)
    } else {
        None
    }
}

/// File, symlink and submodule turned into one another
///
/// Files and directories swapping places are settled by the walk and the
/// directory/file check instead.
fn type_changed(ancestor: &TreeEntry, entry: &TreeEntry) -> bool {
    let (before, after) = (ancestor.mode.kind(), entry.mode.kind());
    before != after && before != EntryKind::Directory && after != EntryKind::Directory
}

fn classify(path: &[u8], triple: &Triple) -> Resolution {
    let (ancestor, ours, theirs) = (
        triple.entry(ANCESTOR),
        triple.entry(OURS),
        triple.entry(THEIRS),
    );

    if ours == theirs {
        return Resolution::Take(ours.cloned());
    }
    if let Some(ancestor) = ancestor
        && [ours, theirs]
            .into_iter()
            .flatten()
            .any(|entry| type_changed(ancestor, entry))
    {
        return Resolution::Conflict(ConflictKind::TypeChange);
    }
    if ancestor == theirs {
        return Resolution::Take(ours.cloned());
    }
    if ancestor == ours {
        return Resolution::Take(theirs.cloned());
    }

    match (ancestor, ours, theirs) {
        (None, Some(ours), Some(theirs)) => {
            let both_files =
                ours.mode.kind() == EntryKind::File && theirs.mode.kind() == EntryKind::File;
            if !both_files {
                return Resolution::Conflict(ConflictKind::AddAdd);
            }
            if ours.oid == theirs.oid {
                return Resolution::Conflict(ConflictKind::Mode);
            }
            Resolution::Merge(ContentJob {
                path: path.into(),
                triple: triple.clone(),
                ancestor: None,
                ours: ours.oid.clone(),
                theirs: theirs.oid.clone(),
                mode: (ours.mode == theirs.mode).then_some(ours.mode),
                kind: ConflictKind::AddAdd,
            })
        }
        (Some(_), None, Some(_)) => Resolution::Conflict(ConflictKind::ModifyDelete {
            deleted_by: MergeSide::Ours,
        }),
        (Some(_), Some(_), None) => Resolution::Conflict(ConflictKind::ModifyDelete {
            deleted_by: MergeSide::Theirs,
        }),
        (Some(ancestor), Some(ours), Some(theirs)) => {
            let kind = ancestor.mode.kind();
            let mode = merge_mode(ancestor.mode, ours.mode, theirs.mode);
            let oid = if ours.oid == theirs.oid || ancestor.oid == ours.oid {
                Some(theirs.oid.clone())
            } else if ancestor.oid == theirs.oid {
                Some(ours.oid.clone())
            } else {
                None
            };

            match (oid, mode) {
                (Some(oid), Some(mode)) => Resolution::Take(Some(TreeEntry::new(oid, mode))),
                (Some(_), None) => Resolution::Conflict(ConflictKind::Mode),
                // symlink targets and submodule commits are never merged line by line
                (None, _) if kind != EntryKind::File => {
                    Resolution::Conflict(ConflictKind::Content)
                }
                (None, mode) => Resolution::Merge(ContentJob {
                    path: path.into(),
                    triple: triple.clone(),
                    ancestor: Some(ancestor.oid.clone()),
                    ours: ours.oid.clone(),
                    theirs: theirs.oid.clone(),
                    mode,
                    kind: ConflictKind::Content,
                }),
            }
        }
        // every other combination is settled by the checks above
        _ => Resolution::Take(ours.cloned()),
    }
}

fn merge_content(
    store: &dyn ObjectStore,
    merger: &FileMerger,
    cancellation: &CancellationToken,
    job: &ContentJob,
) -> MergeResult<ContentOutcome> {
    cancellation.check()?;

    let ancestor = job
        .ancestor
        .as_ref()
        .map(|oid| store.get_blob(oid))
        .transpose()?;
    let ours = store.get_blob(&job.ours)?;
    let theirs = store.get_blob(&job.theirs)?;

    let result = merger.merge(
        ancestor.as_ref().map(|blob| &blob.content()[..]),
        ours.content(),
        theirs.content(),
    );
    cancellation.check()?;

    let blob = store.put_blob(&Blob::new(result.content().clone()))?;
    Ok(ContentOutcome { result, blob })
}

/// Merges trees into a staging overlay
pub struct TreeMerger {
    store: Arc<StagedStore>,
    options: TreeMergeOptions,
    cancellation: CancellationToken,
}

impl TreeMerger {
    pub fn new(
        store: Arc<StagedStore>,
        options: TreeMergeOptions,
        cancellation: CancellationToken,
    ) -> Self {
        TreeMerger {
            store,
            options,
            cancellation,
        }
    }

    pub fn options(&self) -> &TreeMergeOptions {
        &self.options
    }

    /// Merge `ours` and `theirs` against `ancestor`
    ///
    /// # Arguments
    ///
    /// * `ancestor` - Root tree of the merge base; `None` for unrelated histories
    /// * `ours` - Our root tree
    /// * `theirs` - Their root tree
    pub async fn merge(
        &self,
        ancestor: Option<&ObjectId>,
        ours: &ObjectId,
        theirs: &ObjectId,
    ) -> MergeResult<TreeMergeResult> {
        self.cancellation.check()?;

        if ours == theirs || ancestor == Some(theirs) {
            return self.trivial(ours);
        }
        if ancestor == Some(ours) {
            return self.trivial(theirs);
        }

        let mut walk = TreeWalk {
            store: &*self.store,
            cancellation: &self.cancellation,
            collapse_one_sided: !self.options.find_renames,
            paths: BTreeMap::new(),
            chains: Default::default(),
        };
        walk.walk(b"", [ancestor.cloned(), Some(ours.clone()), Some(theirs.clone())])?;
        let mut paths = walk.paths;

        let mut structural = Vec::new();
        if self.options.find_renames && ancestor.is_some() {
            let detector = RenameDetector::new(
                &*self.store,
                self.options.rename_threshold,
                self.options.rename_limit,
                &self.cancellation,
            );
            let (deleted, added) = side_changes(&paths, OURS);
            let ours_renames = detector.detect(&deleted, &added)?;
            let (deleted, added) = side_changes(&paths, THEIRS);
            let theirs_renames = detector.detect(&deleted, &added)?;

            tracing::debug!(
                ours = ours_renames.len(),
                theirs = theirs_renames.len(),
                "detected renames"
            );
            structural = apply_renames(&mut paths, ours_renames, theirs_renames);
        }

        let mut resolved = BTreeMap::new();
        let mut conflicts = Vec::new();
        let mut jobs = Vec::new();

        for (path, triple, kind) in structural {
            self.settle_conflict(&mut resolved, &mut conflicts, path, &triple, kind);
        }

        for (path, triple) in &paths {
            self.cancellation.check()?;

            match classify(path, triple) {
                Resolution::Take(Some(entry)) => {
                    resolved.insert(path.clone(), entry);
                }
                Resolution::Take(None) => {}
                Resolution::Conflict(kind) => {
                    self.settle_conflict(&mut resolved, &mut conflicts, path.clone(), triple, kind);
                }
                Resolution::Merge(job) => jobs.push(job),
            }
        }

        tracing::debug!(paths = paths.len(), jobs = jobs.len(), "classified paths");

        let mut marked = Vec::new();
        for (job, outcome) in self.run_jobs(jobs).await? {
            let clean = outcome.result.is_clean() && job.mode.is_some();
            let mode = job
                .mode
                .or(job.triple.ours.as_ref().map(|version| version.entry.mode))
                .unwrap_or(EntryMode::Regular);

            if clean || self.options.policy == ConflictPolicy::Embed {
                resolved.insert(job.path.clone(), TreeEntry::new(outcome.blob.clone(), mode));
            }
            if !clean && self.options.policy == ConflictPolicy::Record {
                let kind = if outcome.result.is_clean() {
                    ConflictKind::Mode
                } else {
                    job.kind
                };
                tracing::trace!(path = %job.path, %kind, "content conflict");
                marked.push(outcome.blob.clone());
                conflicts.push(
                    job.triple
                        .conflict(&job.path, kind)
                        .with_content(outcome.result, outcome.blob),
                );
            }
        }

        for file in directory_file_paths(&resolved) {
            resolved.remove(&file);
            if self.options.policy == ConflictPolicy::Record {
                let triple = paths.get(&file).cloned().unwrap_or_default();
                conflicts.push(triple.conflict(&file, ConflictKind::DirectoryFile));
            }
        }

        let builder = TreeBuilder::build(resolved).map_err(|err| into_malformed(ours, err))?;
        let store = self.store.clone();
        let tree = builder.write(&mut |tree| store.put_tree(&tree))?;

        let mut roots = vec![tree.clone()];
        roots.extend(marked);
        let objects = self.store.collect_reachable(&roots)?;

        tracing::debug!(
            tree = %tree.to_short_oid(),
            conflicts = conflicts.len(),
            "merged trees"
        );
        Ok(TreeMergeResult::new(tree, conflicts, objects))
    }

    fn trivial(&self, tree: &ObjectId) -> MergeResult<TreeMergeResult> {
        let objects = self.store.collect_reachable(std::slice::from_ref(tree))?;
        Ok(TreeMergeResult::new(tree.clone(), Vec::new(), objects))
    }

    fn settle_conflict(
        &self,
        resolved: &mut BTreeMap<BString, TreeEntry>,
        conflicts: &mut Vec<Conflict>,
        path: BString,
        triple: &Triple,
        kind: ConflictKind,
    ) {
        match self.options.policy {
            ConflictPolicy::Record => {
                tracing::trace!(path = %path, %kind, "structural conflict");
                conflicts.push(triple.conflict(&path, kind));
            }
            ConflictPolicy::Embed => {
                if let Some(entry) = triple.fallback() {
                    resolved.insert(path, entry);
                }
            }
        }
    }

    async fn run_jobs(&self, jobs: Vec<ContentJob>) -> MergeResult<Vec<(ContentJob, ContentOutcome)>> {
        if jobs.is_empty() {
            return Ok(Vec::new());
        }

        let semaphore = Arc::new(Semaphore::new(self.options.workers.max(1)));
        let mut set = JoinSet::new();

        for job in jobs {
            self.cancellation.check()?;
            let permit = semaphore
                .clone()
                .acquire_owned()
                .await
                .map_err(|err| MergeError::Worker(err.to_string()))?;

            let store = self.store.clone();
            let merger = self.options.file_merger.clone();
            let cancellation = self.cancellation.clone();
            set.spawn_blocking(move || {
                let _permit = permit;
                let outcome = merge_content(&*store, &merger, &cancellation, &job);
                (job, outcome)
            });
        }

        let mut finished = BTreeMap::new();
        while let Some(joined) = set.join_next().await {
            let (job, outcome) = joined.map_err(|err| MergeError::Worker(err.to_string()))?;
            let outcome = outcome?;
            finished.insert(job.path.clone(), (job, outcome));
        }

        Ok(finished.into_values().collect())
    }
}

/// Result paths that are also a directory prefix of another result path
fn directory_file_paths(resolved: &BTreeMap<BString, TreeEntry>) -> BTreeSet<BString> {
    let mut files = BTreeSet::new();
    for path in resolved.keys() {
        let mut prefix: &[u8] = path;
        while let Some(slash) = prefix.rfind_byte(b'/') {
            let parent = &prefix[..slash];
            if resolved.contains_key(parent.as_bstr()) {
                files.insert(BString::from(parent));
            }
            prefix = parent;
        }
    }
    files
}
