use crate::areas::repository::Repository;
use crate::artifacts::merge::merge_base::MergeBaseResolver;

impl Repository {
    /// Print the merge base of two revisions, or every merge base with `all`
    ///
    /// Returns `false` when the histories share no commit.
    pub fn merge_base(&self, first: &str, second: &str, all: bool) -> anyhow::Result<bool> {
        let first = self.resolve_revision(first)?;
        let second = self.resolve_revision(second)?;

        let mut resolver = MergeBaseResolver::new(self.database());
        let bases = resolver.merge_bases(&first, &second)?;

        let shown = match all {
            true => bases.as_slice(),
            false => &bases[..bases.len().min(1)],
        };
        for base in shown {
            writeln!(self.writer(), "{}", base)?;
        }

        Ok(!bases.is_empty())
    }
}
