mod merge_criss_cross;
mod merge_diamond_pattern;
mod merge_failures;
mod merge_linear_history;
mod merge_renames;
mod merge_same_commit;
mod merge_simple_divergence;
