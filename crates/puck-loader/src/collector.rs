//! File discovery for descriptors
//!
//! Rediscovers files already extracted to disk so they can be handed to
//! [`IngestionStore::load_many`](crate::store::IngestionStore::load_many).

use crate::descriptor::EndpointDescriptor;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};
use walkdir::WalkDir;

/// Enumerate files matching the descriptor's pattern under `search_roots`
///
/// Roots default to the descriptor's output directory. The pattern is matched
/// against file names; sub-directories are only searched when the descriptor is
/// recursive. Missing roots contribute nothing.
pub fn collect_files(descriptor: &EndpointDescriptor, search_roots: Option<&[PathBuf]>) -> Vec<PathBuf> {
    let default_root = [descriptor.output_directory().to_path_buf()];
    let roots = search_roots.unwrap_or(&default_root);

    let mut files = Vec::new();
    for root in roots {
        collect_from_root(descriptor, root, &mut files);
    }

    debug!(
        table = %descriptor.display_name(),
        pattern = descriptor.file_pattern().as_str(),
        roots = roots.len(),
        files = files.len(),
        "Collected candidate files"
    );

    files
}

fn collect_from_root(descriptor: &EndpointDescriptor, root: &Path, files: &mut Vec<PathBuf>) {
    if !root.is_dir() {
        debug!(root = %root.display(), "Search root does not exist, skipping");
        return;
    }

    let max_depth = if descriptor.recursive() { usize::MAX } else { 1 };
    let pattern = descriptor.file_pattern();

    for entry in WalkDir::new(root)
        .min_depth(1)
        .max_depth(max_depth)
        .sort_by_file_name()
    {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(root = %root.display(), error = %e, "Skipping unreadable entry");
                continue;
            },
        };

        if !entry.file_type().is_file() {
            continue;
        }

        if entry
            .file_name()
            .to_str()
            .is_some_and(|name| pattern.matches(name))
        {
            files.push(entry.into_path());
        }
    }
}

/// `output_directory/<season>` for each season, for season-partitioned sources
pub fn season_roots<S: AsRef<str>>(descriptor: &EndpointDescriptor, seasons: &[S]) -> Vec<PathBuf> {
    seasons
        .iter()
        .map(|season| descriptor.output_directory().join(season.as_ref()))
        .collect()
}
