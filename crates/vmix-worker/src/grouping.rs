//! Variant grouping and per-group concatenation.
//!
//! Segmented generations share a `variant_root`; their materialized
//! segments are stitched in `segment_index` order into one clip per root.

use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, info};
use vmix_media::probe::probe_duration_soft;
use vmix_media::SegmentConcatenator;
use vmix_models::VideoCandidate;

use crate::error::WorkerResult;
use crate::locate::CandidateLocator;

static UNSAFE_CHARS: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9_-]+").unwrap());

/// File-name-safe form of a variant identifier.
pub fn safe_name(s: &str) -> String {
    UNSAFE_CHARS.replace_all(s, "_").trim_matches('_').to_string()
}

/// Candidates sharing a variant root, in segment order.
#[derive(Debug, Clone, PartialEq)]
pub struct VariantGroup {
    pub root: String,
    pub members: Vec<VideoCandidate>,
}

/// Group by root in first-seen order; members sorted by segment index.
///
/// The sort is stable, so segments without an index keep input order.
pub fn group_by_root(candidates: &[VideoCandidate]) -> Vec<VariantGroup> {
    let mut groups: Vec<VariantGroup> = Vec::new();
    for candidate in candidates {
        let root = candidate.root();
        match groups.iter_mut().find(|g| g.root == root) {
            Some(group) => group.members.push(candidate.clone()),
            None => groups.push(VariantGroup {
                root: root.to_string(),
                members: vec![candidate.clone()],
            }),
        }
    }
    for group in &mut groups {
        group.members.sort_by_key(VideoCandidate::segment_order);
    }
    groups
}

/// Collapse each group into one candidate.
///
/// Groups with no materialized segment are dropped. A single segment is
/// used as-is; two or more are concatenated into
/// `<out_dir>/<safe_root>_concat.mp4`. The group candidate inherits the
/// first member's prompt.
pub async fn concat_groups(
    groups: &[VariantGroup],
    locator: &CandidateLocator,
    concatenator: &SegmentConcatenator,
    out_dir: &Path,
) -> WorkerResult<Vec<VideoCandidate>> {
    let mut merged = Vec::with_capacity(groups.len());

    for group in groups {
        let mut paths: Vec<PathBuf> = Vec::with_capacity(group.members.len());
        for member in &group.members {
            if let Some(path) = locator.resolve_existing(member).await {
                paths.push(path);
            }
        }
        let prompt = group
            .members
            .first()
            .map(|m| m.prompt.clone())
            .unwrap_or_default();

        let path = match paths.len() {
            0 => {
                debug!(root = %group.root, "No materialized segments in group");
                continue;
            }
            1 => paths[0].clone(),
            n => {
                let out = out_dir.join(format!("{}_concat.mp4", safe_name(&group.root)));
                info!(root = %group.root, segments = n, output = %out.display(), "Concatenating variant group");
                concatenator.concatenate(&paths, &out).await?
            }
        };

        let mut candidate = VideoCandidate::from_path(path, group.root.clone()).with_prompt(prompt);
        candidate.variant_root = Some(group.root.clone());
        merged.push(candidate);
    }

    Ok(merged)
}

/// Running crossfaded length of an ordered clip list.
#[derive(Debug, Clone, Copy)]
struct ConcatBudget {
    target_secs: f64,
    crossfade_secs: f64,
    clips: usize,
    total: f64,
}

impl ConcatBudget {
    fn new(target_secs: f64, crossfade_secs: f64) -> Self {
        Self {
            target_secs,
            crossfade_secs,
            clips: 0,
            total: 0.0,
        }
    }

    /// Every clip after the first overlaps its predecessor by the crossfade.
    fn add(&mut self, duration: f64) {
        self.clips += 1;
        self.total += if self.clips == 1 {
            duration
        } else {
            (duration - self.crossfade_secs).max(0.0)
        };
    }

    fn reached(&self) -> bool {
        self.total >= self.target_secs
    }
}

/// Take clips in order until their crossfaded length reaches `target_secs`.
///
/// Entries with an unknown duration are skipped.
pub fn accumulate_until_target(
    clips: impl IntoIterator<Item = (PathBuf, Option<f64>)>,
    target_secs: f64,
    crossfade_secs: f64,
) -> Vec<PathBuf> {
    let mut budget = ConcatBudget::new(target_secs, crossfade_secs);
    let mut taken = Vec::new();
    for (path, duration) in clips {
        if let Some(d) = duration {
            taken.push(path);
            budget.add(d);
        }
        if budget.reached() {
            break;
        }
    }
    taken
}

/// Existing clips from `candidates`, probed in order, up to the target.
pub async fn collect_concat_paths(
    candidates: &[PathBuf],
    target_secs: f64,
    crossfade_secs: f64,
) -> Vec<PathBuf> {
    let mut probed = Vec::with_capacity(candidates.len());
    for path in candidates.iter().filter(|p| p.is_file()) {
        probed.push((path.clone(), probe_duration_soft(path).await));
    }
    accumulate_until_target(probed, target_secs, crossfade_secs)
}
