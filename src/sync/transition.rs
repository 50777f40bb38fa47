//! State transitions for availability reconciliation
//!
//! Pure functions turning existence facts into new statuses and linkage.
//! The rules only ever move a variant downwards:
//!
//! - available / partially available -> deleted, when the variant is gone
//! - available -> partially available, when one of its seasons is gone
//! - deleted and unknown never change here
//!
//! Nothing in this module produces `Available` or `PartiallyAvailable` from
//! any other status.

use std::collections::BTreeMap;

use super::types::{Linkage, MediaKind, MediaRecord, MediaStatus, Variant, VariantState};

/// What happens to a variant's linkage when it is marked deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkagePolicy {
    Clear,
    /// An approved request is still waiting on this variant
    Preserve,
}

/// Changes applied to a record, used for run statistics
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Applied {
    pub variants_deleted: usize,
    pub seasons_deleted: usize,
    pub parents_demoted: usize,
}

impl Applied {
    pub fn merge(&mut self, other: Applied) {
        self.variants_deleted += other.variants_deleted;
        self.seasons_deleted += other.seasons_deleted;
        self.parents_demoted += other.parents_demoted;
    }
}

/// Whether losing existence would change this status at all.
pub fn loses_availability(status: MediaStatus, exists: bool) -> bool {
    !exists && !status.is_terminal() && status.is_present()
}

/// Next state of a variant, `None` when nothing changes.
pub fn next_variant_state(
    current: &VariantState,
    exists: bool,
    policy: LinkagePolicy,
) -> Option<VariantState> {
    if !loses_availability(current.status, exists) {
        return None;
    }

    let linkage = match policy {
        LinkagePolicy::Clear => Linkage::Cleared,
        LinkagePolicy::Preserve => current.linkage.clone(),
    };

    Some(VariantState {
        status: MediaStatus::Deleted,
        linkage,
    })
}

/// Next status of a season variant, `None` when nothing changes.
pub fn next_season_status(current: MediaStatus, exists: bool) -> Option<MediaStatus> {
    loses_availability(current, exists).then_some(MediaStatus::Deleted)
}

/// Parent status after one of its seasons was removed, `None` when unchanged.
pub fn demoted_parent_status(parent: MediaStatus) -> Option<MediaStatus> {
    (parent == MediaStatus::Available).then_some(MediaStatus::PartiallyAvailable)
}

/// Mark a variant as gone. Seasons are left to [apply_season_existence],
/// or to [cascade_season_loss] when the whole series is gone.
pub fn apply_variant_loss(
    record: &mut MediaRecord,
    variant: Variant,
    policy: LinkagePolicy,
) -> Applied {
    let mut applied = Applied::default();

    if let Some(next) = next_variant_state(&record.variants[variant], false, policy) {
        record.variants[variant] = next;
        applied.variants_deleted += 1;
    }

    applied
}

/// Delete every present season of a variant.
///
/// Only for series where neither variant exists any more.
pub fn cascade_season_loss(record: &mut MediaRecord, variant: Variant) -> Applied {
    let mut applied = Applied::default();
    if record.kind != MediaKind::Series {
        return applied;
    }

    for season in &mut record.seasons {
        if let Some(next) = next_season_status(season.status[variant], false) {
            season.status[variant] = next;
            applied.seasons_deleted += 1;
        }
    }
    if applied.seasons_deleted > 0 {
        applied.parents_demoted += demote_parent(record, variant);
    }

    applied
}

/// Apply per-season existence facts for one variant.
///
/// Seasons missing from `existence` are left alone.
pub fn apply_season_existence(
    record: &mut MediaRecord,
    variant: Variant,
    existence: &BTreeMap<i32, bool>,
) -> Applied {
    let mut applied = Applied::default();

    for season in &mut record.seasons {
        let Some(&exists) = existence.get(&season.season_number) else {
            continue;
        };
        if let Some(next) = next_season_status(season.status[variant], exists) {
            season.status[variant] = next;
            applied.seasons_deleted += 1;
        }
    }

    if applied.seasons_deleted > 0 {
        applied.parents_demoted += demote_parent(record, variant);
    }

    applied
}

fn demote_parent(record: &mut MediaRecord, variant: Variant) -> usize {
    let parent = &mut record.variants[variant];
    match demoted_parent_status(parent.status) {
        Some(next) => {
            parent.status = next;
            1
        }
        None => 0,
    }
}
