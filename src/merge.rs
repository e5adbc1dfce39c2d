//! The merge algebra over command sets.
//!
//! [`merge`] combines a base set A with an overlay B ("B merges onto A")
//! according to B's merge type:
//!
//! | merge type | result |
//! |---|---|
//! | Union | A ∪ B, collisions settled by priority, then B's duplicate policy |
//! | Neutral | like Union, but loses every equal-priority collision with a non-Neutral command |
//! | Intersect | names present on both sides; higher priority wins, ties go to B |
//! | Replace | B only, unless B is empty, in which case A passes through |
//! | Remove | A minus every command sharing a name with B |
//!
//! Merging is pure: both operands are left alone and a fresh set comes back.
//! [`fold`] applies [`merge`] left to right over an already ordered sequence.

use std::cmp::Ordering;

use crate::cmdset::{CommandSet, DuplicatePolicy, MergeType, SetEntry, SetMeta};
use crate::error::MergeError;

/// Key of the set produced by folding zero layers.
pub const EMPTY_SET_KEY: &str = "empty";

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// An equal-priority collision that the duplicate policy refused to settle.
///
/// The colliding commands are left out of the merged set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MergeConflict {
    /// Key of the command from the merging set.
    pub key: String,
    /// Names both sides claimed.
    pub names: Vec<String>,
    /// Key of the set the base-side command came from.
    pub base: String,
    /// Key of the merging set.
    pub overlay: String,
}

impl From<MergeConflict> for MergeError {
    fn from(conflict: MergeConflict) -> Self {
        MergeError::AmbiguousCommand {
            key: conflict.key,
            names: conflict.names,
            base: conflict.base,
            overlay: conflict.overlay,
        }
    }
}

/// Result of a merge: the new set plus any conflicts dropped along the way.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub set: CommandSet,
    pub conflicts: Vec<MergeConflict>,
}

impl MergeOutcome {
    fn clean(set: CommandSet) -> Self {
        Self {
            set,
            conflicts: Vec::new(),
        }
    }

    pub fn is_clean(&self) -> bool {
        self.conflicts.is_empty()
    }

    /// Strict view: the first conflict becomes an [`MergeError::AmbiguousCommand`].
    pub fn into_result(self) -> Result<CommandSet, MergeError> {
        match self.conflicts.into_iter().next() {
            Some(conflict) => Err(conflict.into()),
            None => Ok(self.set),
        }
    }
}

// ---------------------------------------------------------------------------
// Merge
// ---------------------------------------------------------------------------

/// Merge `overlay` onto `base` using the overlay's merge type for this base.
pub fn merge(base: &CommandSet, overlay: &CommandSet) -> MergeOutcome {
    let merge_type = overlay.merge_type_against(base.key());

    match merge_type {
        MergeType::Union | MergeType::Neutral => union(base, overlay, merge_type),
        MergeType::Intersect => intersect(base, overlay),
        MergeType::Replace => replace(base, overlay),
        MergeType::Remove => remove(base, overlay),
    }
}

/// Fold an ordered sequence of sets: the first is the base, each later set
/// merges onto the accumulated result.
///
/// Zero sets fold to an empty set keyed [`EMPTY_SET_KEY`].
pub fn fold<'a, I>(sets: I) -> MergeOutcome
where
    I: IntoIterator<Item = &'a CommandSet>,
{
    let mut sets = sets.into_iter();
    let Some(first) = sets.next() else {
        return MergeOutcome::clean(CommandSet::empty(EMPTY_SET_KEY));
    };

    sets.fold(MergeOutcome::clean(first.clone()), |acc, next| {
        let mut step = merge(&acc.set, next);
        let mut conflicts = acc.conflicts;
        conflicts.append(&mut step.conflicts);
        step.conflicts = conflicts;
        step
    })
}

/// Whether the overlay's metadata dominates the merged result.
fn overlay_dominates(base: &CommandSet, overlay: &CommandSet, merge_type: MergeType) -> bool {
    match overlay.priority().cmp(&base.priority()) {
        Ordering::Greater => true,
        Ordering::Less => false,
        Ordering::Equal => {
            !(merge_type == MergeType::Neutral && base.merge_type() != MergeType::Neutral)
        }
    }
}

fn merged_meta(base: &CommandSet, overlay: &CommandSet, merge_type: MergeType) -> SetMeta {
    let dominant = if overlay_dominates(base, overlay, merge_type) {
        overlay
    } else {
        base
    };
    let mut meta = dominant.meta().clone();
    meta.priority = base.priority().max(overlay.priority());
    meta
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Winner {
    Base,
    Overlay,
    Conflict,
}

/// Settle a Union/Neutral collision between a base entry and an overlay entry.
fn settle(
    base: &SetEntry,
    overlay: &SetEntry,
    overlay_neutral: bool,
    policy: DuplicatePolicy,
) -> Winner {
    match overlay.origin().priority.cmp(&base.origin().priority) {
        Ordering::Greater => return Winner::Overlay,
        Ordering::Less => return Winner::Base,
        Ordering::Equal => {}
    }

    match (base.origin().neutral, overlay_neutral) {
        (false, true) => return Winner::Base,
        (true, false) => return Winner::Overlay,
        _ => {}
    }

    match policy {
        DuplicatePolicy::KeepHighestPriority => {
            match overlay
                .command()
                .priority_in_set()
                .cmp(&base.command().priority_in_set())
            {
                Ordering::Less => Winner::Base,
                Ordering::Greater | Ordering::Equal => Winner::Overlay,
            }
        }
        DuplicatePolicy::KeepNewest => Winner::Overlay,
        DuplicatePolicy::Error => Winner::Conflict,
    }
}

fn union(base: &CommandSet, overlay: &CommandSet, merge_type: MergeType) -> MergeOutcome {
    let overlay_neutral = merge_type == MergeType::Neutral;
    let policy = overlay.duplicate_policy();
    let base_entries = base.entries();

    let mut kept = vec![true; base_entries.len()];
    let mut added: Vec<SetEntry> = Vec::new();
    let mut conflicts = Vec::new();

    for incoming in overlay.entries() {
        let hits: Vec<usize> = base
            .colliding(incoming.command())
            .into_iter()
            .filter(|&pos| kept[pos])
            .collect();

        if hits.is_empty() {
            added.push(incoming.merged_as(merge_type));
            continue;
        }

        let verdicts: Vec<Winner> = hits
            .iter()
            .map(|&pos| settle(&base_entries[pos], incoming, overlay_neutral, policy))
            .collect();

        if verdicts.contains(&Winner::Base) {
            continue;
        }

        if verdicts.contains(&Winner::Conflict) {
            for &pos in &hits {
                let existing = &base_entries[pos];
                let conflict = MergeConflict {
                    key: incoming.key().to_owned(),
                    names: existing
                        .command()
                        .names()
                        .filter(|name| incoming.command().has_name(name))
                        .map(str::to_owned)
                        .collect(),
                    base: existing.origin().set_key.clone(),
                    overlay: overlay.key().to_owned(),
                };
                tracing::warn!(
                    key = conflict.key.as_str(),
                    base = conflict.base.as_str(),
                    overlay = conflict.overlay.as_str(),
                    "ambiguous command dropped from merged set"
                );
                conflicts.push(conflict);
                kept[pos] = false;
            }
            continue;
        }

        for &pos in &hits {
            kept[pos] = false;
        }
        added.push(incoming.merged_as(merge_type));
    }

    let entries = base_entries
        .iter()
        .zip(&kept)
        .filter(|(_, keep)| **keep)
        .map(|(entry, _)| entry.clone())
        .chain(added)
        .collect();

    MergeOutcome {
        set: CommandSet::from_entries(merged_meta(base, overlay, merge_type), entries),
        conflicts,
    }
}

fn intersect(base: &CommandSet, overlay: &CommandSet) -> MergeOutcome {
    // A survivor must strictly beat (base side) or at least tie (overlay side)
    // every command it collides with, so survivors never collide.
    let base_survivors = base.entries().iter().filter(|entry| {
        let hits = overlay.colliding(entry.command());
        !hits.is_empty()
            && hits
                .iter()
                .all(|&pos| entry.origin().priority > overlay.entries()[pos].origin().priority)
    });

    let overlay_survivors = overlay.entries().iter().filter(|entry| {
        let hits = base.colliding(entry.command());
        !hits.is_empty()
            && hits
                .iter()
                .all(|&pos| entry.origin().priority >= base.entries()[pos].origin().priority)
    });

    let entries = base_survivors
        .cloned()
        .chain(overlay_survivors.map(|entry| entry.merged_as(MergeType::Intersect)))
        .collect();

    MergeOutcome::clean(CommandSet::from_entries(
        merged_meta(base, overlay, MergeType::Intersect),
        entries,
    ))
}

fn replace(base: &CommandSet, overlay: &CommandSet) -> MergeOutcome {
    if overlay.is_empty() {
        return MergeOutcome::clean(base.clone());
    }

    MergeOutcome::clean(CommandSet::from_entries(
        merged_meta(base, overlay, MergeType::Replace),
        overlay
            .entries()
            .iter()
            .map(|entry| entry.merged_as(MergeType::Replace))
            .collect(),
    ))
}

fn remove(base: &CommandSet, overlay: &CommandSet) -> MergeOutcome {
    let entries = base
        .entries()
        .iter()
        .filter(|entry| overlay.colliding(entry.command()).is_empty())
        .cloned()
        .collect();

    MergeOutcome::clean(CommandSet::from_entries(
        merged_meta(base, overlay, MergeType::Remove),
        entries,
    ))
}
