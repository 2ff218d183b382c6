use std::collections::BTreeMap;

use daygrid_core::{DateKey, DayRecord, DayState, FieldEdit};
use daygrid_storage::EntryRow;

use crate::dirty::DirtySet;

/// Local day records, keyed by day.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrackerState {
    records: BTreeMap<DateKey, DayRecord>,
}

impl TrackerState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &DateKey) -> Option<&DayRecord> {
        self.records.get(key)
    }

    /// The stored record, or the canonical empty record for an unknown day.
    pub fn record(&self, key: &DateKey) -> DayRecord {
        self.records.get(key).cloned().unwrap_or_default()
    }

    pub fn day_state(&self, key: &DateKey) -> DayState {
        DayState::compute(&self.record(key))
    }

    pub fn contains(&self, key: &DateKey) -> bool {
        self.records.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn keys(&self) -> impl Iterator<Item = &DateKey> {
        self.records.keys()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateKey, &DayRecord)> {
        self.records.iter()
    }

    /// Every day in `start..=end` with its record, empty where nothing is stored.
    pub fn days(&self, start: DateKey, end: DateKey) -> Vec<(DateKey, DayRecord)> {
        DateKey::range(start, end)
            .map(|key| (key, self.record(&key)))
            .collect()
    }
}

impl FromIterator<(DateKey, DayRecord)> for TrackerState {
    fn from_iter<I: IntoIterator<Item = (DateKey, DayRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Records fetched from the remote store for one window. Days without a
/// stored row are absent, not zero-filled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    records: BTreeMap<DateKey, DayRecord>,
}

impl Snapshot {
    pub fn from_rows(rows: impl IntoIterator<Item = EntryRow>) -> Self {
        Self {
            records: rows
                .into_iter()
                .map(|row| (row.day, row.to_record()))
                .collect(),
        }
    }

    pub fn get(&self, key: &DateKey) -> Option<&DayRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&DateKey, &DayRecord)> {
        self.records.iter()
    }
}

impl FromIterator<(DateKey, DayRecord)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (DateKey, DayRecord)>>(iter: I) -> Self {
        Self {
            records: iter.into_iter().collect(),
        }
    }
}

/// Result of merging a snapshot into local state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merged {
    pub state: TrackerState,
    /// Snapshot entries written into the new state.
    pub applied: usize,
    /// Snapshot entries skipped because their day was dirty.
    pub shielded: Vec<DateKey>,
}

/// Merge `snapshot` over `current`, keeping the local value of every dirty day.
///
/// Days absent from the snapshot are left as they are: a snapshot only
/// speaks for the window it was fetched for.
pub fn apply_remote_snapshot(current: &TrackerState, snapshot: &Snapshot, dirty: &DirtySet) -> Merged {
    let mut records = current.records.clone();
    let mut applied = 0;
    let mut shielded = Vec::new();
    for (key, remote) in snapshot.iter() {
        if dirty.contains(key) {
            shielded.push(*key);
            continue;
        }
        records.insert(*key, remote.clone());
        applied += 1;
    }
    Merged {
        state: TrackerState { records },
        applied,
        shielded,
    }
}

/// A local edit of one day.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Edit {
    Field(FieldEdit),
    Clear,
    ToggleGolden,
}

impl Edit {
    pub fn apply(&self, record: &DayRecord) -> DayRecord {
        match self {
            Self::Field(edit) => {
                let mut next = record.clone();
                edit.apply(&mut next);
                next
            }
            Self::Clear => record.cleared(),
            Self::ToggleGolden => record.toggle_golden(),
        }
    }
}

impl From<FieldEdit> for Edit {
    fn from(edit: FieldEdit) -> Self {
        Self::Field(edit)
    }
}

/// The only way a day changes locally. Returns the new state together with
/// the updated record so the caller can mark it dirty and persist it.
pub fn apply_edit(current: &TrackerState, key: DateKey, edit: &Edit) -> (TrackerState, DayRecord) {
    let updated = edit.apply(&current.record(&key));
    let mut records = current.records.clone();
    records.insert(key, updated.clone());
    (TrackerState { records }, updated)
}

/// Single-field form of [`apply_edit`].
pub fn edit_field(current: &TrackerState, key: DateKey, edit: FieldEdit) -> (TrackerState, DayRecord) {
    apply_edit(current, key, &Edit::Field(edit))
}
