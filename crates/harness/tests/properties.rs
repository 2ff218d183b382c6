use daygrid_core::{DateKey, DayRecord, FieldEdit, FixedSlot};
use daygrid_engine::{DirtySet, Edit, Snapshot, TrackerState, apply_edit, apply_remote_snapshot};
use proptest::prelude::*;

fn day(offset: u64) -> DateKey {
    let base: DateKey = "2024-01-01".parse().unwrap();
    base.plus_days(offset).unwrap()
}

fn arb_record() -> impl Strategy<Value = DayRecord> {
    (any::<[bool; 3]>(), any::<bool>(), "[a-z]{0,6}").prop_map(|(fixed, optional, text)| DayRecord {
        fixed,
        optional,
        optional_text: text,
    })
}

fn arb_days() -> impl Strategy<Value = Vec<(DateKey, DayRecord)>> {
    prop::collection::vec((0u64..30, arb_record()), 0..20)
        .prop_map(|v| v.into_iter().map(|(d, r)| (day(d), r)).collect())
}

fn arb_edit() -> impl Strategy<Value = Edit> {
    prop_oneof![
        Just(Edit::Clear),
        Just(Edit::ToggleGolden),
        (0usize..3, any::<bool>()).prop_map(|(i, v)| {
            let slot = FixedSlot::from_index(i).unwrap_or(FixedSlot::First);
            Edit::Field(FieldEdit::Fixed(slot, v))
        }),
        any::<bool>().prop_map(|v| Edit::Field(FieldEdit::Optional(v))),
        "[a-z]{0,6}".prop_map(|t| Edit::Field(FieldEdit::OptionalText(t))),
    ]
}

proptest! {
    #[test]
    fn dirty_days_keep_their_local_value(
        local in arb_days(),
        remote in arb_days(),
        dirty in prop::collection::vec(0u64..30, 0..10),
    ) {
        let current: TrackerState = local.into_iter().collect();
        let snapshot: Snapshot = remote.into_iter().collect();
        let dirty: DirtySet = dirty.into_iter().map(day).collect();

        let merged = apply_remote_snapshot(&current, &snapshot, &dirty);

        for key in dirty.iter() {
            prop_assert_eq!(merged.state.get(key), current.get(key));
        }
        for (key, remote) in snapshot.iter() {
            if !dirty.contains(key) {
                prop_assert_eq!(merged.state.get(key), Some(remote));
            }
        }
        prop_assert_eq!(merged.applied + merged.shielded.len(), snapshot.len());
    }

    #[test]
    fn merge_never_drops_local_days(local in arb_days(), remote in arb_days()) {
        let current: TrackerState = local.into_iter().collect();
        let snapshot: Snapshot = remote.into_iter().collect();

        let merged = apply_remote_snapshot(&current, &snapshot, &DirtySet::new());

        for key in current.keys() {
            prop_assert!(merged.state.contains(key));
        }
        for key in merged.state.keys() {
            prop_assert!(current.contains(key) || snapshot.get(key).is_some());
        }
    }

    #[test]
    fn merging_twice_changes_nothing(
        local in arb_days(),
        remote in arb_days(),
        dirty in prop::collection::vec(0u64..30, 0..10),
    ) {
        let current: TrackerState = local.into_iter().collect();
        let snapshot: Snapshot = remote.into_iter().collect();
        let dirty: DirtySet = dirty.into_iter().map(day).collect();

        let once = apply_remote_snapshot(&current, &snapshot, &dirty);
        let twice = apply_remote_snapshot(&once.state, &snapshot, &dirty);
        prop_assert_eq!(once.state, twice.state);
    }

    #[test]
    fn edits_touch_only_their_own_day(
        local in arb_days(),
        offset in 0u64..30,
        edit in arb_edit(),
    ) {
        let current: TrackerState = local.into_iter().collect();
        let key = day(offset);

        let (next, record) = apply_edit(&current, key, &edit);

        prop_assert_eq!(next.get(&key), Some(&record));
        prop_assert_eq!(&record, &edit.apply(&current.record(&key)));
        for (other, value) in current.iter().filter(|(k, _)| **k != key) {
            prop_assert_eq!(next.get(other), Some(value));
        }
        prop_assert!(next.len() == current.len() || next.len() == current.len() + 1);
    }
}
