use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Number of fixed task slots tracked per day.
pub const FIXED_SLOTS: usize = 3;

/// Completion data for one day. Carries no identity beyond its owning
/// [`DateKey`](crate::DateKey).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DayRecord {
    pub fixed: [bool; FIXED_SLOTS],
    pub optional: bool,
    pub optional_text: String,
}

impl DayRecord {
    /// The canonical empty record.
    pub fn empty() -> Self {
        Self::default()
    }

    /// Every fixed task and the optional task done.
    pub fn golden() -> Self {
        Self {
            fixed: [true; FIXED_SLOTS],
            optional: true,
            optional_text: String::new(),
        }
    }

    /// Coerce any JSON shape into a canonical record. Never fails.
    ///
    /// `fixed` is truncated or padded to three slots, keeping the first three
    /// supplied values. Non-boolean values are read by truthiness, a
    /// non-string text becomes empty, and anything that is not an object
    /// yields the empty record.
    pub fn normalize(raw: &Value) -> Self {
        let Value::Object(map) = raw else {
            return Self::empty();
        };

        let mut fixed = [false; FIXED_SLOTS];
        if let Some(Value::Array(items)) = map.get("fixed") {
            for (slot, item) in fixed.iter_mut().zip(items.iter()) {
                *slot = truthy(item);
            }
        }

        let optional = map.get("optional").is_some_and(truthy);
        let optional_text = map
            .get("optionalText")
            .or_else(|| map.get("optional_text"))
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();

        Self {
            fixed,
            optional,
            optional_text,
        }
    }

    pub fn done_count(&self) -> usize {
        self.fixed.iter().filter(|&&done| done).count()
    }

    pub fn is_golden(&self) -> bool {
        self.done_count() == FIXED_SLOTS && self.optional
    }

    /// No fixed task and no optional task done. Text is not considered.
    pub fn is_empty(&self) -> bool {
        self.done_count() == 0 && !self.optional
    }

    /// Flip between golden and empty as a single whole-record edit.
    ///
    /// A golden record resets to the canonical empty record. Anything else
    /// becomes golden, keeping the optional text that was already written.
    pub fn toggle_golden(&self) -> Self {
        if self.is_golden() {
            Self::empty()
        } else {
            Self {
                fixed: [true; FIXED_SLOTS],
                optional: true,
                optional_text: self.optional_text.clone(),
            }
        }
    }

    /// Reset to the canonical empty record, preserving nothing.
    pub fn cleared(&self) -> Self {
        Self::empty()
    }

    pub fn to_value(&self) -> Value {
        serde_json::json!({
            "fixed": self.fixed,
            "optional": self.optional,
            "optionalText": self.optional_text,
        })
    }
}

/// JSON truthiness: `false`, `null`, `0` and `""` are false.
fn truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0 && !f.is_nan()),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

/// One of the three fixed task slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FixedSlot {
    First,
    Second,
    Third,
}

impl FixedSlot {
    pub const ALL: [FixedSlot; FIXED_SLOTS] = [Self::First, Self::Second, Self::Third];

    pub fn index(self) -> usize {
        match self {
            Self::First => 0,
            Self::Second => 1,
            Self::Third => 2,
        }
    }

    pub fn from_index(index: usize) -> Option<Self> {
        Self::ALL.get(index).copied()
    }
}

/// A mutation of exactly one field of a [`DayRecord`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldEdit {
    Fixed(FixedSlot, bool),
    Optional(bool),
    OptionalText(String),
}

impl FieldEdit {
    pub fn apply(&self, record: &mut DayRecord) {
        match self {
            Self::Fixed(slot, done) => record.fixed[slot.index()] = *done,
            Self::Optional(done) => record.optional = *done,
            Self::OptionalText(text) => record.optional_text.clone_from(text),
        }
    }

    pub fn field_name(&self) -> &'static str {
        match self {
            Self::Fixed(FixedSlot::First, _) => "fixed1",
            Self::Fixed(FixedSlot::Second, _) => "fixed2",
            Self::Fixed(FixedSlot::Third, _) => "fixed3",
            Self::Optional(_) => "optional",
            Self::OptionalText(_) => "optional_text",
        }
    }
}
