pub mod countdown;
pub mod date_key;
pub mod day_record;
pub mod day_state;
pub mod error;
pub mod ids;

pub use countdown::Countdown;
pub use date_key::{DateKey, DateRange};
pub use day_record::{DayRecord, FieldEdit, FixedSlot};
pub use day_state::{CellShade, DayState};
pub use error::CoreError;
pub use ids::UserId;
