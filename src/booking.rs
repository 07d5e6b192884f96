pub use self::bulk::{expand_dates, parse_selector, SelectorParseError, WeekdaySelector};
pub use self::engine::{Availability, BookingEngine, BookingError, BulkOutcome, ToggleAction};
pub use self::policy::{AccessPolicy, Decision, WeekParity};
pub use self::pool::{SeatPool, SeatSlot};

pub mod bulk;
pub mod engine;
pub mod policy;
pub mod pool;
