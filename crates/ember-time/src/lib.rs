mod clock;

pub use clock::{TimeSnapshot, WorldClock};
