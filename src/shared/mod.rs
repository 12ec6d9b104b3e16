pub mod clock;
pub mod token_counter;

pub use clock::{Clock, ManualClock, SystemClock};
pub use token_counter::TokenCounter;
