pub mod controller;
pub mod state;

pub use controller::ConversionSession;
pub use state::{SessionEvent, SessionSnapshot};
