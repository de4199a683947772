pub mod log;

pub use log::{FeedbackError, FeedbackLog};
