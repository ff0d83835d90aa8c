pub mod report;
pub mod runner;

pub use report::{BatchReport, ItemOutcome, QueryFailure};
pub use runner::{BatchRunner, QueryJob};
