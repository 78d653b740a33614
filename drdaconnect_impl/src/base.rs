#[macro_use]
mod drda_error;

pub use drda_error::{DrdaError, DrdaResult, SecurityCheckReason};
