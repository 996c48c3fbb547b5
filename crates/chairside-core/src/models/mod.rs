//! Domain models for the visit queue and day-close settlement.

mod billing;
mod clinic;
mod patient;
mod settlement;
mod visit;

pub use billing::*;
pub use clinic::*;
pub use patient::*;
pub use settlement::*;
pub use visit::*;
