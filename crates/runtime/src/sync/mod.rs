//! Small concurrency primitives shared by the engines.

mod debounce;
mod single_flight;

pub use debounce::Debouncer;
pub use single_flight::{FlightGuard, SingleFlight};
