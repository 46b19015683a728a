//! Domain types for ContLab

pub mod bar;
pub mod contract;

pub use bar::Bar;
pub use contract::{Contract, MonthCode};
