//! Core value types

pub mod meas;

pub use meas::{in_interval, Flag, Id, Meas, QueryFilter, Time, Value};
