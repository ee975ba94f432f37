//! Core types shared by the buffer, decode and player layers.
//! All boundary time values are milliseconds (i64).

pub mod time;

pub use time::Millis;
