//! Domain model for the COD/BOD water-quality lab trainer.
//!
//! Pure, synchronous state: procedures and their step rules, the session state
//! machine, the error log and the scorer. Anything that waits on time (heaters,
//! incubators) lives in `lab-services`.

#![forbid(unsafe_code)]

pub mod error;
pub mod model;
pub mod scorer;
pub mod time;
pub mod validator;

pub use error::Error;
pub use time::{Clock, SessionClock};
