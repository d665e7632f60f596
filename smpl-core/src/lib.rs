//! A discrete-event simulation core in the tradition of MacDougall's
//! `smpl`: a virtual-clock event scheduler, priority/preemption-aware
//! facilities, and a calibrated linear-congruential PRNG with distribution
//! samplers.
//!
//! A driver program schedules initial events, then repeatedly calls
//! [`engine::Simulation::cause`] to dispatch the earliest pending event,
//! acting on it (which may schedule further events, or request/release
//! facility servers), until the queue empties or the model's own stop
//! condition is reached.

mod descriptor;
pub mod engine;
pub mod error;
mod facility;
pub mod prng;
mod report;

pub use engine::{FacilityHandle, Outcome, Simulation};
pub use error::{Result, SmplError};
pub use prng::{Prng, DEFAULT_STREAMS};
