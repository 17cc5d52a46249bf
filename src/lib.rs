#![allow(clippy::single_match)]
#![allow(clippy::verbose_bit_mask)]
#![allow(clippy::cognitive_complexity)]

#[macro_use]
extern crate log;

#[macro_use]
extern crate quick_error;

#[macro_use]
extern crate serde_derive;

#[cfg(test)]
extern crate pretty_assertions;

pub mod cpu;
pub mod io;
pub mod memory;
