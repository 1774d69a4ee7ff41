#![deny(clippy::enum_glob_use)]
#![warn(clippy::pedantic, clippy::nursery)]
#![forbid(unsafe_code)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::module_name_repetitions)]

#[macro_use]
extern crate strum;

pub mod codegen;

#[cfg(test)]
mod test_utils;
