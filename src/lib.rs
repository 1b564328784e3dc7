//! Front end of an ICWS '94 Redcode assembler: turns source text into a
//! validated `Program` for a loader or simulator to consume.

#[macro_use] extern crate log;

pub mod assembler;
