#![forbid(unsafe_code)]

mod envelope;
mod time;

pub(crate) use envelope::*;
pub(crate) use time::*;
