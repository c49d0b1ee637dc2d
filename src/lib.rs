#![warn(clippy::pedantic, clippy::std_instead_of_core)]
#![allow(clippy::enum_glob_use, clippy::missing_errors_doc)]

mod cc;
mod io;
pub mod rpf7;

pub use bstr::{BStr, BString};
