#![doc(alias = "gta")]
#![doc(alias = "gta5")]
#![doc(alias = "rage")]
#![doc(alias = "packfile")]

//! RAGE Package File, version 7
//!
//! The single-file archive format used by the RAGE engine to bundle a
//! directory tree of game resources into one random-access container.
//! Entries are indexed by a flat table of bit-packed 16-byte records, names
//! live in a shift-aligned heap, and payload data sits on 512-byte block
//! boundaries, optionally stored as raw DEFLATE. Only `OPEN` (unencrypted)
//! archives are supported; the `AES` and `NG` variants are refused.
//!
//! # Reading
//! ```rust
//! use rpf::rpf7::Archive;
//! use std::{fs, path::Path};
//!
//! fn example() -> Option<()> {
//!     let path = Path::new("path/to/game/dlc.rpf");
//!     let mut archive = Archive::open(path).ok()?;
//!     let data = archive.entry_data("/common/data/levels.meta").ok()?;
//!     fs::write("levels.meta", data).ok()?;
//!     Some(())
//! }
//! ```
//!
//! # Writing
//! ```rust
//! use rpf::rpf7::ArchiveWriter;
//!
//! fn example() -> Option<()> {
//!     let mut archive = ArchiveWriter::create("example.rpf").ok()?;
//!     archive.add_entry("/common/data/levels.meta", "extracted/levels.meta");
//!     archive.finish().ok()?;
//!     Some(())
//! }
//! ```

mod archive;
mod compression;
mod format;
mod names;
mod tree;

pub use self::{
    archive::{Archive, ArchiveWriter, WriteOptions, WriteOptionsBuilder},
    format::Encryption,
};

use bstr::BString;
use core::num::TryFromIntError;
use std::{io, path::PathBuf};

#[non_exhaustive]
#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("the archive has grown past the addressable data region: {0} bytes")]
    ArchiveTooLarge(u64),

    #[error("failed to locate an entry at the given path: {0}")]
    EntryNotFound(BString),

    #[error("an entry's payload is too large for the on-disk size field: {0} bytes")]
    EntryTooLarge(u64),

    #[error("no file exists at the given path: {0}")]
    FileNotFound(PathBuf),

    #[error(transparent)]
    IntegralTruncation(#[from] TryFromIntError),

    #[error("invalid magic read from archive header: {0:#010X}")]
    InvalidMagic(u32),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("malformed archive: {0}")]
    MalformedArchive(&'static str),

    #[error("entry names can not fit within the name heap at any name shift")]
    NameHeapOverflow,

    #[error("the given path does not point at a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("archive uses an encryption scheme other than OPEN: {0:#010X}")]
    UnsupportedEncryption(u32),
}

pub type Result<T> = core::result::Result<T, Error>;
