//! vcpatch: VCDIFF (RFC 3284) patch decoding in Rust.
//!
//! The crate provides:
//! - A pure-Rust VCDIFF decoder (`vcdiff`)
//! - File-oriented helpers (`io`)
//! - An optional CLI (`cli` feature)
//!
//! Patches must use the default code table and no secondary compression,
//! which is what `xdelta3 -S none` produces.
//!
//! # Quick Start
//!
//! ```no_run
//! use vcpatch::vcdiff::decode_memory;
//!
//! let source = std::fs::read("game.iso").unwrap();
//! let patch = std::fs::read("translation.xdelta").unwrap();
//! let target = decode_memory(&source, &patch).unwrap();
//! std::fs::write("game-patched.iso", target).unwrap();
//! ```
//!
//! For large inputs use [`io::decode_file`], which streams the source
//! and output through seekable files instead of memory.

pub mod io;
pub mod vcdiff;

#[cfg(feature = "cli")]
pub mod cli;
