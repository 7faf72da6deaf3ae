//! # sdvidl-base
//!
//! Structural atoms for the SDV IDL compiler.
//!
//! This crate provides the foundational types shared by the front end and
//! the command-line driver:
//!
//! - [`CompileError`]/[`ErrorKind`]/[`Result`] — errors with source positions
//! - [`Location`] — file/line/column triple attached to tokens and errors
//! - [`ConstValue`] — literal constants decoded into the smallest fitting type
//!
//! The crate has no knowledge of IDL syntax or I/O; it only provides the
//! generic infrastructure that `sdvidl-front` builds upon.

pub mod error;
pub mod value;

pub use error::{CompileError, ErrorKind, Location, Result};
pub use value::ConstValue;
