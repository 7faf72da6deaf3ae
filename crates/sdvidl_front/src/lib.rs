//! # sdvidl-front
//!
//! The front end of the SDV IDL compiler: everything between a file on disk
//! and the token stream the parser consumes.
//!
//! ## Architecture
//!
//! The front end is a stack of small, single-purpose layers (leaves first):
//!
//! | Layer | Module | Responsibility |
//! |-------|--------|----------------|
//! | Source | [`source`] | Load a file, detect the BOM, normalise to UTF-8 |
//! | Cursor | [`codepos`] | Navigate the buffer, track line/column, splice macro expansions |
//! | Token | [`token`] | Spans, classifications, literal value decoding |
//! | Lexer | [`lexer`] | OMG IDL 4.2 tokenizer with preprocessor-line mode |
//! | Macros | [`macros`] | `#define` storage and expansion with `#`/`##` |
//! | Preprocessor | [`preproc`] | Directives, conditional sections, `#if` evaluation |
//! | Environment | [`environment`] | Include dirs, macro map, extension flags, options |
//! | Pipeline | [`pipeline`] | Token pump driving all of the above per compilation unit |
//!
//! Tokenization is single-threaded and cooperative: one [`pipeline::Pipeline`]
//! owns one compilation unit at a time, and concurrent compilations must own
//! independent [`environment::Environment`]s.
//!
//! ## Example
//!
//! ```
//! use sdvidl_front::environment::Environment;
//! use sdvidl_front::pipeline::Pipeline;
//!
//! let mut pipeline = Pipeline::from_source_text(
//!     "module vehicle { interface Door { void open(); }; };",
//!     Environment::new(),
//! ).unwrap();
//! let token = pipeline.next_token().unwrap();
//! assert_eq!(token.text(), "module");
//! ```

pub mod codepos;
pub mod environment;
pub mod lexer;
pub mod macros;
pub mod pipeline;
pub mod preproc;
pub mod source;
pub mod token;

pub use codepos::CodeCursor;
pub use environment::Environment;
pub use lexer::{DirectiveFlow, Lexer, LexingMode, NullSink, StoreSink, TokenSink};
pub use macros::{MacroDef, MacroMap, UsedMacroSet};
pub use pipeline::{MetaToken, Pipeline};
pub use preproc::Preprocessor;
pub use source::Source;
pub use token::{LiteralKind, MetaKind, Token, TokenKind};
