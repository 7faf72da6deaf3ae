//! Token pump for one compilation unit.
//!
//! The [`Pipeline`] stands between the file system and the parser: it owns
//! the stack of open source files (the main file plus any `#include`s), the
//! lexer, the preprocessor and the environment, and hands out fully
//! preprocessed tokens in strict source order.
//!
//! Per token it:
//!
//! 1. lexes from the cursor of the innermost open file,
//! 2. lets the preprocessor consume any directive line (which may push an
//!    include onto the stack or flip conditional sections),
//! 3. discards tokens of disabled conditional sections,
//! 4. expands macros, re-entering the lexer over the prepended expansion.
//!
//! Comments are collected between tokens; meta tokens (includes, defines,
//! verbatim payloads) are collected for downstream emission.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use log::debug;
use sdvidl_base::{CompileError, ErrorKind, Location, Result};

use crate::codepos::CodeCursor;
use crate::environment::Environment;
use crate::lexer::{DirectiveFlow, Lexer, LexingMode, TokenSink};
use crate::preproc::{IncludeRequest, Preprocessor};
use crate::source::Source;
use crate::token::{Token, TokenKind};

/// At most 48 files can be nested.
const MAX_INCLUDE_DEPTH: usize = 48;

/// A meta token with the comments that preceded it.
#[derive(Debug, Clone)]
pub struct MetaToken {
    /// The directive's meta token.
    pub token: Token,
    /// Comments collected before the directive.
    pub comments: Vec<Token>,
}

/// One open source file.
#[derive(Debug)]
struct Frame {
    ctx: Rc<Source>,
    cursor: CodeCursor,
}

/// The front-end driver for one compilation unit.
#[derive(Debug)]
pub struct Pipeline {
    lexer: Lexer,
    preproc: Preprocessor,
    env: Environment,
    frames: Vec<Frame>,
    pending: VecDeque<Token>,
    comments: Vec<Token>,
    meta: Vec<MetaToken>,
    last_valid: Token,
    path: PathBuf,
}

impl Pipeline {
    /// Opens the IDL file at `path` as the main compilation unit.
    pub fn from_file(path: impl AsRef<Path>, env: Environment) -> Result<Self> {
        let source = Source::load(path)?;
        Ok(Self::with_source(source, env))
    }

    /// Uses literal code as the compilation unit (tests, tooling).
    pub fn from_source_text(code: &str, env: Environment) -> Result<Self> {
        Ok(Self::with_source(Source::from_literal(code), env))
    }

    fn with_source(source: Source, env: Environment) -> Self {
        let mut lexer = Lexer::new(env.case_sensitive_extension(), LexingMode::Idl);
        for keyword in env.extension_keywords() {
            lexer.add_keyword(keyword);
        }
        let ctx = Rc::new(source);
        let cursor = CodeCursor::new(&ctx);
        let path = ctx.path().to_path_buf();
        Self {
            lexer,
            preproc: Preprocessor::new(),
            env,
            frames: vec![Frame { ctx, cursor }],
            pending: VecDeque::new(),
            comments: Vec::new(),
            meta: Vec::new(),
            last_valid: Token::default(),
            path,
        }
    }

    /// The path of the main file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The environment of this compilation.
    pub fn env(&self) -> &Environment {
        &self.env
    }

    /// Mutable access to the environment.
    pub fn env_mut(&mut self) -> &mut Environment {
        &mut self.env
    }

    /// The last valid token handed out.
    pub fn last_valid_token(&self) -> &Token {
        &self.last_valid
    }

    /// Takes the comments collected since the last call.
    pub fn take_comments(&mut self) -> Vec<Token> {
        std::mem::take(&mut self.comments)
    }

    /// Takes the meta tokens collected since the last call.
    pub fn take_meta(&mut self) -> Vec<MetaToken> {
        std::mem::take(&mut self.meta)
    }

    /// Pushes a token back in front of the stream.
    pub fn prepend_token(&mut self, token: Token) {
        self.pending.push_front(token);
    }

    /// Returns the next preprocessed token, or an empty token at the end
    /// of the unit.
    pub fn next_token(&mut self) -> Result<Token> {
        if let Some(token) = self.pending.pop_front() {
            return Ok(token);
        }
        self.pump_token()
    }

    /// Returns the token `index` positions ahead without consuming it.
    pub fn peek_token(&mut self, index: usize) -> Result<Token> {
        while self.pending.len() <= index {
            let token = self.pump_token()?;
            let at_end = !token.is_valid();
            self.pending.push_back(token);
            if at_end {
                break;
            }
        }
        Ok(self.pending.get(index).cloned().unwrap_or_default())
    }

    /// Parses through the unit and its includes without interpretation,
    /// checking for lexical and preprocessor errors.
    pub fn lexical_check(&mut self) -> Result<&mut Self> {
        loop {
            let token = self.next_token()?;
            if !token.is_valid() {
                return Ok(self);
            }
        }
    }

    fn pump_token(&mut self) -> Result<Token> {
        loop {
            let Some(frame) = self.frames.last_mut() else {
                return Ok(Token::default());
            };

            if frame.cursor.at_eof() {
                let ending = Location::new(frame.ctx.path(), frame.cursor.line(), frame.cursor.col());
                self.frames.pop();
                if self.frames.is_empty() {
                    // The conditional stack must be balanced at the end of
                    // the unit.
                    self.preproc.finish(ending)?;
                    return Ok(Token::default());
                }
                self.lexer.enable_preproc_processing();
                continue;
            }

            let in_expansion = frame.cursor.in_expansion();
            let ctx = Rc::clone(&frame.ctx);
            let mut include = None;
            let mut sink = PumpSink {
                preproc: &mut self.preproc,
                env: &mut self.env,
                ctx: Rc::clone(&ctx),
                comments: &mut self.comments,
                meta: &mut self.meta,
                include: &mut include,
            };
            let token = self.lexer.next(&mut frame.cursor, Some(&ctx), &mut sink)?;

            if let Some(request) = include {
                self.push_include(request)?;
                continue;
            }
            if !token.is_valid() {
                // A directive was processed or the cursor ran dry; state
                // may have changed, re-enter.
                continue;
            }
            if !self.preproc.section_enabled() {
                continue;
            }

            if token.kind() == TokenKind::Identifier {
                let name = token.text().to_owned();
                let frame = self.frames.last_mut().ok_or_else(|| {
                    CompileError::bare(ErrorKind::Internal, "source stack empty during expansion")
                })?;
                if self
                    .env
                    .test_and_expand_current(&name, &mut frame.cursor, in_expansion)?
                {
                    continue;
                }
            }

            self.last_valid = token.clone();
            return Ok(token);
        }
    }

    fn push_include(&mut self, request: IncludeRequest) -> Result<()> {
        // A file already on the include stack is not re-included.
        if self.frames.iter().any(|f| f.ctx.path() == request.path) {
            debug!("suppressing circular include of {}", request.path.display());
            return Ok(());
        }
        if self.frames.len() >= MAX_INCLUDE_DEPTH {
            return Err(CompileError::new(
                ErrorKind::IncludeNotFound,
                format!("include nesting exceeds {MAX_INCLUDE_DEPTH} files"),
                Location::file_only(&request.path),
            ));
        }
        let source = Source::load(&request.path)?;
        let ctx = Rc::new(source);
        let cursor = CodeCursor::new(&ctx);
        self.frames.push(Frame { ctx, cursor });
        self.lexer.enable_preproc_processing();
        Ok(())
    }
}

/// Sink wiring the lexer's out-of-band channels into the pipeline.
struct PumpSink<'a> {
    preproc: &'a mut Preprocessor,
    env: &'a mut Environment,
    ctx: Rc<Source>,
    comments: &'a mut Vec<Token>,
    meta: &'a mut Vec<MetaToken>,
    include: &'a mut Option<IncludeRequest>,
}

impl TokenSink for PumpSink<'_> {
    fn comment(&mut self, token: &Token) {
        self.comments.push(token.clone());
    }

    fn directive(&mut self, cursor: &mut CodeCursor) -> Result<DirectiveFlow> {
        let outcome = self.preproc.process_directive(cursor, &self.ctx, self.env)?;
        if let Some(token) = outcome.meta {
            self.meta.push(MetaToken {
                token,
                comments: std::mem::take(self.comments),
            });
        }
        *self.include = outcome.include;
        Ok(DirectiveFlow::Yield)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pipeline(code: &str) -> Pipeline {
        Pipeline::from_source_text(code, Environment::new()).unwrap()
    }

    fn all_texts(code: &str) -> Vec<String> {
        let mut pipeline = pipeline(code);
        let mut texts = Vec::new();
        loop {
            let token = pipeline.next_token().unwrap();
            if !token.is_valid() {
                return texts;
            }
            texts.push(token.text().to_owned());
        }
    }

    #[test]
    fn plain_tokens_flow_through() {
        assert_eq!(
            all_texts("module m { };"),
            vec!["module", "m", "{", "}", ";"]
        );
    }

    #[test]
    fn define_then_expand() {
        assert_eq!(all_texts("#define N 10\nconst long x = N;"),
            vec!["const", "long", "x", "=", "10", ";"]);
    }

    #[test]
    fn disabled_sections_drop_their_tokens() {
        assert_eq!(
            all_texts("#if 0\nignored garbage\n#else\nkept\n#endif\n"),
            vec!["kept"]
        );
    }

    #[test]
    fn peek_does_not_consume() {
        let mut p = pipeline("one two three");
        assert_eq!(p.peek_token(1).unwrap().text(), "two");
        assert_eq!(p.next_token().unwrap().text(), "one");
        assert_eq!(p.next_token().unwrap().text(), "two");
    }

    #[test]
    fn prepend_token_goes_first() {
        let mut p = pipeline("b");
        p.prepend_token(Token::synthetic("a", TokenKind::Identifier));
        assert_eq!(p.next_token().unwrap().text(), "a");
        assert_eq!(p.next_token().unwrap().text(), "b");
    }

    #[test]
    fn comments_are_collected_between_tokens() {
        let mut p = pipeline("// intro\nmodule /* inner */ m;");
        let first = p.next_token().unwrap();
        assert_eq!(first.text(), "module");
        let comments = p.take_comments();
        assert_eq!(comments.len(), 1);
        assert_eq!(comments[0].text(), "// intro");
        p.next_token().unwrap();
        assert_eq!(p.take_comments()[0].text(), "/* inner */");
    }

    #[test]
    fn meta_tokens_record_directives() {
        let mut p = pipeline("#define ANSWER 42\n#verbatim const int x;\nmodule m;");
        p.lexical_check().unwrap();
        let meta = p.take_meta();
        assert_eq!(meta.len(), 2);
        assert_eq!(meta[0].token.text(), "ANSWER 42");
        assert_eq!(
            meta[0].token.meta_kind(),
            Some(crate::token::MetaKind::Define)
        );
        assert_eq!(meta[1].token.text(), "const int x;");
        assert_eq!(
            meta[1].token.meta_kind(),
            Some(crate::token::MetaKind::Verbatim)
        );
    }

    #[test]
    fn missing_endif_is_reported_at_eof() {
        let mut p = pipeline("#if 0\nbla bla\n");
        let err = p.lexical_check().unwrap_err();
        assert_eq!(err.kind, ErrorKind::UnbalancedDirective);
    }

    #[test]
    fn last_valid_token_tracks_output() {
        let mut p = pipeline("alpha beta");
        p.next_token().unwrap();
        p.next_token().unwrap();
        assert_eq!(p.last_valid_token().text(), "beta");
        p.next_token().unwrap();
        assert_eq!(p.last_valid_token().text(), "beta");
    }
}
