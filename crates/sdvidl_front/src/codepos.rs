//! Position-tracking cursor over a source buffer.
//!
//! A [`CodeCursor`] walks a source buffer byte by byte while maintaining the
//! current line and column. It additionally supports *prepending* synthetic
//! text (macro expansions, precedence re-parses) in front of the current
//! position: while prepended text is active the cursor reads from it, and
//! navigation drops back into the original buffer once it is exhausted.
//!
//! Line/column accounting is attached to the source buffer only. Prepended
//! text is synthetic and attributed to the position of the macro invocation
//! that produced it, so advancing through it changes neither line nor
//! column.
//!
//! Tokens snapshotted with [`CodeCursor::location`] are volatile: a later
//! `prepend` or `reset` replaces the prepended buffer they may point into.
//! [`CodeCursor::update_location`] finalises a token by computing its length
//! and, when the token starts inside the active prepended buffer, promoting
//! the spanned text (plus any overflow into the source buffer) into an owned
//! chunk that the token keeps alive on its own.

use std::rc::Rc;

use sdvidl_base::{CompileError, ErrorKind, Result};

use crate::source::Source;
use crate::token::{LiteralKind, MetaKind, Token, TokenKind};

/// Width of the tab stops used for column accounting.
const TAB_WIDTH: u32 = 4;

/// State of an active prepended buffer.
#[derive(Debug, Clone)]
struct Prepend {
    /// The synthetic text.
    buf: Rc<str>,
    /// Read position within `buf`.
    pos: usize,
    /// Source offset the cursor resumes from once `buf` is exhausted.
    resume: usize,
}

impl Prepend {
    fn exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

/// Code string with position information.
#[derive(Debug, Clone)]
pub struct CodeCursor {
    code: Rc<str>,
    pos: usize,
    line: u32,
    col: u32,
    prepend: Option<Prepend>,
}

impl CodeCursor {
    /// Creates a cursor at line 1, column 1 of the given source.
    pub fn new(source: &Source) -> Self {
        Self::from_shared(source.shared_code())
    }

    /// Creates a cursor over literal text (macro bodies, expression
    /// re-parses, tests).
    pub fn from_text(code: &str) -> Self {
        Self::from_shared(Rc::from(code))
    }

    fn from_shared(code: Rc<str>) -> Self {
        Self {
            code,
            pos: 0,
            line: 1,
            col: 1,
            prepend: None,
        }
    }

    /// Resets navigation to the start of the buffer, dropping any prepended
    /// text.
    pub fn reset(&mut self) {
        self.pos = 0;
        self.line = 1;
        self.col = 1;
        self.prepend = None;
    }

    /// Current 1-based line of the source buffer.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// Current 1-based column of the source buffer.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// Returns `true` when both the prepended buffer and the source buffer
    /// are exhausted.
    pub fn at_eof(&self) -> bool {
        let prepend_done = self.prepend.as_ref().map_or(true, Prepend::exhausted);
        prepend_done && self.pos >= self.code.len()
    }

    /// Returns `true` at a line break (`\n` or `\r\n`) or at EOF.
    pub fn at_eol(&self) -> bool {
        match self.peek(0) {
            0 => true,
            b'\n' => true,
            b'\r' => self.peek(1) == b'\n',
            _ => false,
        }
    }

    /// The byte at `offset` positions past the current one, `0` past EOF.
    ///
    /// The offset first runs through the remainder of the prepended buffer,
    /// then through the source buffer.
    pub fn peek(&self, offset: usize) -> u8 {
        if let Some(prepend) = &self.prepend {
            let remaining = prepend.buf.len().saturating_sub(prepend.pos);
            if offset < remaining {
                return prepend.buf.as_bytes()[prepend.pos + offset];
            }
            let source_offset = offset - remaining;
            return *self
                .code
                .as_bytes()
                .get(self.pos + source_offset)
                .unwrap_or(&0);
        }
        *self.code.as_bytes().get(self.pos + offset).unwrap_or(&0)
    }

    /// The current byte, `0` at EOF.
    pub fn current(&self) -> u8 {
        self.peek(0)
    }

    /// Advances one byte.
    ///
    /// Advancing inside the prepended buffer does not touch line or column.
    /// Advancing in the source buffer updates them: `\n` starts a new line,
    /// `\t` aligns the column to the next tab stop.
    pub fn advance(&mut self) {
        if let Some(prepend) = &mut self.prepend {
            if !prepend.exhausted() {
                prepend.pos += 1;
                return;
            }
        }

        let Some(&byte) = self.code.as_bytes().get(self.pos) else {
            return;
        };
        match byte {
            b'\n' => {
                self.line += 1;
                self.col = 1;
            }
            b'\t' => {
                self.col += 1;
                while (self.col - 1) % TAB_WIDTH != 0 {
                    self.col += 1;
                }
            }
            _ => self.col += 1,
        }
        self.pos += 1;
    }

    /// Advances `count` bytes.
    pub fn advance_by(&mut self, count: usize) {
        for _ in 0..count {
            self.advance();
        }
    }

    /// Snapshot of the current position as a zero-length token of the given
    /// kind.
    ///
    /// The returned token is volatile until [`CodeCursor::update_location`]
    /// is called: a later `prepend` or `reset` may replace the buffer it
    /// points into.
    pub fn location(&self, kind: TokenKind) -> Token {
        let (buf, start) = match &self.prepend {
            Some(prepend) if !prepend.exhausted() => (Rc::clone(&prepend.buf), prepend.pos),
            _ => (Rc::clone(&self.code), self.pos),
        };
        Token::open_span(buf, start, self.line, self.col, kind)
    }

    /// Finalises a token started with [`CodeCursor::location`] by computing
    /// its length from the current position.
    ///
    /// When the token starts inside the active prepended buffer, the spanned
    /// text (plus any overflow into the source buffer if the prepended text
    /// has been exhausted) is copied into an owned chunk so the token stays
    /// valid across later prepends and resets.
    pub fn update_location(&self, token: &mut Token) {
        if !token.has_span() {
            return;
        }

        if let Some(prepend) = &self.prepend {
            if token.span_is_in(&prepend.buf) {
                let start = token.span_start();
                if start <= prepend.pos {
                    let mut chunk = prepend.buf[start..prepend.pos].to_owned();
                    if prepend.exhausted() {
                        chunk.push_str(&self.code[prepend.resume..self.pos]);
                    }
                    token.retarget_to_chunk(chunk);
                    return;
                }
                token.clear_span();
                return;
            }
        }

        if token.span_is_in(&self.code) && token.span_start() <= self.pos {
            token.close_span(self.pos);
            return;
        }

        // The start position does not belong to any active buffer.
        token.clear_span();
    }

    /// Finalises a token and classifies it as a literal of the given kind.
    ///
    /// Fails with an internal error when the token already carries an
    /// incompatible classification.
    pub fn update_location_literal(&self, token: &mut Token, literal: LiteralKind) -> Result<()> {
        self.update_location(token);
        match token.kind() {
            TokenKind::Literal | TokenKind::None => {
                token.classify_literal(literal);
                Ok(())
            }
            _ => Err(CompileError::new(
                ErrorKind::Internal,
                "invalid token type during literal classification",
                token.location(),
            )),
        }
    }

    /// Finalises a token and classifies it as a meta token of the given kind.
    pub fn update_location_meta(&self, token: &mut Token, meta: MetaKind) -> Result<()> {
        self.update_location(token);
        match token.kind() {
            TokenKind::Meta | TokenKind::None => {
                token.classify_meta(meta);
                Ok(())
            }
            _ => Err(CompileError::new(
                ErrorKind::Internal,
                "invalid token type during meta classification",
                token.location(),
            )),
        }
    }

    /// Inserts synthetic text in front of the current position.
    ///
    /// Any unconsumed remainder of a previous prepend is kept behind the new
    /// text, and the source-side return point is remembered so navigation
    /// resumes correctly once the synthetic text is exhausted.
    pub fn prepend(&mut self, text: &str) {
        if text.is_empty() {
            return;
        }
        let mut combined = text.to_owned();
        if let Some(prepend) = &self.prepend {
            if !prepend.exhausted() {
                combined.push_str(&prepend.buf[prepend.pos..]);
            }
        }
        self.prepend = Some(Prepend {
            buf: Rc::from(combined.as_str()),
            pos: 0,
            resume: self.pos,
        });
    }

    /// Returns `true` while the current position lies within prepended text.
    pub fn in_expansion(&self) -> bool {
        self.prepend.as_ref().is_some_and(|p| !p.exhausted())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cursor(text: &str) -> CodeCursor {
        CodeCursor::from_text(text)
    }

    #[test]
    fn new_cursor_starts_at_line_one_column_one() {
        let cur = cursor("abc");
        assert_eq!(cur.line(), 1);
        assert_eq!(cur.col(), 1);
        assert_eq!(cur.current(), b'a');
        assert!(!cur.at_eof());
    }

    #[test]
    fn advancing_over_newline_bumps_line_and_resets_column() {
        let mut cur = cursor("a\nb");
        cur.advance();
        assert_eq!((cur.line(), cur.col()), (1, 2));
        cur.advance();
        assert_eq!((cur.line(), cur.col()), (2, 1));
        assert_eq!(cur.current(), b'b');
    }

    #[test]
    fn tab_aligns_to_next_tab_stop() {
        let mut cur = cursor("a\tb");
        cur.advance();
        assert_eq!(cur.col(), 2);
        cur.advance();
        assert_eq!(cur.col(), 5);
    }

    #[test]
    fn eol_detects_both_line_endings() {
        let mut cur = cursor("a\r\nb\nc");
        assert!(!cur.at_eol());
        cur.advance();
        assert!(cur.at_eol());
        cur.advance_by(2);
        assert!(!cur.at_eol());
        cur.advance();
        assert!(cur.at_eol());
    }

    #[test]
    fn prepended_text_is_read_first() {
        let mut cur = cursor("xyz");
        cur.advance();
        cur.prepend("ab");
        assert!(cur.in_expansion());
        assert_eq!(cur.current(), b'a');
        cur.advance();
        assert_eq!(cur.current(), b'b');
        cur.advance();
        assert!(!cur.in_expansion());
        assert_eq!(cur.current(), b'y');
    }

    #[test]
    fn prepending_keeps_unconsumed_remainder() {
        let mut cur = cursor("z");
        cur.prepend("cd");
        cur.advance();
        cur.prepend("ab");
        let collected: String = std::iter::from_fn(|| {
            if cur.at_eof() {
                None
            } else {
                let byte = cur.current();
                cur.advance();
                Some(byte as char)
            }
        })
        .collect();
        assert_eq!(collected, "abdz");
    }

    #[test]
    fn prepended_text_does_not_move_line_or_column() {
        let mut cur = cursor("xy");
        cur.advance();
        let before = (cur.line(), cur.col());
        cur.prepend("expanded");
        while cur.in_expansion() {
            cur.advance();
        }
        assert_eq!((cur.line(), cur.col()), before);
    }

    #[test]
    fn peek_crosses_from_prepend_into_source() {
        let mut cur = cursor("xyz");
        cur.prepend("ab");
        assert_eq!(cur.peek(0), b'a');
        assert_eq!(cur.peek(1), b'b');
        assert_eq!(cur.peek(2), b'x');
        assert_eq!(cur.peek(4), b'z');
        assert_eq!(cur.peek(5), 0);
    }

    #[test]
    fn update_location_measures_source_span() {
        let mut cur = cursor("module x;");
        let mut token = cur.location(TokenKind::Identifier);
        cur.advance_by(6);
        cur.update_location(&mut token);
        assert_eq!(token.text(), "module");
        assert_eq!((token.line(), token.col()), (1, 1));
    }

    #[test]
    fn token_spanning_prepend_survives_reset() {
        let mut cur = cursor("BA rest");
        cur.advance_by(2); // consume "BA"
        cur.prepend("AB");
        let mut token = cur.location(TokenKind::Identifier);
        cur.advance_by(2); // consume prepended "AB"
        cur.advance(); // overflow into " " of the source
        cur.update_location(&mut token);
        assert_eq!(token.text(), "AB ");
        cur.reset();
        assert_eq!(token.text(), "AB ");
    }

    #[test]
    fn reset_restores_the_start_and_drops_prepends() {
        let mut cur = cursor("ab");
        cur.advance();
        cur.prepend("zz");
        cur.reset();
        assert_eq!(cur.current(), b'a');
        assert!(!cur.in_expansion());
        assert_eq!((cur.line(), cur.col()), (1, 1));
    }
}
