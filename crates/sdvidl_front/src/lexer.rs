//! OMG IDL 4.2 tokenizer.
//!
//! The lexer converts the current cursor position into the next token.
//! Whitespace, comments and preprocessor directives are not returned as
//! results; they are routed out-of-band through a [`TokenSink`].
//!
//! Two modes exist:
//!
//! - [`LexingMode::Idl`] — the default rule set. At the start of a line a
//!   `#` hands control to the sink's directive handler.
//! - [`LexingMode::Preproc`] — used while scanning the body of a
//!   `#`-directive. A newline terminates the token stream (unless escaped
//!   with a `\` continuation) and `#`/`##` become operators.
//!
//! Beyond the OMG IDL 4.2 grammar the literal scanner accepts the C++-style
//! extensions of the original middleware IDL: binary integers, integer and
//! float suffixes, hexadecimal floats, UTF-8/16/32 and wide character and
//! string prefixes, raw strings, character sequences, and the boolean and
//! null literals.

use std::rc::Rc;

use sdvidl_base::{CompileError, ErrorKind, Result};

use crate::codepos::CodeCursor;
use crate::source::Source;
use crate::token::{LiteralKind, Token, TokenKind};

/// The OMG IDL 4.2 reserved keywords.
///
/// Depending on the enabled extensions the set is extended with `char16`,
/// `char32`, `u8string`, `u16string`, `u32string`, `null`, `pointer`,
/// `interface_id`, `interface_t` and `exception_id`.
pub const OMG_IDL_KEYWORDS: &[&str] = &[
    "abstract", "any", "alias", "attribute", "bitfield", "bitmask", "bitset", "boolean", "case",
    "char", "component", "connector", "const", "consumes", "context", "custom", "default",
    "double", "exception", "emits", "enum", "eventtype", "factory", "finder", "fixed", "float",
    "getraises", "home", "import", "in", "inout", "interface", "local", "long", "manages", "map",
    "mirrorport", "module", "multiple", "native", "Object", "octet", "oneway", "out", "primarykey",
    "private", "port", "porttype", "provides", "public", "publishes", "raises", "readonly",
    "setraises", "sequence", "short", "string", "struct", "supports", "switch", "truncatable",
    "typedef", "typeid", "typename", "typeprefix", "unsigned", "union", "uses", "ValueBase",
    "valuetype", "void", "wchar", "wstring", "int8", "uint8", "int16", "int32", "int64", "uint16",
    "uint32", "uint64",
];

/// Lexing rule set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LexingMode {
    /// Lexing IDL code.
    #[default]
    Idl,
    /// Lexing preprocessor directives (valid for the current line only).
    Preproc,
}

/// What the lexer should do after the sink handled a directive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DirectiveFlow {
    /// Keep scanning for the next token.
    Resume,
    /// Return an empty token so the caller can re-enter; used when the
    /// directive may have switched the active source or conditional state.
    Yield,
}

/// Receiver for the out-of-band token classes.
pub trait TokenSink {
    /// Called with every whitespace run.
    fn whitespace(&mut self, _token: &Token) {}

    /// Called with every comment.
    fn comment(&mut self, _token: &Token) {}

    /// Called when a `#` directive starts a line in IDL mode. The handler
    /// must consume the directive from the cursor.
    fn directive(&mut self, cursor: &mut CodeCursor) -> Result<DirectiveFlow>;
}

/// Sink that ignores whitespace and comments and skips over directives.
pub struct NullSink;

impl TokenSink for NullSink {
    fn directive(&mut self, cursor: &mut CodeCursor) -> Result<DirectiveFlow> {
        let mut lexer = Lexer::new(true, LexingMode::Preproc);
        lexer.skip_line(cursor);
        Ok(DirectiveFlow::Resume)
    }
}

/// Sink that stores the most recent whitespace, comment and directive line.
#[derive(Default)]
pub struct StoreSink {
    /// Most recent whitespace token.
    pub whitespace: Token,
    /// Most recent comment token.
    pub comment: Token,
    /// Text of the most recent directive line.
    pub preproc_line: String,
}

impl StoreSink {
    /// Clears the stored values.
    pub fn clear(&mut self) {
        self.whitespace = Token::default();
        self.comment = Token::default();
        self.preproc_line.clear();
    }
}

impl TokenSink for StoreSink {
    fn whitespace(&mut self, token: &Token) {
        self.whitespace = token.clone();
    }

    fn comment(&mut self, token: &Token) {
        self.comment = token.clone();
    }

    fn directive(&mut self, cursor: &mut CodeCursor) -> Result<DirectiveFlow> {
        let mut token = cursor.location(TokenKind::None);
        let mut lexer = Lexer::new(true, LexingMode::Preproc);
        lexer.skip_line(cursor);
        cursor.update_location(&mut token);
        self.preproc_line = token.text().to_owned();
        Ok(DirectiveFlow::Resume)
    }
}

/// The IDL lexer.
#[derive(Debug)]
pub struct Lexer {
    case_sensitive: bool,
    mode: LexingMode,
    newline_occurred: bool,
    last_valid: Token,
    keywords: Vec<String>,
}

impl Lexer {
    /// Creates a lexer.
    ///
    /// `case_sensitive` mirrors the case-sensitive-names extension: when it
    /// is off, identifiers that differ from a reserved keyword only in case
    /// are rejected.
    pub fn new(case_sensitive: bool, mode: LexingMode) -> Self {
        Self {
            case_sensitive,
            mode,
            newline_occurred: true,
            last_valid: Token::default(),
            keywords: OMG_IDL_KEYWORDS.iter().map(|s| (*s).to_owned()).collect(),
        }
    }

    /// Extends the reserved keyword set (extension keywords).
    pub fn add_keyword(&mut self, keyword: &str) {
        self.keywords.push(keyword.to_owned());
    }

    /// The last valid token returned by [`Lexer::next`].
    pub fn last_valid(&self) -> &Token {
        &self.last_valid
    }

    /// Re-arms the line-start flag so a directive can follow immediately.
    ///
    /// While a directive is being parsed, further directive processing is
    /// disabled; after switching to an included file it needs to be enabled
    /// again.
    pub fn enable_preproc_processing(&mut self) {
        self.newline_occurred = true;
    }

    /// Returns the next token, skipping whitespace and comments (forwarded
    /// to the sink). Returns an empty token at EOF, at the end of a
    /// directive line in preprocessor mode, and after a directive handler
    /// requested [`DirectiveFlow::Yield`].
    pub fn next(
        &mut self,
        cursor: &mut CodeCursor,
        context: Option<&Rc<Source>>,
        sink: &mut dyn TokenSink,
    ) -> Result<Token> {
        loop {
            if cursor.at_eof() {
                return Ok(Token::default());
            }
            if self.mode == LexingMode::Preproc && cursor.at_eol() {
                return Ok(Token::default());
            }

            if let Some(token) = self.scan_whitespace(cursor, context) {
                sink.whitespace(&token);
                continue;
            }

            if cursor.current() == b'/' && matches!(cursor.peek(1), b'/' | b'*') {
                let token = self.scan_comment(cursor, context)?;
                sink.comment(&token);
                continue;
            }

            if self.mode == LexingMode::Idl && self.newline_occurred && cursor.current() == b'#' {
                match sink.directive(cursor)? {
                    DirectiveFlow::Resume => continue,
                    DirectiveFlow::Yield => return Ok(Token::default()),
                }
            }

            let mut token = self.scan_token(cursor).map_err(|mut err| {
                // Scanners work on bare cursors; attach the file here.
                if err.location.path.as_os_str().is_empty() {
                    if let Some(ctx) = context {
                        err.location.path = ctx.path().to_path_buf();
                    }
                }
                err
            })?;
            if let Some(ctx) = context {
                token.set_context(Rc::clone(ctx));
            }
            self.newline_occurred = false;
            self.last_valid = token.clone();
            return Ok(token);
        }
    }

    /// Scans literally until `symbol` or EOF; the end position is at the
    /// symbol.
    pub fn custom_until(&self, cursor: &mut CodeCursor, symbol: u8) -> Token {
        let mut token = cursor.location(TokenKind::None);
        while !cursor.at_eof() && cursor.current() != symbol {
            cursor.advance();
        }
        cursor.update_location(&mut token);
        token
    }

    /// Skips the rest of the line. A backslash at the end of a line
    /// continues into the next one. In preprocessor mode the end position
    /// stays at the line break; in IDL mode the break is consumed and the
    /// line-start flag set.
    pub fn skip_line(&mut self, cursor: &mut CodeCursor) {
        loop {
            match cursor.current() {
                0 => break,
                b'\\' => {
                    if cursor.peek(1) == b'\r' && cursor.peek(2) == b'\n' {
                        cursor.advance_by(3);
                    } else if cursor.peek(1) == b'\n' {
                        cursor.advance_by(2);
                    } else {
                        cursor.advance();
                    }
                }
                b'\r' if cursor.peek(1) == b'\n' => {
                    if self.mode == LexingMode::Idl {
                        cursor.advance_by(2);
                        self.newline_occurred = true;
                    }
                    break;
                }
                b'\n' => {
                    if self.mode == LexingMode::Idl {
                        cursor.advance();
                        self.newline_occurred = true;
                    }
                    break;
                }
                _ => cursor.advance(),
            }
        }
    }

    fn scan_whitespace(
        &mut self,
        cursor: &mut CodeCursor,
        context: Option<&Rc<Source>>,
    ) -> Option<Token> {
        let mut token = cursor.location(TokenKind::Whitespace);
        let mut seen = false;
        loop {
            match cursor.current() {
                b' ' | b'\t' | 0x0B | 0x0C => {
                    cursor.advance();
                    seen = true;
                }
                b'\r' | b'\n' if self.mode == LexingMode::Idl => {
                    if cursor.current() == b'\n' {
                        self.newline_occurred = true;
                    }
                    cursor.advance();
                    seen = true;
                }
                // Line continuation inside a directive reads as whitespace.
                b'\\' if self.mode == LexingMode::Preproc => {
                    if cursor.peek(1) == b'\r' && cursor.peek(2) == b'\n' {
                        cursor.advance_by(3);
                        seen = true;
                    } else if cursor.peek(1) == b'\n' {
                        cursor.advance_by(2);
                        seen = true;
                    } else {
                        break;
                    }
                }
                b'\r' if self.mode == LexingMode::Preproc && cursor.peek(1) != b'\n' => {
                    cursor.advance();
                    seen = true;
                }
                _ => break,
            }
        }
        if !seen {
            return None;
        }
        cursor.update_location(&mut token);
        if let Some(ctx) = context {
            token.set_context(Rc::clone(ctx));
        }
        Some(token)
    }

    fn scan_comment(&mut self, cursor: &mut CodeCursor, context: Option<&Rc<Source>>) -> Result<Token> {
        let mut token = cursor.location(TokenKind::Comment);
        cursor.advance(); // '/'
        if cursor.current() == b'/' {
            while !cursor.at_eof() && cursor.current() != b'\n' {
                if cursor.current() == b'\r' && cursor.peek(1) == b'\n' {
                    break;
                }
                cursor.advance();
            }
        } else {
            cursor.advance(); // '*'
            loop {
                if cursor.at_eof() {
                    return Err(CompileError::new(
                        ErrorKind::Lex,
                        "unterminated comment",
                        self.cursor_location(cursor, context),
                    ));
                }
                if cursor.current() == b'*' && cursor.peek(1) == b'/' {
                    cursor.advance_by(2);
                    break;
                }
                cursor.advance();
            }
        }
        cursor.update_location(&mut token);
        if let Some(ctx) = context {
            token.set_context(Rc::clone(ctx));
        }
        Ok(token)
    }

    fn scan_token(&mut self, cursor: &mut CodeCursor) -> Result<Token> {
        let byte = cursor.current();
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'_' => self.scan_word(cursor),
            b'0'..=b'9' => self.scan_number(cursor),
            b'\'' => {
                let token = cursor.location(TokenKind::Literal);
                self.scan_character_with(cursor, token)
            }
            b'"' => {
                let token = cursor.location(TokenKind::Literal);
                self.scan_string_with(cursor, token, false)
            }
            b'{' | b'}' | b'(' | b')' | b';' | b',' | b'.' => {
                let mut token = cursor.location(TokenKind::Separator);
                cursor.advance();
                cursor.update_location(&mut token);
                Ok(token)
            }
            b':' => {
                let mut token = cursor.location(TokenKind::Separator);
                cursor.advance();
                if cursor.current() == b':' {
                    cursor.advance();
                }
                cursor.update_location(&mut token);
                Ok(token)
            }
            _ => self.scan_operator(cursor),
        }
    }

    /// Identifiers, keywords, boolean/null literals, and prefixed
    /// character/string literals.
    fn scan_word(&mut self, cursor: &mut CodeCursor) -> Result<Token> {
        let mut token = cursor.location(TokenKind::Identifier);
        let mut word = String::new();
        while matches!(cursor.current(), b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'_') {
            word.push(cursor.current() as char);
            cursor.advance();
        }

        // A literal prefix directly followed by a quote starts a literal.
        if cursor.current() == b'\'' && matches!(word.as_str(), "L" | "u" | "U") {
            return self.scan_character_with(cursor, token);
        }
        if cursor.current() == b'"' {
            match word.as_str() {
                "u8" | "u" | "U" | "L" => return self.scan_string_with(cursor, token, false),
                "R" | "u8R" | "uR" | "UR" | "LR" => {
                    return self.scan_string_with(cursor, token, true)
                }
                _ => {}
            }
        }

        match word.as_str() {
            "true" | "TRUE" | "false" | "FALSE" => {
                cursor.update_location_literal(&mut token, LiteralKind::Bool)?;
                return Ok(token);
            }
            "nullptr" | "NULL" => {
                cursor.update_location_literal(&mut token, LiteralKind::Null)?;
                return Ok(token);
            }
            _ => {}
        }

        if self.keywords.iter().any(|k| k == &word) {
            cursor.update_location(&mut token);
            token.set_kind(TokenKind::Keyword);
            return Ok(token);
        }

        if !self.case_sensitive {
            if let Some(keyword) = self
                .keywords
                .iter()
                .find(|k| k.eq_ignore_ascii_case(&word) && *k != &word)
            {
                return Err(CompileError::new(
                    ErrorKind::CaseCollision,
                    format!("identifier '{word}' differs from keyword '{keyword}' only in case"),
                    token.location(),
                ));
            }
        }

        cursor.update_location(&mut token);
        Ok(token)
    }

    fn scan_number(&mut self, cursor: &mut CodeCursor) -> Result<Token> {
        let mut token = cursor.location(TokenKind::Literal);

        if cursor.current() == b'0' && matches!(cursor.peek(1), b'x' | b'X') {
            return self.scan_hex_number(cursor, token);
        }
        if cursor.current() == b'0' && matches!(cursor.peek(1), b'b' | b'B') {
            cursor.advance_by(2);
            let mut digits = 0;
            while matches!(cursor.current(), b'0' | b'1') {
                cursor.advance();
                digits += 1;
            }
            if digits == 0 || cursor.current().is_ascii_digit() {
                return Err(self.literal_error(&token, "malformed binary literal"));
            }
            self.scan_integer_suffix(cursor, &token)?;
            cursor.update_location_literal(&mut token, LiteralKind::BinInt)?;
            return Ok(token);
        }

        let leading_zero = cursor.current() == b'0';
        let mut body = String::new();
        let mut is_float = false;
        while cursor.current().is_ascii_digit() {
            body.push(cursor.current() as char);
            cursor.advance();
        }
        if cursor.current() == b'.' && cursor.peek(1).is_ascii_digit() {
            is_float = true;
            body.push('.');
            cursor.advance();
            while cursor.current().is_ascii_digit() {
                body.push(cursor.current() as char);
                cursor.advance();
            }
        } else if cursor.current() == b'.' && !matches!(cursor.peek(1), b'.') {
            // Trailing-dot float such as `1.`
            is_float = true;
            body.push('.');
            cursor.advance();
        }
        if matches!(cursor.current(), b'e' | b'E') {
            let mut offset = 1;
            if matches!(cursor.peek(1), b'+' | b'-') {
                offset = 2;
            }
            if cursor.peek(offset).is_ascii_digit() {
                is_float = true;
                cursor.advance_by(offset);
                while cursor.current().is_ascii_digit() {
                    cursor.advance();
                }
            }
        }

        // A 'd'/'D' suffix turns any decimal numeric into a fixed-point
        // literal.
        if matches!(cursor.current(), b'd' | b'D') {
            cursor.advance();
            cursor.update_location_literal(&mut token, LiteralKind::FixedPoint)?;
            return Ok(token);
        }

        if is_float {
            if matches!(cursor.current(), b'f' | b'F' | b'l' | b'L') {
                cursor.advance();
            }
            cursor.update_location_literal(&mut token, LiteralKind::DecFloat)?;
            return Ok(token);
        }

        let kind = if leading_zero && body.len() > 1 {
            if body[1..].bytes().any(|b| !(b'0'..=b'7').contains(&b)) {
                return Err(self.literal_error(&token, "invalid digit in octal literal"));
            }
            LiteralKind::OctInt
        } else {
            LiteralKind::DecInt
        };
        self.scan_integer_suffix(cursor, &token)?;
        cursor.update_location_literal(&mut token, kind)?;
        Ok(token)
    }

    fn scan_hex_number(&mut self, cursor: &mut CodeCursor, mut token: Token) -> Result<Token> {
        cursor.advance_by(2);
        let mut digits = 0;
        while cursor.current().is_ascii_hexdigit() {
            cursor.advance();
            digits += 1;
        }
        let has_fraction = cursor.current() == b'.';
        if has_fraction {
            cursor.advance();
            while cursor.current().is_ascii_hexdigit() {
                cursor.advance();
                digits += 1;
            }
        }
        if digits == 0 {
            return Err(self.literal_error(&token, "malformed hexadecimal literal"));
        }
        if has_fraction || matches!(cursor.current(), b'p' | b'P') {
            if !matches!(cursor.current(), b'p' | b'P') {
                return Err(self.literal_error(
                    &token,
                    "hexadecimal float requires a binary exponent",
                ));
            }
            cursor.advance();
            if matches!(cursor.current(), b'+' | b'-') {
                cursor.advance();
            }
            if !cursor.current().is_ascii_digit() {
                return Err(self.literal_error(&token, "malformed hexadecimal float"));
            }
            while cursor.current().is_ascii_digit() {
                cursor.advance();
            }
            if matches!(cursor.current(), b'f' | b'F' | b'l' | b'L') {
                cursor.advance();
            }
            cursor.update_location_literal(&mut token, LiteralKind::HexFloat)?;
            return Ok(token);
        }
        self.scan_integer_suffix(cursor, &token)?;
        cursor.update_location_literal(&mut token, LiteralKind::HexInt)?;
        Ok(token)
    }

    /// Consumes and validates an integer suffix: `u`/`U` combined with up
    /// to two `l`/`L`, in either order.
    fn scan_integer_suffix(&mut self, cursor: &mut CodeCursor, token: &Token) -> Result<()> {
        let mut suffix = String::new();
        while matches!(cursor.current(), b'u' | b'U' | b'l' | b'L') {
            suffix.push(cursor.current() as char);
            cursor.advance();
        }
        let normalized = suffix.to_ascii_lowercase();
        match normalized.as_str() {
            "" | "u" | "l" | "ll" | "ul" | "ull" | "lu" | "llu" => Ok(()),
            _ => Err(self.literal_error(token, "invalid integer suffix")),
        }
    }


    fn scan_character_with(&mut self, cursor: &mut CodeCursor, mut token: Token) -> Result<Token> {
        cursor.advance(); // opening quote
        let mut units = 0usize;
        loop {
            match cursor.current() {
                0 | b'\n' => {
                    return Err(self.literal_error(&token, "unterminated character literal"))
                }
                b'\'' => {
                    cursor.advance();
                    break;
                }
                b'\\' => {
                    self.scan_escape(cursor, &token)?;
                    units += 1;
                }
                _ => {
                    cursor.advance();
                    units += 1;
                }
            }
        }
        if units == 0 {
            return Err(self.literal_error(&token, "empty character literal"));
        }
        let kind = if units == 1 {
            LiteralKind::Char
        } else {
            LiteralKind::CharSeq
        };
        cursor.update_location_literal(&mut token, kind)?;
        Ok(token)
    }

    fn scan_string_with(
        &mut self,
        cursor: &mut CodeCursor,
        mut token: Token,
        raw: bool,
    ) -> Result<Token> {
        cursor.advance(); // opening quote
        if raw {
            if cursor.current() != b'(' {
                return Err(self.literal_error(&token, "malformed raw string delimiter"));
            }
            cursor.advance();
            loop {
                if cursor.at_eof() {
                    return Err(self.literal_error(&token, "unterminated raw string"));
                }
                if cursor.current() == b')' && cursor.peek(1) == b'"' {
                    cursor.advance_by(2);
                    break;
                }
                cursor.advance();
            }
            cursor.update_location_literal(&mut token, LiteralKind::RawStr)?;
            return Ok(token);
        }

        loop {
            match cursor.current() {
                0 | b'\n' => {
                    return Err(self.literal_error(&token, "unterminated string literal"))
                }
                b'"' => {
                    cursor.advance();
                    break;
                }
                b'\\' => self.scan_escape(cursor, &token)?,
                _ => cursor.advance(),
            }
        }
        cursor.update_location_literal(&mut token, LiteralKind::Str)?;
        Ok(token)
    }

    /// Validates and consumes one escape sequence (cursor at the
    /// backslash).
    fn scan_escape(&mut self, cursor: &mut CodeCursor, token: &Token) -> Result<()> {
        cursor.advance(); // backslash
        let head = cursor.current();
        match head {
            b'\'' | b'"' | b'?' | b'\\' | b'a' | b'b' | b'f' | b'n' | b'r' | b't' | b'v' => {
                cursor.advance();
                Ok(())
            }
            b'x' => {
                cursor.advance();
                self.consume_hex_digits(cursor, token, 2, 1)
            }
            b'u' => {
                cursor.advance();
                self.consume_hex_digits(cursor, token, 4, 4)
            }
            b'U' => {
                cursor.advance();
                self.consume_hex_digits(cursor, token, 8, 8)
            }
            b'0'..=b'7' => {
                let mut digits = 0;
                while digits < 3 && matches!(cursor.current(), b'0'..=b'7') {
                    cursor.advance();
                    digits += 1;
                }
                Ok(())
            }
            _ => Err(self.literal_error(token, "invalid escape sequence")),
        }
    }

    fn consume_hex_digits(
        &mut self,
        cursor: &mut CodeCursor,
        token: &Token,
        max: usize,
        min: usize,
    ) -> Result<()> {
        let mut taken = 0;
        while taken < max && cursor.current().is_ascii_hexdigit() {
            cursor.advance();
            taken += 1;
        }
        if taken < min {
            return Err(self.literal_error(token, "incomplete escape sequence"));
        }
        Ok(())
    }

    fn scan_operator(&mut self, cursor: &mut CodeCursor) -> Result<Token> {
        let mut token = cursor.location(TokenKind::Operator);
        let pair = (cursor.current(), cursor.peek(1));
        let double = matches!(
            pair,
            (b'|', b'|')
                | (b'&', b'&')
                | (b'=', b'=')
                | (b'!', b'=')
                | (b'<', b'=')
                | (b'>', b'=')
                | (b'<', b'<')
                | (b'>', b'>')
        );
        if double {
            cursor.advance_by(2);
            cursor.update_location(&mut token);
            return Ok(token);
        }
        if self.mode == LexingMode::Preproc && pair.0 == b'#' {
            cursor.advance();
            if cursor.current() == b'#' {
                cursor.advance();
            }
            cursor.update_location(&mut token);
            return Ok(token);
        }
        match pair.0 {
            b'=' | b'+' | b'-' | b'*' | b'/' | b'%' | b'^' | b'!' | b'~' | b'|' | b'&' | b'<'
            | b'>' | b'?' => {
                cursor.advance();
                cursor.update_location(&mut token);
                Ok(token)
            }
            other => Err(CompileError::new(
                ErrorKind::Lex,
                format!("invalid character '{}' (0x{other:02X})", other as char),
                token.location(),
            )),
        }
    }

    fn literal_error(&self, token: &Token, message: &str) -> CompileError {
        CompileError::new(ErrorKind::Lex, message, token.location())
    }

    fn cursor_location(
        &self,
        cursor: &CodeCursor,
        context: Option<&Rc<Source>>,
    ) -> sdvidl_base::Location {
        let path = context
            .map(|ctx| ctx.path().to_path_buf())
            .unwrap_or_default();
        sdvidl_base::Location {
            path,
            line: cursor.line(),
            col: cursor.col(),
        }
    }
}

/// Tokenizes a complete string, dropping whitespace and comments.
pub fn tokenize(code: &str) -> Result<Vec<Token>> {
    let mut cursor = CodeCursor::from_text(code);
    let mut lexer = Lexer::new(true, LexingMode::Idl);
    let mut sink = NullSink;
    let mut tokens = Vec::new();
    loop {
        let token = lexer.next(&mut cursor, None, &mut sink)?;
        if !token.is_valid() {
            return Ok(tokens);
        }
        tokens.push(token);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(code: &str) -> Vec<TokenKind> {
        tokenize(code).unwrap().iter().map(|t| t.kind()).collect()
    }

    fn texts(code: &str) -> Vec<String> {
        tokenize(code)
            .unwrap()
            .iter()
            .map(|t| t.text().to_owned())
            .collect()
    }

    #[test]
    fn keywords_and_identifiers() {
        let tokens = tokenize("module Cabin { interface door_ctrl; }").unwrap();
        assert_eq!(tokens[0].kind(), TokenKind::Keyword);
        assert_eq!(tokens[0].text(), "module");
        assert_eq!(tokens[1].kind(), TokenKind::Identifier);
        assert_eq!(tokens[3].kind(), TokenKind::Keyword);
        assert_eq!(tokens[4].kind(), TokenKind::Identifier);
    }

    #[test]
    fn separators_including_scope() {
        assert_eq!(
            texts("{ } ( ) ; , : :: ."),
            vec!["{", "}", "(", ")", ";", ",", ":", "::", "."]
        );
        assert!(kinds("{ } ( ) ; , : :: .")
            .iter()
            .all(|k| *k == TokenKind::Separator));
    }

    #[test]
    fn operators_longest_match_first() {
        assert_eq!(
            texts("= == != <= >= << >> && || & | ^ ! ~ ? + - * / %"),
            vec![
                "=", "==", "!=", "<=", ">=", "<<", ">>", "&&", "||", "&", "|", "^", "!", "~",
                "?", "+", "-", "*", "/", "%"
            ]
        );
    }

    #[test]
    fn integer_literal_kinds() {
        let tokens = tokenize("10 012 0x1F 0b101 42u 7ll").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.literal_kind().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                LiteralKind::DecInt,
                LiteralKind::OctInt,
                LiteralKind::HexInt,
                LiteralKind::BinInt,
                LiteralKind::DecInt,
                LiteralKind::DecInt,
            ]
        );
    }

    #[test]
    fn float_and_fixed_literal_kinds() {
        let tokens = tokenize("1.5 2e10 1.5e-3f 0x1.8p3 1. 3.14d 10d").unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.literal_kind().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                LiteralKind::DecFloat,
                LiteralKind::DecFloat,
                LiteralKind::DecFloat,
                LiteralKind::HexFloat,
                LiteralKind::DecFloat,
                LiteralKind::FixedPoint,
                LiteralKind::FixedPoint,
            ]
        );
    }

    #[test]
    fn character_and_string_literals() {
        let tokens = tokenize(r#"'a' L'b' u'c' 'ab' "text" u8"t" u"t" U"t" L"t" R"(raw)" LR"(r)""#)
            .unwrap();
        let kinds: Vec<_> = tokens.iter().map(|t| t.literal_kind().unwrap()).collect();
        assert_eq!(
            kinds,
            vec![
                LiteralKind::Char,
                LiteralKind::Char,
                LiteralKind::Char,
                LiteralKind::CharSeq,
                LiteralKind::Str,
                LiteralKind::Str,
                LiteralKind::Str,
                LiteralKind::Str,
                LiteralKind::Str,
                LiteralKind::RawStr,
                LiteralKind::RawStr,
            ]
        );
        assert!(tokens[1].is_wide());
        assert!(tokens[6].is_utf16());
        assert!(tokens[10].is_wide());
    }

    #[test]
    fn boolean_and_null_literals() {
        let tokens = tokenize("true TRUE false FALSE nullptr NULL").unwrap();
        assert!(tokens[..4].iter().all(|t| t.is_bool()));
        assert!(tokens[4..].iter().all(|t| t.is_null()));
    }

    #[test]
    fn comments_are_routed_to_the_sink() {
        let mut cursor = CodeCursor::from_text("// line\n/* block */ module");
        let mut lexer = Lexer::new(true, LexingMode::Idl);
        let mut sink = StoreSink::default();
        let token = lexer.next(&mut cursor, None, &mut sink).unwrap();
        assert_eq!(token.text(), "module");
        assert_eq!(sink.comment.text(), "/* block */");
        assert_eq!(sink.comment.kind(), TokenKind::Comment);
    }

    #[test]
    fn unterminated_block_comment_fails() {
        assert_eq!(
            tokenize("/* no end").unwrap_err().kind,
            ErrorKind::Lex
        );
    }

    #[test]
    fn unterminated_string_fails() {
        assert_eq!(tokenize("\"abc\n\"").unwrap_err().kind, ErrorKind::Lex);
    }

    #[test]
    fn invalid_octal_digit_fails() {
        assert_eq!(tokenize("089").unwrap_err().kind, ErrorKind::Lex);
    }

    #[test]
    fn hash_is_not_an_operator_in_idl_mode_mid_line() {
        assert!(tokenize("a # b").is_err());
    }

    #[test]
    fn hash_operators_in_preproc_mode() {
        let mut cursor = CodeCursor::from_text("# ## x");
        let mut lexer = Lexer::new(true, LexingMode::Preproc);
        let mut sink = NullSink;
        assert_eq!(lexer.next(&mut cursor, None, &mut sink).unwrap().text(), "#");
        assert_eq!(lexer.next(&mut cursor, None, &mut sink).unwrap().text(), "##");
        assert_eq!(lexer.next(&mut cursor, None, &mut sink).unwrap().text(), "x");
    }

    #[test]
    fn preproc_mode_stops_at_end_of_line() {
        let mut cursor = CodeCursor::from_text("define X\nnext");
        let mut lexer = Lexer::new(true, LexingMode::Preproc);
        let mut sink = NullSink;
        assert_eq!(
            lexer.next(&mut cursor, None, &mut sink).unwrap().text(),
            "define"
        );
        assert_eq!(lexer.next(&mut cursor, None, &mut sink).unwrap().text(), "X");
        assert!(!lexer.next(&mut cursor, None, &mut sink).unwrap().is_valid());
    }

    #[test]
    fn preproc_mode_continues_over_escaped_newline() {
        let mut cursor = CodeCursor::from_text("a \\\n b\nc");
        let mut lexer = Lexer::new(true, LexingMode::Preproc);
        let mut sink = NullSink;
        assert_eq!(lexer.next(&mut cursor, None, &mut sink).unwrap().text(), "a");
        assert_eq!(lexer.next(&mut cursor, None, &mut sink).unwrap().text(), "b");
        assert!(!lexer.next(&mut cursor, None, &mut sink).unwrap().is_valid());
    }

    #[test]
    fn case_collision_rejected_when_insensitive() {
        let mut cursor = CodeCursor::from_text("Module");
        let mut lexer = Lexer::new(false, LexingMode::Idl);
        let mut sink = NullSink;
        let err = lexer.next(&mut cursor, None, &mut sink).unwrap_err();
        assert_eq!(err.kind, ErrorKind::CaseCollision);
    }

    #[test]
    fn case_collision_allowed_when_sensitive() {
        let tokens = tokenize("Module").unwrap();
        assert_eq!(tokens[0].kind(), TokenKind::Identifier);
    }

    #[test]
    fn extension_keywords_can_be_added() {
        let mut cursor = CodeCursor::from_text("pointer");
        let mut lexer = Lexer::new(true, LexingMode::Idl);
        lexer.add_keyword("pointer");
        let mut sink = NullSink;
        let token = lexer.next(&mut cursor, None, &mut sink).unwrap();
        assert_eq!(token.kind(), TokenKind::Keyword);
    }

    #[test]
    fn custom_until_reads_to_the_symbol() {
        let mut cursor = CodeCursor::from_text("path/to/file.idl\" rest");
        let lexer = Lexer::new(true, LexingMode::Preproc);
        let token = lexer.custom_until(&mut cursor, b'"');
        assert_eq!(token.text(), "path/to/file.idl");
        assert_eq!(cursor.current(), b'"');
    }

    #[test]
    fn skip_line_honours_continuations() {
        let mut cursor = CodeCursor::from_text("one \\\ntwo\nthree");
        let mut lexer = Lexer::new(true, LexingMode::Idl);
        lexer.skip_line(&mut cursor);
        assert_eq!(cursor.current(), b't');
        assert_eq!(cursor.line(), 3);
    }

    #[test]
    fn token_positions_are_monotone() {
        let tokens = tokenize("module a {\n  const long x = 10;\n};\n").unwrap();
        let mut previous = (0u32, 0u32);
        for token in &tokens {
            let position = (token.line(), token.col());
            assert!(position >= previous, "token '{}' went backwards", token.text());
            previous = position;
        }
    }

    #[test]
    fn round_trip_spans_match_source() {
        let code = "interface Door { void open(in short speed); };";
        for token in tokenize(code).unwrap() {
            assert!(code.contains(token.text()));
        }
    }
}
