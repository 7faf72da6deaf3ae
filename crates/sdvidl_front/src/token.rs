//! Tokens produced by the lexer.
//!
//! A [`Token`] records a text span, the position of its first character and
//! a classification. The span either points into a shared source buffer or
//! owns a chunk of text of its own (synthetic tokens and spans promoted out
//! of transient macro-expansion buffers), so a token can never outlive its
//! backing memory.
//!
//! ## Classification
//!
//! | Kind | Sub-kind |
//! |------|----------|
//! | [`TokenKind::Literal`] | [`LiteralKind`]: integers (dec/oct/hex/bin), floats (dec/hex), fixed point, strings, raw strings, characters, character sequences, booleans, null |
//! | [`TokenKind::Meta`] | [`MetaKind`]: local/global include, define, undef, verbatim |
//! | everything else | none |
//!
//! Literal tokens decode their semantic value on demand via
//! [`Token::value`], bucketing the result into the smallest native type it
//! fits.

use std::rc::Rc;

use sdvidl_base::{CompileError, ConstValue, ErrorKind, Location, Result};

use crate::source::Source;

/// Token classification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// No token (default construction, EOF marker, failed lookup).
    #[default]
    None,
    /// Whitespace run.
    Whitespace,
    /// Line or block comment.
    Comment,
    /// Identifier.
    Identifier,
    /// Reserved keyword.
    Keyword,
    /// Literal; see [`LiteralKind`].
    Literal,
    /// Separator: `{ } ( ) ; , : :: .`
    Separator,
    /// Operator.
    Operator,
    /// Preprocessor meta data; see [`MetaKind`].
    Meta,
}

/// Literal sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LiteralKind {
    /// Decimal integer.
    DecInt,
    /// Octal integer (`0` prefix).
    OctInt,
    /// Hexadecimal integer (`0x` prefix).
    HexInt,
    /// Binary integer (`0b` prefix).
    BinInt,
    /// Decimal floating point.
    DecFloat,
    /// Hexadecimal floating point (`0x…p…`).
    HexFloat,
    /// Fixed point (`d`/`D` suffix).
    FixedPoint,
    /// String literal, any prefix.
    Str,
    /// Raw string literal (`R"(…)"` forms).
    RawStr,
    /// Single character literal.
    Char,
    /// Multi-character sequence literal.
    CharSeq,
    /// `true`/`TRUE`/`false`/`FALSE`.
    Bool,
    /// `nullptr`/`NULL`.
    Null,
}

/// Meta token sub-kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MetaKind {
    /// `#include "…"`.
    IncludeLocal,
    /// `#include <…>`.
    IncludeGlobal,
    /// `#define` line following the keyword.
    Define,
    /// `#undef` name.
    Undef,
    /// `#verbatim`/`#verbatim_begin` payload.
    Verbatim,
}

/// Backing storage of a token's text.
#[derive(Debug, Clone, Default)]
enum TextRef {
    /// No text at all.
    #[default]
    Empty,
    /// A range of a shared buffer. `len == None` means "to the end of the
    /// buffer": the span is still open and awaiting `update_location`.
    Span {
        buf: Rc<str>,
        start: usize,
        len: Option<usize>,
    },
}

/// Token within the source string.
#[derive(Debug, Clone, Default)]
pub struct Token {
    text: TextRef,
    line: u32,
    col: u32,
    kind: TokenKind,
    literal: Option<LiteralKind>,
    meta: Option<MetaKind>,
    context: Option<Rc<Source>>,
}

impl Token {
    /// Creates a synthetic token owning its text, for insertion into token
    /// streams during processing. An empty text yields an invalid token.
    pub fn synthetic(text: &str, kind: TokenKind) -> Self {
        Self {
            text: owned_text(text),
            kind,
            ..Self::default()
        }
    }

    /// Creates a synthetic literal token.
    pub fn synthetic_literal(text: &str, literal: LiteralKind) -> Self {
        Self {
            text: owned_text(text),
            kind: TokenKind::Literal,
            literal: Some(literal),
            ..Self::default()
        }
    }

    /// Creates a synthetic meta token.
    pub fn synthetic_meta(text: &str, meta: MetaKind) -> Self {
        Self {
            text: owned_text(text),
            kind: TokenKind::Meta,
            meta: Some(meta),
            ..Self::default()
        }
    }

    /// Opens a span at `start` of `buf`; the length stays undetermined until
    /// the cursor closes it. Used by `CodeCursor::location`.
    pub(crate) fn open_span(buf: Rc<str>, start: usize, line: u32, col: u32, kind: TokenKind) -> Self {
        Self {
            text: TextRef::Span {
                buf,
                start,
                len: None,
            },
            line,
            col,
            kind,
            ..Self::default()
        }
    }

    pub(crate) fn has_span(&self) -> bool {
        matches!(self.text, TextRef::Span { .. })
    }

    pub(crate) fn span_is_in(&self, buffer: &Rc<str>) -> bool {
        match &self.text {
            TextRef::Span { buf, .. } => Rc::ptr_eq(buf, buffer),
            TextRef::Empty => false,
        }
    }

    pub(crate) fn span_start(&self) -> usize {
        match &self.text {
            TextRef::Span { start, .. } => *start,
            TextRef::Empty => 0,
        }
    }

    pub(crate) fn close_span(&mut self, end: usize) {
        if let TextRef::Span { start, len, .. } = &mut self.text {
            *len = Some(end.saturating_sub(*start));
        }
    }

    pub(crate) fn retarget_to_chunk(&mut self, chunk: String) {
        let len = chunk.len();
        self.text = TextRef::Span {
            buf: Rc::from(chunk.as_str()),
            start: 0,
            len: Some(len),
        };
    }

    pub(crate) fn clear_span(&mut self) {
        self.text = TextRef::Empty;
    }

    pub(crate) fn set_kind(&mut self, kind: TokenKind) {
        self.kind = kind;
    }

    pub(crate) fn classify_literal(&mut self, literal: LiteralKind) {
        self.kind = TokenKind::Literal;
        self.literal = Some(literal);
    }

    pub(crate) fn classify_meta(&mut self, meta: MetaKind) {
        self.kind = TokenKind::Meta;
        self.meta = Some(meta);
    }

    /// The token text. Empty for invalid tokens.
    pub fn text(&self) -> &str {
        match &self.text {
            TextRef::Empty => "",
            TextRef::Span { buf, start, len } => {
                let end = start + len.unwrap_or(buf.len() - start);
                &buf[*start..end]
            }
        }
    }

    /// A token is valid when it has backing text.
    pub fn is_valid(&self) -> bool {
        !matches!(self.text, TextRef::Empty)
    }

    /// 1-based line of the first character.
    pub fn line(&self) -> u32 {
        self.line
    }

    /// 1-based column of the first character.
    pub fn col(&self) -> u32 {
        self.col
    }

    /// The line the token ends on.
    pub fn end_line(&self) -> u32 {
        let bytes = self.text().as_bytes();
        let mut line = self.line;
        for (index, &byte) in bytes.iter().enumerate() {
            if byte == b'\n' && index + 1 < bytes.len() {
                line += 1;
            }
        }
        line
    }

    /// The column the token ends on.
    pub fn end_col(&self) -> u32 {
        let bytes = self.text().as_bytes();
        let mut col = self.col;
        for (index, &byte) in bytes.iter().enumerate() {
            if index > 0 {
                col += 1;
            }
            if byte == b'\n' && index + 1 < bytes.len() {
                col = 0;
            }
        }
        col
    }

    /// Length of the token text in bytes.
    pub fn len(&self) -> usize {
        self.text().len()
    }

    /// Returns `true` when the token text is empty.
    pub fn is_empty(&self) -> bool {
        self.text().is_empty()
    }

    /// The token kind.
    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    /// The literal sub-kind, if this is a literal token.
    pub fn literal_kind(&self) -> Option<LiteralKind> {
        self.literal
    }

    /// The meta sub-kind, if this is a meta token.
    pub fn meta_kind(&self) -> Option<MetaKind> {
        self.meta
    }

    /// Attaches the source context so the token can outlive the local
    /// cursor and report its file in diagnostics.
    pub fn set_context(&mut self, context: Rc<Source>) {
        self.context = Some(context);
    }

    /// The attached source context, if any.
    pub fn context(&self) -> Option<&Rc<Source>> {
        self.context.as_ref()
    }

    /// The token position as an error location.
    pub fn location(&self) -> Location {
        let path = self
            .context
            .as_ref()
            .map(|ctx| ctx.path().to_path_buf())
            .unwrap_or_default();
        Location {
            path,
            line: self.line,
            col: self.col,
        }
    }

    /// Shifts the start of the span. A negative offset moves left, clamped
    /// to the beginning of the line and of the buffer; a positive offset
    /// moves right, clamped to the end of the span, adjusting line/column
    /// for any newlines passed.
    pub fn move_start(&mut self, offset: i32) {
        let TextRef::Span { buf, start, len } = &mut self.text else {
            return;
        };
        if offset < 0 {
            let mut delta = (-offset) as usize;
            delta = delta.min(*start);
            delta = delta.min(self.col.saturating_sub(1) as usize);
            *start -= delta;
            self.col -= delta as u32;
            if let Some(len) = len {
                *len += delta;
            }
        } else {
            let span_len = len.unwrap_or(buf.len() - *start);
            let delta = (offset as usize).min(span_len);
            for &byte in &buf.as_bytes()[*start..*start + delta] {
                if byte == b'\n' {
                    self.line += 1;
                    self.col = 1;
                } else {
                    self.col += 1;
                }
            }
            *start += delta;
            if let Some(len) = len {
                *len -= delta;
            }
        }
    }

    /// Shifts the end of the span. Only applies once the span has a fixed
    /// length; never moves before the start or past the end of the buffer.
    pub fn move_end(&mut self, offset: i32) {
        let TextRef::Span { buf, start, len } = &mut self.text else {
            return;
        };
        let Some(len) = len else {
            return;
        };
        if offset < 0 {
            *len = len.saturating_sub((-offset) as usize);
        } else {
            *len = (*len + offset as usize).min(buf.len() - *start);
        }
    }

    /// The first `count` bytes of the token text.
    pub fn left(&self, count: usize) -> &str {
        let text = self.text();
        &text[..count.min(text.len())]
    }

    /// The last `count` bytes of the token text.
    pub fn right(&self, count: usize) -> &str {
        let text = self.text();
        &text[text.len() - count.min(text.len())..]
    }

    // ---- classification predicates -------------------------------------

    /// A literal token with a known sub-kind.
    pub fn is_literal(&self) -> bool {
        self.kind == TokenKind::Literal && self.literal.is_some()
    }

    /// Any integer literal.
    pub fn is_integer(&self) -> bool {
        matches!(
            self.literal,
            Some(LiteralKind::DecInt | LiteralKind::OctInt | LiteralKind::HexInt | LiteralKind::BinInt)
        )
    }

    /// Signed: an integer without `u`/`U` suffix, any float or fixed point,
    /// or a plain (ASCII) character.
    pub fn is_signed(&self) -> bool {
        if self.is_integer() {
            return !self.contains_any(&['u', 'U']);
        }
        if self.is_float() || self.is_fixed_point() {
            return true;
        }
        if self.is_char() || self.is_char_sequence() {
            return self.is_ascii();
        }
        false
    }

    /// Unsigned: an integer with `u`/`U` suffix or a non-ASCII character.
    pub fn is_unsigned(&self) -> bool {
        if self.is_integer() {
            return self.contains_any(&['u', 'U']);
        }
        if self.is_char() || self.is_char_sequence() {
            return !self.is_ascii();
        }
        false
    }

    /// `l`/`L` suffix (single), or a character sequence whose packed width
    /// matches a `long`.
    pub fn is_long(&self) -> bool {
        if self.is_integer() || self.is_float() {
            return self.contains_any(&['l', 'L']) && !self.contains_str(&["ll", "LL"]);
        }
        if self.is_char_sequence() {
            return self.sequence_byte_width() == Some(8);
        }
        false
    }

    /// `ll`/`LL` suffix, or a character sequence whose packed width matches
    /// a `long long`.
    pub fn is_long_long(&self) -> bool {
        if self.is_integer() {
            return self.contains_str(&["ll", "LL"]);
        }
        if self.is_char_sequence() {
            return self.sequence_byte_width() == Some(8);
        }
        false
    }

    /// Decimal integer or decimal float.
    pub fn is_dec(&self) -> bool {
        matches!(self.literal, Some(LiteralKind::DecInt | LiteralKind::DecFloat))
    }

    /// Hexadecimal integer or hexadecimal float.
    pub fn is_hex(&self) -> bool {
        matches!(self.literal, Some(LiteralKind::HexInt | LiteralKind::HexFloat))
    }

    /// Octal integer.
    pub fn is_oct(&self) -> bool {
        self.literal == Some(LiteralKind::OctInt)
    }

    /// Binary integer.
    pub fn is_bin(&self) -> bool {
        self.literal == Some(LiteralKind::BinInt)
    }

    /// Any floating-point literal.
    pub fn is_float(&self) -> bool {
        matches!(self.literal, Some(LiteralKind::DecFloat | LiteralKind::HexFloat))
    }

    /// Fixed-point literal.
    pub fn is_fixed_point(&self) -> bool {
        self.literal == Some(LiteralKind::FixedPoint)
    }

    /// Single character literal.
    pub fn is_char(&self) -> bool {
        self.literal == Some(LiteralKind::Char)
    }

    /// Multi-character sequence literal.
    pub fn is_char_sequence(&self) -> bool {
        self.literal == Some(LiteralKind::CharSeq)
    }

    /// String or raw string literal.
    pub fn is_string(&self) -> bool {
        matches!(self.literal, Some(LiteralKind::Str | LiteralKind::RawStr))
    }

    /// Raw string literal.
    pub fn is_raw(&self) -> bool {
        self.literal == Some(LiteralKind::RawStr)
    }

    /// Unprefixed character/string literal.
    pub fn is_ascii(&self) -> bool {
        let bytes = self.text().as_bytes();
        match self.literal {
            Some(LiteralKind::Char | LiteralKind::CharSeq) => bytes.first() == Some(&b'\''),
            Some(LiteralKind::Str) => bytes.first() == Some(&b'"'),
            Some(LiteralKind::RawStr) => bytes.get(1) == Some(&b'"'),
            _ => false,
        }
    }

    /// `u8` prefix.
    pub fn is_utf8(&self) -> bool {
        match self.literal {
            Some(LiteralKind::Char | LiteralKind::Str | LiteralKind::RawStr) => {
                self.text().starts_with("u8")
            }
            _ => false,
        }
    }

    /// `u` prefix (not `u8`).
    pub fn is_utf16(&self) -> bool {
        match self.literal {
            Some(LiteralKind::Char | LiteralKind::Str | LiteralKind::RawStr) => {
                let bytes = self.text().as_bytes();
                bytes.first() == Some(&b'u') && bytes.get(1) != Some(&b'8')
            }
            _ => false,
        }
    }

    /// `U` prefix.
    pub fn is_utf32(&self) -> bool {
        match self.literal {
            Some(LiteralKind::Char | LiteralKind::Str | LiteralKind::RawStr) => {
                self.text().as_bytes().first() == Some(&b'U')
            }
            _ => false,
        }
    }

    /// `L` prefix.
    pub fn is_wide(&self) -> bool {
        match self.literal {
            Some(
                LiteralKind::Char
                | LiteralKind::CharSeq
                | LiteralKind::Str
                | LiteralKind::RawStr,
            ) => self.text().as_bytes().first() == Some(&b'L'),
            _ => false,
        }
    }

    /// Boolean literal.
    pub fn is_bool(&self) -> bool {
        self.literal == Some(LiteralKind::Bool)
    }

    /// Null literal.
    pub fn is_null(&self) -> bool {
        self.literal == Some(LiteralKind::Null)
    }

    fn contains_any(&self, chars: &[char]) -> bool {
        self.text().contains(chars)
    }

    fn contains_str(&self, needles: &[&str]) -> bool {
        needles.iter().any(|needle| self.text().contains(needle))
    }

    /// Total packed byte width of a character sequence, `None` when the
    /// body cannot be decoded.
    fn sequence_byte_width(&self) -> Option<usize> {
        let width = if self.is_wide() { 4 } else { 1 };
        let units = self.decode_char_units(width).ok()?;
        Some(units.len() * width)
    }

    // ---- value decoding -------------------------------------------------

    /// Decodes the literal text into the smallest fitting native constant.
    ///
    /// Fails with `Range` when the value exceeds the largest native bucket
    /// and with `Lex` on malformed escape sequences.
    pub fn value(&self) -> Result<ConstValue> {
        if self.is_integer() || self.is_char() || self.is_char_sequence() {
            if self.is_signed() {
                return self.signed_integer_value().map(ConstValue::from_signed);
            }
            return self.unsigned_integer_value().map(ConstValue::from_unsigned);
        }
        if self.is_float() || self.is_fixed_point() {
            return self.float_value().map(ConstValue::from_float);
        }
        if self.is_string() {
            return self.string_value();
        }
        if self.is_bool() {
            return self.bool_value().map(ConstValue::Bool);
        }
        if self.is_null() {
            return Ok(ConstValue::Null);
        }
        Err(self.error(ErrorKind::Internal, "invalid value type"))
    }

    /// The value interpreted as a boolean: boolean literals, integers and
    /// characters of value 0/1, and null (false).
    pub fn value_as_bool(&self) -> Result<bool> {
        if self.is_bool() {
            return self.bool_value();
        }
        if self.is_integer() || self.is_char() || self.is_char_sequence() {
            return match self.signed_integer_value()? {
                0 => Ok(false),
                1 => Ok(true),
                _ => Err(self.error(
                    ErrorKind::Range,
                    "expecting a boolean value or an integer value of 1 or 0",
                )),
            };
        }
        if self.is_null() {
            return Ok(false);
        }
        Err(self.error(ErrorKind::Range, "expecting a boolean value"))
    }

    /// The value interpreted as null: null literals and zero integers.
    pub fn value_as_null(&self) -> Result<ConstValue> {
        if self.is_null() {
            return Ok(ConstValue::Null);
        }
        if self.is_integer() || self.is_char() || self.is_char_sequence() {
            if self.signed_integer_value()? == 0 {
                return Ok(ConstValue::Null);
            }
            return Err(self.error(
                ErrorKind::Range,
                "expecting a null value or the integer value 0",
            ));
        }
        Err(self.error(ErrorKind::Range, "expecting a null value"))
    }

    fn error(&self, kind: ErrorKind, message: impl Into<String>) -> CompileError {
        CompileError::new(kind, message, self.location())
    }

    fn signed_integer_value(&self) -> Result<i64> {
        if self.is_integer() {
            let (digits, radix) = self.integer_digits();
            return i64::from_str_radix(digits, radix).map_err(|_| {
                self.error(
                    ErrorKind::Range,
                    "the value exceeds the range of a 64-bit signed integer",
                )
            });
        }
        let width = self.char_unit_width();
        let units = self.decode_char_units(width)?;
        if units.len() * width > 8 {
            return Err(self.error(
                ErrorKind::Range,
                "character sequence exceeds the widest integer type",
            ));
        }
        let mut value: i64 = 0;
        for unit in units {
            value = (value << (8 * width)) | unit as i64;
        }
        Ok(value)
    }

    fn unsigned_integer_value(&self) -> Result<u64> {
        if self.is_integer() {
            let (digits, radix) = self.integer_digits();
            return u64::from_str_radix(digits, radix).map_err(|_| {
                self.error(
                    ErrorKind::Range,
                    "the value exceeds the range of a 64-bit unsigned integer",
                )
            });
        }
        let width = self.char_unit_width();
        let units = self.decode_char_units(width)?;
        if units.len() * width > 8 {
            return Err(self.error(
                ErrorKind::Range,
                "character sequence exceeds the widest integer type",
            ));
        }
        let mut value: u64 = 0;
        for unit in units {
            value = (value << (8 * width)) | unit as u64;
        }
        Ok(value)
    }

    /// Digits and radix of an integer literal, with prefix and suffix
    /// stripped.
    fn integer_digits(&self) -> (&str, u32) {
        let text = self.text();
        let digits = text.trim_end_matches(['u', 'U', 'l', 'L']);
        match self.literal {
            Some(LiteralKind::HexInt) => (&digits[2..], 16),
            Some(LiteralKind::BinInt) => (&digits[2..], 2),
            Some(LiteralKind::OctInt) => (&digits[1..], 8),
            _ => (digits, 10),
        }
    }

    fn char_unit_width(&self) -> usize {
        if self.is_utf16() {
            2
        } else if self.is_utf32() || self.is_wide() {
            4
        } else {
            1
        }
    }

    /// Decodes the body of a character literal into code units of the given
    /// byte width.
    fn decode_char_units(&self, width: usize) -> Result<Vec<u32>> {
        let text = self.text();
        let open = text
            .find('\'')
            .ok_or_else(|| self.error(ErrorKind::Internal, "malformed character literal"))?;
        let body = &text[open + 1..text.len() - 1];
        let points = decode_escapes(body).map_err(|msg| self.error(ErrorKind::Lex, msg))?;
        let limit: u32 = match width {
            1 => 0xFF,
            2 => 0xFFFF,
            _ => u32::MAX,
        };
        for &point in &points {
            if point > limit {
                return Err(self.error(
                    ErrorKind::Range,
                    "character value exceeds the width of its type",
                ));
            }
        }
        Ok(points)
    }

    fn float_value(&self) -> Result<f64> {
        let text = self.text();
        if self.literal == Some(LiteralKind::HexFloat) {
            let digits = text.trim_end_matches(['f', 'F', 'l', 'L']);
            return parse_hex_float(digits)
                .ok_or_else(|| self.error(ErrorKind::Lex, "malformed hexadecimal float"));
        }
        if self.is_fixed_point() {
            let digits = text.trim_end_matches(['d', 'D']);
            let value: f64 = digits
                .parse()
                .map_err(|_| self.error(ErrorKind::Lex, "malformed fixed-point literal"))?;
            // The fixed-point value carries 31 bits split between digits and
            // fraction.
            if value < -2147483647.0 || value > 2147483648.0 {
                return Err(self.error(
                    ErrorKind::Range,
                    "fixed-point value exceeds the 31-bit value range",
                ));
            }
            if value != 0.0 && value.abs() < 1.0 / (1u64 << 31) as f64 {
                return Err(self.error(
                    ErrorKind::Range,
                    "fixed-point value falls below the smallest representable precision",
                ));
            }
            return Ok(value);
        }
        let digits = text.trim_end_matches(['f', 'F', 'l', 'L']);
        let value: f64 = digits
            .parse()
            .map_err(|_| self.error(ErrorKind::Lex, "malformed floating-point literal"))?;
        if value.is_infinite() {
            return Err(self.error(
                ErrorKind::Range,
                "floating-point value does not fit the largest native type",
            ));
        }
        Ok(value)
    }

    fn bool_value(&self) -> Result<bool> {
        match self.text() {
            "true" | "TRUE" => Ok(true),
            "false" | "FALSE" => Ok(false),
            _ => Err(self.error(ErrorKind::Internal, "expecting a boolean value")),
        }
    }

    fn string_value(&self) -> Result<ConstValue> {
        let text = self.text();
        let points = if self.is_raw() {
            let open = text
                .find("\"(")
                .ok_or_else(|| self.error(ErrorKind::Internal, "malformed raw string"))?;
            let body = &text[open + 2..text.len() - 2];
            body.chars().map(|c| c as u32).collect()
        } else {
            let open = text
                .find('"')
                .ok_or_else(|| self.error(ErrorKind::Internal, "malformed string literal"))?;
            let body = &text[open + 1..text.len() - 1];
            decode_escapes(body).map_err(|msg| self.error(ErrorKind::Lex, msg))?
        };

        if self.is_utf16() {
            let mut units = Vec::with_capacity(points.len());
            for point in points {
                match char::from_u32(point) {
                    Some(ch) => {
                        let mut pair = [0u16; 2];
                        units.extend_from_slice(ch.encode_utf16(&mut pair));
                    }
                    None => units.push(point as u16),
                }
            }
            return Ok(ConstValue::Str16(units));
        }
        if self.is_utf32() || self.is_wide() {
            return Ok(ConstValue::Str32(points));
        }
        let mut value = String::with_capacity(points.len());
        for point in points {
            value.push(char::from_u32(point).ok_or_else(|| {
                self.error(ErrorKind::Range, "escape value is not a valid code point")
            })?);
        }
        Ok(ConstValue::Str(value))
    }
}

impl PartialEq<str> for Token {
    fn eq(&self, other: &str) -> bool {
        self.is_valid() && self.text() == other
    }
}

impl PartialEq<&str> for Token {
    fn eq(&self, other: &&str) -> bool {
        self.is_valid() && self.text() == *other
    }
}

fn owned_text(text: &str) -> TextRef {
    if text.is_empty() {
        TextRef::Empty
    } else {
        TextRef::Span {
            buf: Rc::from(text),
            start: 0,
            len: Some(text.len()),
        }
    }
}

/// Decodes escape sequences in a literal body into code points.
///
/// Supported: `\' \" \? \\ \a \b \f \n \r \t \v`, `\xHH`, `\uHHHH`,
/// `\UHHHHHHHH` and octal `\0`–`\777`.
pub(crate) fn decode_escapes(body: &str) -> std::result::Result<Vec<u32>, String> {
    let bytes = body.as_bytes();
    let mut points = Vec::new();
    let mut index = 0;
    while index < body.len() {
        let byte = bytes[index];
        if byte != b'\\' {
            // Multi-byte UTF-8 input passes through as code points.
            let ch = body[index..]
                .chars()
                .next()
                .ok_or_else(|| "truncated character".to_owned())?;
            points.push(ch as u32);
            index += ch.len_utf8();
            continue;
        }
        index += 1;
        let Some(&escape) = bytes.get(index) else {
            return Err("incomplete escape sequence".to_owned());
        };
        index += 1;
        let point = match escape {
            b'\'' => '\'' as u32,
            b'"' => '"' as u32,
            b'?' => '?' as u32,
            b'\\' => '\\' as u32,
            b'a' => 0x07,
            b'b' => 0x08,
            b'f' => 0x0C,
            b'n' => b'\n' as u32,
            b'r' => b'\r' as u32,
            b't' => b'\t' as u32,
            b'v' => 0x0B,
            b'x' => take_hex_digits(bytes, &mut index, 2, 1)?,
            b'u' => take_hex_digits(bytes, &mut index, 4, 4)?,
            b'U' => take_hex_digits(bytes, &mut index, 8, 8)?,
            b'0'..=b'7' => {
                let mut value = (escape - b'0') as u32;
                let mut digits = 1;
                while digits < 3 {
                    match bytes.get(index) {
                        Some(&digit @ b'0'..=b'7') => {
                            value = value * 8 + (digit - b'0') as u32;
                            index += 1;
                            digits += 1;
                        }
                        _ => break,
                    }
                }
                value
            }
            other => return Err(format!("invalid escape sequence '\\{}'", other as char)),
        };
        points.push(point);
    }
    Ok(points)
}

fn take_hex_digits(
    bytes: &[u8],
    index: &mut usize,
    max: usize,
    min: usize,
) -> std::result::Result<u32, String> {
    let mut value: u32 = 0;
    let mut taken = 0;
    while taken < max {
        let Some(digit) = bytes.get(*index).and_then(|b| (*b as char).to_digit(16)) else {
            break;
        };
        value = value
            .checked_mul(16)
            .and_then(|v| v.checked_add(digit))
            .ok_or_else(|| "escape value out of range".to_owned())?;
        *index += 1;
        taken += 1;
    }
    if taken < min {
        return Err("incomplete escape sequence".to_owned());
    }
    Ok(value)
}

/// Parses a C++17 hexadecimal float: `0x<hex>[.<hex>]p[+-]<dec>`.
fn parse_hex_float(text: &str) -> Option<f64> {
    let rest = text
        .strip_prefix("0x")
        .or_else(|| text.strip_prefix("0X"))?;
    let exponent_at = rest.find(['p', 'P'])?;
    let (mantissa, exponent) = rest.split_at(exponent_at);
    let exponent: i32 = exponent[1..].parse().ok()?;

    let (whole, fraction) = match mantissa.find('.') {
        Some(dot) => (&mantissa[..dot], &mantissa[dot + 1..]),
        None => (mantissa, ""),
    };
    if whole.is_empty() && fraction.is_empty() {
        return None;
    }

    let mut value = 0.0f64;
    for ch in whole.chars() {
        value = value * 16.0 + ch.to_digit(16)? as f64;
    }
    let mut scale = 1.0 / 16.0;
    for ch in fraction.chars() {
        value += ch.to_digit(16)? as f64 * scale;
        scale /= 16.0;
    }
    Some(value * 2f64.powi(exponent))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(text: &str, kind: LiteralKind) -> Token {
        Token::synthetic_literal(text, kind)
    }

    #[test]
    fn default_token_is_invalid_and_empty() {
        let token = Token::default();
        assert!(!token.is_valid());
        assert_eq!(token.kind(), TokenKind::None);
        assert_eq!(token.text(), "");
    }

    #[test]
    fn synthetic_token_owns_its_text() {
        let token = Token::synthetic("sequence", TokenKind::Keyword);
        assert!(token.is_valid());
        assert_eq!(token.text(), "sequence");
    }

    #[test]
    fn integer_values_bucket_by_magnitude() {
        assert_eq!(
            literal("42", LiteralKind::DecInt).value().unwrap(),
            ConstValue::I8(42)
        );
        assert_eq!(
            literal("0x1F4", LiteralKind::HexInt).value().unwrap(),
            ConstValue::I16(500)
        );
        assert_eq!(
            literal("0b1010", LiteralKind::BinInt).value().unwrap(),
            ConstValue::I8(10)
        );
        assert_eq!(
            literal("0777", LiteralKind::OctInt).value().unwrap(),
            ConstValue::I16(511)
        );
    }

    #[test]
    fn unsigned_suffix_switches_bucket_family() {
        assert_eq!(
            literal("200u", LiteralKind::DecInt).value().unwrap(),
            ConstValue::U8(200)
        );
        assert_eq!(
            literal("0xFFFFul", LiteralKind::HexInt).value().unwrap(),
            ConstValue::U16(0xFFFF)
        );
    }

    #[test]
    fn integer_overflow_is_a_range_error() {
        let err = literal("99999999999999999999", LiteralKind::DecInt)
            .value()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Range);
    }

    #[test]
    fn suffix_classification() {
        assert!(literal("1l", LiteralKind::DecInt).is_long());
        assert!(!literal("1ll", LiteralKind::DecInt).is_long());
        assert!(literal("1ll", LiteralKind::DecInt).is_long_long());
        assert!(literal("1u", LiteralKind::DecInt).is_unsigned());
        assert!(literal("1", LiteralKind::DecInt).is_signed());
    }

    #[test]
    fn character_values_decode_escapes() {
        assert_eq!(
            literal("'a'", LiteralKind::Char).value().unwrap(),
            ConstValue::I8(97)
        );
        assert_eq!(
            literal("'\\n'", LiteralKind::Char).value().unwrap(),
            ConstValue::I8(10)
        );
        assert_eq!(
            literal("'\\x41'", LiteralKind::Char).value().unwrap(),
            ConstValue::I8(65)
        );
        assert_eq!(
            literal("u'\\u20AC'", LiteralKind::Char).value().unwrap(),
            ConstValue::U16(0x20AC)
        );
    }

    #[test]
    fn character_sequences_pack_high_to_low() {
        assert_eq!(
            literal("'ab'", LiteralKind::CharSeq).value().unwrap(),
            ConstValue::I16(('a' as i64 * 256 + 'b' as i64) as i16)
        );
        let eight = literal("'abcdefgh'", LiteralKind::CharSeq);
        assert!(eight.is_long_long());
        let nine = literal("'abcdefghi'", LiteralKind::CharSeq);
        assert_eq!(nine.value().unwrap_err().kind, ErrorKind::Range);
    }

    #[test]
    fn float_values_parse_decimal_and_hex() {
        assert_eq!(
            literal("1.5", LiteralKind::DecFloat).value().unwrap(),
            ConstValue::F32(1.5)
        );
        assert_eq!(
            literal("0x1.8p3", LiteralKind::HexFloat).value().unwrap(),
            ConstValue::F32(12.0)
        );
        match literal("1e300", LiteralKind::DecFloat).value().unwrap() {
            ConstValue::F64(v) => assert_eq!(v, 1e300),
            other => panic!("expected F64, got {other:?}"),
        }
    }

    #[test]
    fn fixed_point_range_is_checked() {
        assert_eq!(
            literal("3.25d", LiteralKind::FixedPoint).value().unwrap(),
            ConstValue::F32(3.25)
        );
        let err = literal("4000000000d", LiteralKind::FixedPoint)
            .value()
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Range);
    }

    #[test]
    fn string_values_decode_per_prefix() {
        assert_eq!(
            literal("\"ab\\tc\"", LiteralKind::Str).value().unwrap(),
            ConstValue::Str("ab\tc".to_owned())
        );
        assert_eq!(
            literal("u\"hi\"", LiteralKind::Str).value().unwrap(),
            ConstValue::Str16(vec![104, 105])
        );
        assert_eq!(
            literal("U\"hi\"", LiteralKind::Str).value().unwrap(),
            ConstValue::Str32(vec![104, 105])
        );
        assert_eq!(
            literal("R\"(no \\n escapes)\"", LiteralKind::RawStr)
                .value()
                .unwrap(),
            ConstValue::Str("no \\n escapes".to_owned())
        );
    }

    #[test]
    fn prefix_predicates() {
        assert!(literal("\"x\"", LiteralKind::Str).is_ascii());
        assert!(literal("u8\"x\"", LiteralKind::Str).is_utf8());
        assert!(literal("u\"x\"", LiteralKind::Str).is_utf16());
        assert!(literal("U\"x\"", LiteralKind::Str).is_utf32());
        assert!(literal("L\"x\"", LiteralKind::Str).is_wide());
        assert!(literal("R\"(x)\"", LiteralKind::RawStr).is_ascii());
        assert!(literal("u8R\"(x)\"", LiteralKind::RawStr).is_utf8());
    }

    #[test]
    fn boolean_and_null_values() {
        assert_eq!(
            literal("TRUE", LiteralKind::Bool).value().unwrap(),
            ConstValue::Bool(true)
        );
        assert!(literal("1", LiteralKind::DecInt).value_as_bool().unwrap());
        assert!(!literal("'\\0'", LiteralKind::Char).value_as_bool().unwrap());
        assert!(literal("2", LiteralKind::DecInt).value_as_bool().is_err());
        assert_eq!(
            literal("NULL", LiteralKind::Null).value().unwrap(),
            ConstValue::Null
        );
        assert_eq!(
            literal("0", LiteralKind::DecInt).value_as_null().unwrap(),
            ConstValue::Null
        );
    }

    #[test]
    fn move_start_and_end_adjust_the_span() {
        let mut token = Token::synthetic("  name  ", TokenKind::Identifier);
        token.move_start(2);
        token.move_end(-2);
        assert_eq!(token.text(), "name");
        token.move_end(2);
        assert_eq!(token.text(), "name  ");
    }

    #[test]
    fn end_line_and_column_scan_the_span() {
        let mut token = Token::synthetic("ab\ncd", TokenKind::Comment);
        token.line = 3;
        token.col = 5;
        assert_eq!(token.end_line(), 4);
        assert_eq!(token.end_col(), 2);
    }

    #[test]
    fn left_and_right_take_substrings() {
        let token = Token::synthetic("verbatim", TokenKind::Identifier);
        assert_eq!(token.left(4), "verb");
        assert_eq!(token.right(3), "tim");
        assert_eq!(token.left(100), "verbatim");
    }
}
