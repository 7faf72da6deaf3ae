//! Macro definitions and expansion.
//!
//! A [`MacroDef`] stores one `#define`: the name, whether a parameter list
//! was present (a macro can expect parentheses with zero parameters), the
//! parameter names and the replacement text. Expansion substitutes
//! parameters into the replacement, handling the stringification (`#`) and
//! token-pasting (`##`) operators, and recursively expands the result.
//!
//! ## Circular references
//!
//! A set of macro names currently mid-expansion travels through every
//! expansion step. Parameter expansions receive a copy seeded from the
//! caller so sibling arguments cannot shadow each other's guards, and the
//! macros they use are merged back into the caller's set on return. A name
//! found in the set is left untouched as a plain identifier, so
//! `#define A A` expands `A` to exactly `A`.
//!
//! ## Replacement-text normalisation
//!
//! Comments in the replacement are stripped and runs of whitespace collapse
//! to a single space. Whitespace around `##` is discarded entirely.

use std::collections::{BTreeMap, BTreeSet};

use sdvidl_base::{CompileError, ErrorKind, Result};

use crate::codepos::CodeCursor;
use crate::environment::Environment;
use crate::lexer::{DirectiveFlow, Lexer, LexingMode, TokenSink};
use crate::token::{Token, TokenKind};

/// Set of macro names used previously in an expansion.
pub type UsedMacroSet = BTreeSet<String>;

/// Map of macro name to definition.
pub type MacroMap = BTreeMap<String, MacroDef>;

/// One `#define` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroDef {
    name: String,
    expect_params: bool,
    params: Vec<String>,
    value: String,
}

impl MacroDef {
    /// Creates a macro definition. `params` is `None` when no parentheses
    /// were given; `Some(vec![])` is a function-like macro with zero
    /// parameters. Leading and trailing whitespace of the value is trimmed.
    pub fn new(name: &str, params: Option<Vec<String>>, value: &str) -> Self {
        Self {
            name: name.to_owned(),
            expect_params: params.is_some(),
            params: params.unwrap_or_default(),
            value: value.trim().to_owned(),
        }
    }

    /// The macro name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns `true` when the macro uses parentheses. Note that a macro
    /// can expect parentheses while having zero parameters.
    pub fn expect_parameters(&self) -> bool {
        self.expect_params
    }

    /// The parameter names.
    pub fn params(&self) -> &[String] {
        &self.params
    }

    /// The replacement text.
    pub fn value(&self) -> &str {
        &self.value
    }

    /// Expands the macro with the provided arguments.
    ///
    /// `call` locates the invocation for error reporting. `used` is the set
    /// of macros already active in this expansion chain; it is extended
    /// with every macro used while expanding.
    pub fn expand(
        &self,
        env: &Environment,
        call: &Token,
        args: &[String],
        used: &mut UsedMacroSet,
    ) -> Result<String> {
        if args.len() < self.params.len() {
            return Err(CompileError::new(
                ErrorKind::MacroArity,
                format!("missing parameters while calling macro '{}'", self.name),
                call.location(),
            ));
        }
        if args.len() > self.params.len() {
            return Err(CompileError::new(
                ErrorKind::MacroArity,
                format!("too many parameters while calling macro '{}'", self.name),
                call.location(),
            ));
        }

        // The seed for every parameter expansion stays fixed; the caller's
        // set keeps growing.
        let seed = used.clone();

        let mut target = String::new();
        let mut concat_next = false;
        let mut stringify_next = false;
        let mut lexer = Lexer::new(env.case_sensitive_extension(), LexingMode::Preproc);
        let mut cursor = CodeCursor::from_text(&self.value);
        let mut sink = SpaceSink::default();

        loop {
            if cursor.at_eof() {
                break;
            }
            let token = lexer.next(&mut cursor, None, &mut sink)?;
            if !token.is_valid() {
                if cursor.at_eof() {
                    break;
                }
                // An unescaped line break inside the replacement reads as
                // whitespace.
                cursor.advance();
                sink.pending = true;
                continue;
            }

            if token == "##" {
                if concat_next && !stringify_next {
                    return Err(self.expand_error(call, "duplicate concatenation operator"));
                }
                if stringify_next {
                    return Err(self
                        .expand_error(call, "cannot stringify and then concatenate the result"));
                }
                if target.is_empty() {
                    return Err(self
                        .expand_error(call, "concatenation operator at start of replacement"));
                }
                truncate_trailing_whitespace(&mut target);
                sink.pending = false;
                concat_next = true;
                continue;
            }

            if token == "#" {
                if stringify_next {
                    return Err(self.expand_error(call, "duplicate stringification operator"));
                }
                stringify_next = true;
                // Also suppresses the whitespace between '#' and the name.
                concat_next = true;
                continue;
            }

            let mut piece = String::new();
            let mut substituted = false;
            if token.kind() == TokenKind::Identifier {
                if let Some(index) = self.params.iter().position(|p| p == token.text()) {
                    substituted = true;
                    if stringify_next {
                        piece = stringify(&args[index]);
                    } else {
                        piece = expand_text(env, &args[index], &seed, used)?;
                    }
                }
            }
            if !substituted {
                if stringify_next {
                    return Err(self.expand_error(
                        call,
                        "stringification requires a parameter name",
                    ));
                }
                piece = token.text().to_owned();
            }

            if sink.pending && !concat_next && !target.is_empty() {
                target.push(' ');
            }
            sink.pending = false;
            target.push_str(&piece);
            concat_next = false;
            stringify_next = false;
        }

        if concat_next {
            return Err(self.expand_error(call, "concatenation operator at end of replacement"));
        }
        if stringify_next {
            return Err(self.expand_error(call, "stringification operator at end of replacement"));
        }

        // The caller's set now holds the macros used by the parameters as
        // well; expand the substituted text against all of them.
        let seed = used.clone();
        expand_text(env, &target, &seed, used)
    }

    fn expand_error(&self, call: &Token, message: &str) -> CompileError {
        CompileError::new(
            ErrorKind::Lex,
            format!("{message} while resolving macro '{}'", self.name),
            call.location(),
        )
    }
}

/// Expands every macro found in `text` and returns the resulting string.
///
/// The used-macro set for the scan is re-seeded from `seed` whenever the
/// cursor leaves prepended (already expanded) text; macros used during the
/// expansion are merged into `merge_into`.
pub(crate) fn expand_text(
    env: &Environment,
    text: &str,
    seed: &UsedMacroSet,
    merge_into: &mut UsedMacroSet,
) -> Result<String> {
    let mut target = String::new();
    let mut lexer = Lexer::new(env.case_sensitive_extension(), LexingMode::Preproc);
    let mut cursor = CodeCursor::from_text(text);
    let mut sink = SpaceSink::default();
    let mut used = seed.clone();

    loop {
        if cursor.at_eof() {
            break;
        }
        let in_expansion = cursor.in_expansion();
        if !in_expansion {
            used = seed.clone();
        }

        let token = lexer.next(&mut cursor, None, &mut sink)?;
        if !token.is_valid() {
            if cursor.at_eof() {
                break;
            }
            cursor.advance();
            sink.pending = true;
            continue;
        }

        if token.kind() == TokenKind::Identifier {
            let name = token.text().to_owned();
            if env.test_and_expand(&name, &mut cursor, in_expansion, &mut used)? {
                for used_name in &used {
                    merge_into.insert(used_name.clone());
                }
                continue;
            }
        }

        if sink.pending && !target.is_empty() {
            target.push(' ');
        }
        sink.pending = false;
        target.push_str(token.text());
    }

    Ok(target)
}

/// Converts unexpanded argument text into a quoted literal, escaping
/// quotes and control characters.
fn stringify(text: &str) -> String {
    let mut target = String::with_capacity(text.len() + 2);
    target.push('"');
    for ch in text.chars() {
        match ch {
            '"' => target.push_str("\\\""),
            '\'' => target.push_str("\\'"),
            '\x07' => target.push_str("\\a"),
            '\x08' => target.push_str("\\b"),
            '\x0C' => target.push_str("\\f"),
            '\n' => target.push_str("\\n"),
            '\r' => target.push_str("\\r"),
            '\t' => target.push_str("\\t"),
            '\x0B' => target.push_str("\\v"),
            other => target.push(other),
        }
    }
    target.push('"');
    target
}

fn truncate_trailing_whitespace(target: &mut String) {
    let trimmed = target.trim_end().len();
    target.truncate(trimmed);
}

/// Sink remembering that whitespace occurred; the consumer collapses the
/// run into a single space. Comments are dropped entirely.
#[derive(Default)]
struct SpaceSink {
    pending: bool,
}

impl TokenSink for SpaceSink {
    fn whitespace(&mut self, _token: &Token) {
        self.pending = true;
    }

    fn directive(&mut self, _cursor: &mut CodeCursor) -> Result<DirectiveFlow> {
        Err(CompileError::bare(
            ErrorKind::Internal,
            "directive inside a macro replacement",
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_is_trimmed() {
        let def = MacroDef::new("M", None, "  a + b \t");
        assert_eq!(def.value(), "a + b");
        assert!(!def.expect_parameters());
    }

    #[test]
    fn function_like_with_zero_params_expects_parentheses() {
        let def = MacroDef::new("F", Some(vec![]), "");
        assert!(def.expect_parameters());
        assert!(def.params().is_empty());
    }

    #[test]
    fn identical_definitions_compare_equal() {
        let a = MacroDef::new("M", Some(vec!["x".into()]), "x*2");
        let b = MacroDef::new("M", Some(vec!["x".into()]), " x*2 ");
        let c = MacroDef::new("M", Some(vec!["y".into()]), "x*2");
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn stringify_escapes_quotes_and_control_bytes() {
        assert_eq!(stringify("a\"b"), "\"a\\\"b\"");
        assert_eq!(stringify("tab\there"), "\"tab\\there\"");
        assert_eq!(stringify("new\nline"), "\"new\\nline\"");
    }

    #[test]
    fn plain_substitution() {
        let env = Environment::new();
        let def = MacroDef::new("TWICE", Some(vec!["x".into()]), "x * 2");
        let mut used = UsedMacroSet::new();
        let result = def
            .expand(&env, &Token::default(), &["21".into()], &mut used)
            .unwrap();
        assert_eq!(result, "21 * 2");
    }

    #[test]
    fn pasting_discards_surrounding_whitespace() {
        let env = Environment::new();
        let def = MacroDef::new("GLUE", Some(vec!["a".into(), "b".into()]), "a ## b");
        let mut used = UsedMacroSet::new();
        let result = def
            .expand(&env, &Token::default(), &["ab".into(), "cd".into()], &mut used)
            .unwrap();
        assert_eq!(result, "abcd");
    }

    #[test]
    fn stringification_uses_unexpanded_text() {
        let env = Environment::new();
        let def = MacroDef::new("TEXT", Some(vec!["c".into()]), "# c");
        let mut used = UsedMacroSet::new();
        let result = def
            .expand(&env, &Token::default(), &["hello".into()], &mut used)
            .unwrap();
        assert_eq!(result, "\"hello\"");
    }

    #[test]
    fn wrong_arity_is_rejected() {
        let env = Environment::new();
        let def = MacroDef::new("F", Some(vec!["a".into(), "b".into()]), "a b");
        let mut used = UsedMacroSet::new();
        let err = def
            .expand(&env, &Token::default(), &["1".into()], &mut used)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MacroArity);
        let err = def
            .expand(
                &env,
                &Token::default(),
                &["1".into(), "2".into(), "3".into()],
                &mut used,
            )
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::MacroArity);
    }

    #[test]
    fn double_pasting_operator_is_rejected() {
        let env = Environment::new();
        let def = MacroDef::new("BAD", Some(vec!["a".into()]), "a ## ## a");
        let mut used = UsedMacroSet::new();
        let err = def
            .expand(&env, &Token::default(), &["x".into()], &mut used)
            .unwrap_err();
        assert_eq!(err.kind, ErrorKind::Lex);
    }

    #[test]
    fn comments_are_stripped_and_whitespace_collapsed() {
        let env = Environment::new();
        let def = MacroDef::new(
            "M",
            Some(vec!["a".into(), "b".into()]),
            "a /* gone */   b",
        );
        let mut used = UsedMacroSet::new();
        let result = def
            .expand(&env, &Token::default(), &["x".into(), "y".into()], &mut used)
            .unwrap();
        assert_eq!(result, "x y");
    }
}
