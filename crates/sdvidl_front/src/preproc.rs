//! Preprocessor directive handling.
//!
//! [`Preprocessor::process_directive`] consumes one `#`-prefixed line in
//! preprocessor-line mode and implements `#define`, `#undef`, `#if`,
//! `#ifdef`, `#ifndef`, `#elif`, `#else`, `#endif`, `#include`,
//! `#verbatim` and `#verbatim_begin`..`#verbatim_end`.
//!
//! ## Conditional sections
//!
//! Conditional inclusion is tracked on a stack of frames, one per open
//! `#if`/`#ifdef`/`#ifndef`. Each frame records which arm it is in and a
//! processing phase:
//!
//! | Phase | Meaning |
//! |-------|---------|
//! | `Disabled` | a parent section is inactive |
//! | `Current`  | this arm is being processed |
//! | `Previous` | an earlier arm was processed |
//! | `Future`   | a later arm might still be processed |
//!
//! Directives inside a disabled section are honoured for nesting only;
//! their bodies are not executed.
//!
//! ## `#if` expressions
//!
//! Conditions evaluate in signed 64-bit arithmetic with C-like operator
//! precedence (precedence climbing, lowest number binds tightest). Macros
//! are expanded first, unknown identifiers evaluate to 0, character
//! literals to their code point, and `defined`/`defined(…)` test macro
//! existence. Division or modulo by zero is an error.

use std::path::PathBuf;
use std::rc::Rc;

use log::debug;
use sdvidl_base::{CompileError, ErrorKind, Location, Result};

use crate::codepos::CodeCursor;
use crate::environment::Environment;
use crate::lexer::{Lexer, LexingMode, NullSink};
use crate::macros::MacroDef;
use crate::source::Source;
use crate::token::{MetaKind, Token, TokenKind};

/// Which arm of a conditional section is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CondArm {
    /// Within the if-arm: `#elif`, `#else` and `#endif` may follow.
    If,
    /// Within the else-arm: only `#endif` may follow.
    Else,
}

/// Processing state of a conditional section.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CondPhase {
    /// Disabled by a parent conditional section.
    Disabled,
    /// The current arm is being processed.
    Current,
    /// A previous arm was processed.
    Previous,
    /// A future arm might be processed.
    Future,
}

#[derive(Debug, Clone, Copy)]
struct CondFrame {
    arm: CondArm,
    phase: CondPhase,
}

/// A resolved `#include` the driver has to act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncludeRequest {
    /// Absolute path of the file to include.
    pub path: PathBuf,
    /// `true` for the `"…"` form, `false` for `<…>`.
    pub local: bool,
}

/// Result of processing one directive line.
#[derive(Debug, Default)]
pub struct DirectiveOutcome {
    /// Meta token describing the directive, for downstream emission.
    /// Only produced in enabled sections.
    pub meta: Option<Token>,
    /// An include to be pushed by the driver.
    pub include: Option<IncludeRequest>,
}

/// The preprocessor state machine.
#[derive(Debug, Default)]
pub struct Preprocessor {
    cond_stack: Vec<CondFrame>,
}

impl Preprocessor {
    /// Creates a preprocessor with an empty conditional stack.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the current section's code is to be processed.
    pub fn section_enabled(&self) -> bool {
        self.cond_stack
            .last()
            .map_or(true, |frame| frame.phase == CondPhase::Current)
    }

    /// Verifies that no conditional section is left open. Called at the
    /// end of a compilation unit.
    pub fn finish(&self, location: Location) -> Result<()> {
        if self.cond_stack.is_empty() {
            return Ok(());
        }
        Err(CompileError::new(
            ErrorKind::UnbalancedDirective,
            "missing '#endif' directive",
            location,
        ))
    }

    /// Processes one directive line. The cursor stands on the `#` sign;
    /// on return it stands at the end of the directive line.
    pub fn process_directive(
        &mut self,
        cursor: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &mut Environment,
    ) -> Result<DirectiveOutcome> {
        let mut code = cursor.clone();
        let mut lexer = Lexer::new(env.case_sensitive_extension(), LexingMode::Preproc);
        let mut sink = NullSink;
        let mut outcome = DirectiveOutcome::default();

        let sign = lexer.next(&mut code, Some(ctx), &mut sink)?;
        if sign != "#" {
            return Err(CompileError::new(
                ErrorKind::Internal,
                "expected preprocessor directive sign",
                location_of(&code, ctx),
            ));
        }

        let keyword = lexer.next(&mut code, Some(ctx), &mut sink)?;
        match keyword.text() {
            "define" => {
                skip_blanks(&mut code);
                let mut meta = code.location(TokenKind::Meta);
                meta.set_context(Rc::clone(ctx));
                self.process_define(&mut lexer, &mut code, ctx, env)?;
                code.update_location_meta(&mut meta, MetaKind::Define)?;
                outcome.meta = Some(meta);
            }
            "undef" => {
                skip_blanks(&mut code);
                let mut meta = code.location(TokenKind::Meta);
                meta.set_context(Rc::clone(ctx));
                self.process_undef(&mut lexer, &mut code, ctx, env)?;
                code.update_location_meta(&mut meta, MetaKind::Undef)?;
                outcome.meta = Some(meta);
            }
            "include" => {
                skip_blanks(&mut code);
                let mut meta = code.location(TokenKind::Meta);
                meta.set_context(Rc::clone(ctx));
                let request = self.process_include(&mut code, ctx, env)?;
                let kind = match &request {
                    Some(request) if request.local => MetaKind::IncludeLocal,
                    _ => MetaKind::IncludeGlobal,
                };
                code.update_location_meta(&mut meta, kind)?;
                outcome.meta = Some(meta);
                outcome.include = request;
            }
            "if" => self.process_if(&mut lexer, &mut code, ctx, env)?,
            "ifdef" => self.process_ifdef(&mut lexer, &mut code, ctx, env, false)?,
            "ifndef" => self.process_ifdef(&mut lexer, &mut code, ctx, env, true)?,
            "elif" => self.process_elif(&mut lexer, &mut code, ctx, env)?,
            "else" => self.process_else(&code, ctx)?,
            "endif" => self.process_endif(&code, ctx)?,
            "verbatim" => {
                debug!("preprocess #verbatim");
                if self.section_enabled() {
                    skip_blanks(&mut code);
                    let mut meta = code.location(TokenKind::Meta);
                    meta.set_context(Rc::clone(ctx));
                    lexer.skip_line(&mut code);
                    code.update_location_meta(&mut meta, MetaKind::Verbatim)?;
                    outcome.meta = Some(meta);
                }
            }
            "verbatim_begin" => {
                // The rest of the begin line is ignored text.
                lexer.skip_line(&mut code);
                if code.current() == b'\r' {
                    code.advance();
                }
                if code.current() == b'\n' {
                    code.advance();
                }
                if self.section_enabled() {
                    let mut meta = code.location(TokenKind::Meta);
                    meta.set_context(Rc::clone(ctx));
                    self.scan_verbatim_block(&mut lexer, &mut code, ctx)?;
                    code.update_location_meta(&mut meta, MetaKind::Verbatim)?;
                    outcome.meta = Some(meta);
                    // Consume the '#verbatim_end' line itself.
                    lexer.skip_line(&mut code);
                }
            }
            "verbatim_end" => {
                if self.section_enabled() {
                    return Err(CompileError::new(
                        ErrorKind::UnbalancedDirective,
                        "'#verbatim_end' without matching '#verbatim_begin'",
                        keyword.location(),
                    ));
                }
            }
            "pragma" => {
                if self.section_enabled() {
                    return Err(CompileError::new(
                        ErrorKind::UnsupportedDirective,
                        "unsupported preprocessor directive '#pragma'",
                        keyword.location(),
                    ));
                }
            }
            other => {
                if self.section_enabled() {
                    return Err(CompileError::new(
                        ErrorKind::UnknownDirective,
                        format!("unknown preprocessor directive '#{other}'"),
                        keyword.location(),
                    ));
                }
            }
        }

        // Skip whatever remains of the directive line.
        lexer.skip_line(&mut code);
        *cursor = code;

        if !self.section_enabled() {
            outcome.meta = None;
        }
        Ok(outcome)
    }

    fn process_define(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &mut Environment,
    ) -> Result<()> {
        debug!("preprocess #define");
        if !self.section_enabled() {
            return Ok(());
        }

        let mut sink = NullSink;
        let name = lexer.next(code, Some(ctx), &mut sink)?;
        if name.kind() != TokenKind::Identifier {
            return Err(CompileError::new(
                ErrorKind::Lex,
                "definition name missing",
                location_of(code, ctx),
            ));
        }

        // Parameters exist only when the parenthesis follows the name
        // without separating whitespace.
        let params = if code.current() == b'(' {
            Some(self.parse_params(lexer, code, ctx)?)
        } else {
            None
        };

        let mut value = code.location(TokenKind::None);
        lexer.skip_line(code);
        code.update_location(&mut value);

        let macro_def = MacroDef::new(name.text(), params, value.text());
        debug!(
            "macro definition {}{} = {}",
            macro_def.name(),
            if macro_def.expect_parameters() {
                format!("({})", macro_def.params().join(", "))
            } else {
                String::new()
            },
            macro_def.value()
        );
        env.add_macro(name.location(), macro_def)
    }

    fn parse_params(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
    ) -> Result<Vec<String>> {
        let mut sink = NullSink;
        let open = lexer.next(code, Some(ctx), &mut sink)?;
        if open != "(" {
            return Err(CompileError::new(
                ErrorKind::MacroArity,
                "invalid character for macro definition; expecting '('",
                open.location(),
            ));
        }

        let mut params = Vec::new();
        let mut first = true;
        loop {
            let token = lexer.next(code, Some(ctx), &mut sink)?;
            if first && token == ")" {
                return Ok(params);
            }
            first = false;
            if token.kind() != TokenKind::Identifier {
                return Err(CompileError::new(
                    ErrorKind::MacroArity,
                    "expecting a parameter name",
                    token.location(),
                ));
            }
            let param = token.text().to_owned();
            if params.contains(&param) {
                return Err(CompileError::new(
                    ErrorKind::MacroArity,
                    "duplicate parameter names for macro definition",
                    token.location(),
                ));
            }
            params.push(param);

            let token = lexer.next(code, Some(ctx), &mut sink)?;
            if token == ")" {
                return Ok(params);
            }
            if token != "," {
                return Err(CompileError::new(
                    ErrorKind::MacroArity,
                    "unexpected symbol in parameter list",
                    token.location(),
                ));
            }
        }
    }

    fn process_undef(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &mut Environment,
    ) -> Result<()> {
        debug!("preprocess #undef");
        if !self.section_enabled() {
            return Ok(());
        }
        let mut sink = NullSink;
        let name = lexer.next(code, Some(ctx), &mut sink)?;
        if name.kind() != TokenKind::Identifier {
            return Err(CompileError::new(
                ErrorKind::Lex,
                "definition name missing",
                location_of(code, ctx),
            ));
        }
        debug!("remove definition {}", name.text());
        env.remove_definition(name.text());
        Ok(())
    }

    fn process_include(
        &mut self,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &Environment,
    ) -> Result<Option<IncludeRequest>> {
        debug!("preprocess #include");
        if !self.section_enabled() {
            return Ok(None);
        }

        // The path may contain backslashes that must not be read as escape
        // sequences, so the file name is scanned without the lexer.
        skip_blanks(code);

        let mut symbol = code.location(TokenKind::None);
        symbol.set_context(Rc::clone(ctx));
        let local = match code.current() {
            b'<' => false,
            b'"' => true,
            _ => {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    "invalid symbol after '#include'",
                    symbol.location(),
                ))
            }
        };
        code.advance();

        let mut path_token = code.location(TokenKind::None);
        path_token.set_context(Rc::clone(ctx));
        let closer = if local { b'"' } else { b'>' };
        loop {
            match code.current() {
                0 => {
                    return Err(CompileError::new(
                        ErrorKind::Lex,
                        "unexpected end of file in '#include'",
                        path_token.location(),
                    ))
                }
                b'\r' | b'\n' => {
                    return Err(CompileError::new(
                        ErrorKind::Lex,
                        "unexpected end of line in '#include'",
                        path_token.location(),
                    ))
                }
                byte if byte == closer => break,
                _ => code.advance(),
            }
        }
        code.update_location(&mut path_token);
        if path_token.is_empty() {
            return Err(CompileError::new(
                ErrorKind::Lex,
                "no filename supplied",
                path_token.location(),
            ));
        }
        code.advance(); // closing symbol

        let relative = PathBuf::from(path_token.text());
        let mut confirmed = None;

        // The local form searches the directory of the current source
        // first; absolute paths bypass the search entirely.
        if local {
            let candidate = if relative.is_absolute() {
                relative.clone()
            } else {
                ctx.path()
                    .parent()
                    .map(|dir| dir.join(&relative))
                    .unwrap_or_else(|| relative.clone())
            };
            if candidate.exists() {
                confirmed = Some(candidate);
            }
        }
        if confirmed.is_none() {
            for dir in env.include_dirs() {
                let candidate = dir.join(&relative);
                if candidate.exists() {
                    confirmed = Some(candidate);
                    break;
                }
            }
        }

        let Some(found) = confirmed else {
            return Err(CompileError::new(
                ErrorKind::IncludeNotFound,
                format!("include file '{}' not found", path_token.text()),
                symbol.location(),
            ));
        };
        let absolute = std::path::absolute(&found).map_err(|err| {
            CompileError::new(
                ErrorKind::Io,
                format!("cannot resolve include path: {err}"),
                symbol.location(),
            )
        })?;

        debug!(
            "include {}{}{} -> {}",
            if local { '"' } else { '<' },
            path_token.text(),
            if local { '"' } else { '>' },
            absolute.display()
        );
        Ok(Some(IncludeRequest {
            path: absolute,
            local,
        }))
    }

    fn process_if(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &mut Environment,
    ) -> Result<()> {
        debug!("preprocess #if");
        let mut phase = CondPhase::Disabled;
        if self.section_enabled() {
            let mut condition = code.location(TokenKind::None);
            let value = self.cond_eval(lexer, code, ctx, env, TOP_PRECEDENCE)?;
            code.update_location(&mut condition);
            debug!("condition '{}' = {}", condition.text().trim(), value);
            phase = if value != 0 {
                CondPhase::Current
            } else {
                CondPhase::Future
            };
        }
        self.cond_stack.push(CondFrame {
            arm: CondArm::If,
            phase,
        });
        Ok(())
    }

    fn process_ifdef(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &Environment,
        inverted: bool,
    ) -> Result<()> {
        debug!("preprocess #if{}def", if inverted { "n" } else { "" });
        let mut phase = CondPhase::Disabled;
        if self.section_enabled() {
            let mut sink = NullSink;
            let name = lexer.next(code, Some(ctx), &mut sink)?;
            if name.kind() != TokenKind::Identifier {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    "definition name missing",
                    location_of(code, ctx),
                ));
            }
            let defined = env.defined(name.text());
            debug!(
                "definition {} {}",
                name.text(),
                if defined { "exists" } else { "does not exist" }
            );
            phase = if defined != inverted {
                CondPhase::Current
            } else {
                CondPhase::Future
            };
        }
        self.cond_stack.push(CondFrame {
            arm: CondArm::If,
            phase,
        });
        Ok(())
    }

    fn process_elif(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &mut Environment,
    ) -> Result<()> {
        debug!("preprocess #elif");
        let Some(frame) = self.cond_stack.last() else {
            return Err(CompileError::new(
                ErrorKind::UnbalancedDirective,
                "unexpected '#elif' directive",
                location_of(code, ctx),
            ));
        };
        if frame.arm == CondArm::Else {
            return Err(CompileError::new(
                ErrorKind::UnbalancedDirective,
                "'#elif' after '#else'",
                location_of(code, ctx),
            ));
        }
        match frame.phase {
            CondPhase::Future => {
                let mut condition = code.location(TokenKind::None);
                let value = self.cond_eval(lexer, code, ctx, env, TOP_PRECEDENCE)?;
                code.update_location(&mut condition);
                debug!("condition '{}' = {}", condition.text().trim(), value);
                if value != 0 {
                    self.cond_stack.last_mut().unwrap().phase = CondPhase::Current;
                }
            }
            CondPhase::Current => {
                self.cond_stack.last_mut().unwrap().phase = CondPhase::Previous;
            }
            CondPhase::Disabled | CondPhase::Previous => {}
        }
        Ok(())
    }

    fn process_else(&mut self, code: &CodeCursor, ctx: &Rc<Source>) -> Result<()> {
        debug!("preprocess #else");
        let Some(frame) = self.cond_stack.last_mut() else {
            return Err(CompileError::new(
                ErrorKind::UnbalancedDirective,
                "unexpected '#else' directive",
                location_of(code, ctx),
            ));
        };
        if frame.arm == CondArm::Else {
            return Err(CompileError::new(
                ErrorKind::UnbalancedDirective,
                "duplicate '#else' directive",
                location_of(code, ctx),
            ));
        }
        frame.arm = CondArm::Else;
        frame.phase = match frame.phase {
            CondPhase::Future => CondPhase::Current,
            CondPhase::Current => CondPhase::Previous,
            other => other,
        };
        Ok(())
    }

    fn process_endif(&mut self, code: &CodeCursor, ctx: &Rc<Source>) -> Result<()> {
        debug!("preprocess #endif");
        if self.cond_stack.pop().is_none() {
            return Err(CompileError::new(
                ErrorKind::UnbalancedDirective,
                "unexpected '#endif' directive",
                location_of(code, ctx),
            ));
        }
        Ok(())
    }

    /// Advances `code` to the start of the line containing
    /// `#verbatim_end`.
    fn scan_verbatim_block(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
    ) -> Result<()> {
        loop {
            if code.at_eof() {
                return Err(CompileError::new(
                    ErrorKind::UnbalancedDirective,
                    "missing '#verbatim_end' directive",
                    location_of(code, ctx),
                ));
            }

            // Whitespace may precede and follow the number sign.
            let backup = code.clone();
            skip_blanks(code);
            if code.current() == b'#' {
                code.advance();
                skip_blanks(code);
                if starts_with(code, b"verbatim_end") {
                    *code = backup;
                    return Ok(());
                }
            }

            lexer.skip_line(code);
            while matches!(code.current(), b'\r' | b'\n') {
                code.advance();
            }
        }
    }

    /// Evaluates a conditional expression with precedence climbing.
    fn cond_eval(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &mut Environment,
        precedence: u32,
    ) -> Result<i64> {
        let mut sink = NullSink;
        let in_expansion = code.in_expansion();
        let token = lexer.next(code, Some(ctx), &mut sink)?;

        // The left-hand side: parenthesised group, unary operator,
        // `defined`, literal, or (macro-)identifier.
        let mut lvalue: i64;
        if token == "(" {
            lvalue = self.cond_eval(lexer, code, ctx, env, TOP_PRECEDENCE)?;
            let close = lexer.next(code, Some(ctx), &mut sink)?;
            if close != ")" {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    "expecting a right parenthesis",
                    close.location(),
                ));
            }
        } else if token == "!" {
            lvalue = i64::from(self.cond_eval(lexer, code, ctx, env, 0)? == 0);
        } else if token == "~" {
            lvalue = !self.cond_eval(lexer, code, ctx, env, 0)?;
        } else if token == "defined" {
            lvalue = self.eval_defined(lexer, code, ctx, env)?;
        } else if token == "true" || token == "TRUE" {
            lvalue = 1;
        } else if token == "false" || token == "FALSE" {
            lvalue = 0;
        } else if token.kind() == TokenKind::Identifier {
            let name = token.text().to_owned();
            if env.test_and_expand_current(&name, code, in_expansion)? {
                lvalue = self.cond_eval(lexer, code, ctx, env, precedence)?;
            } else {
                // Unknown identifiers evaluate to 0.
                lvalue = 0;
            }
        } else if token.kind() == TokenKind::Literal {
            lvalue = token.value()?.as_i64().unwrap_or(0);
        } else {
            return Err(CompileError::new(
                ErrorKind::Lex,
                format!("unexpected token '{}' in condition", token.text()),
                token.location(),
            ));
        }

        // Fold operators as long as they bind tighter than the caller's
        // precedence level.
        loop {
            let token = lexer.next(code, Some(ctx), &mut sink)?;
            if !token.is_valid() {
                return Ok(lvalue);
            }
            if token == ")" {
                code.prepend(")");
                return Ok(lvalue);
            }

            let Some(op) = Operator::from_text(token.text()) else {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    format!("expecting operator, found '{}'", token.text()),
                    token.location(),
                ));
            };
            if op.precedence() >= precedence {
                code.prepend(token.text());
                return Ok(lvalue);
            }

            let rvalue = self.cond_eval(lexer, code, ctx, env, op.precedence())?;
            if matches!(op, Operator::Div | Operator::Mod) && rvalue == 0 {
                return Err(CompileError::new(
                    ErrorKind::DivByZero,
                    "division by zero in conditional expression",
                    token.location(),
                ));
            }
            lvalue = op.apply(lvalue, rvalue);
        }
    }

    fn eval_defined(
        &mut self,
        lexer: &mut Lexer,
        code: &mut CodeCursor,
        ctx: &Rc<Source>,
        env: &Environment,
    ) -> Result<i64> {
        let mut sink = NullSink;
        let token = lexer.next(code, Some(ctx), &mut sink)?;
        if token == "(" {
            let name = lexer.next(code, Some(ctx), &mut sink)?;
            if name.kind() != TokenKind::Identifier {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    "expecting a macro name between the parentheses of 'defined'",
                    name.location(),
                ));
            }
            let value = i64::from(env.defined(name.text()));
            let close = lexer.next(code, Some(ctx), &mut sink)?;
            if close != ")" {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    "expecting a right parenthesis",
                    close.location(),
                ));
            }
            return Ok(value);
        }
        if token.kind() != TokenKind::Identifier {
            return Err(CompileError::new(
                ErrorKind::Lex,
                "expecting a macro name following 'defined'",
                token.location(),
            ));
        }
        Ok(i64::from(env.defined(token.text())))
    }
}

/// Precedence level looser than every operator.
const TOP_PRECEDENCE: u32 = 100;

/// Binary operators of the conditional expression evaluator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operator {
    Mul,
    Div,
    Mod,
    Add,
    Sub,
    Shl,
    Shr,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    BitAnd,
    BitXor,
    BitOr,
    LogAnd,
    LogOr,
}

impl Operator {
    fn from_text(text: &str) -> Option<Self> {
        Some(match text {
            "*" => Operator::Mul,
            "/" => Operator::Div,
            "%" => Operator::Mod,
            "+" => Operator::Add,
            "-" => Operator::Sub,
            "<<" => Operator::Shl,
            ">>" => Operator::Shr,
            "<" => Operator::Lt,
            "<=" => Operator::Le,
            ">" => Operator::Gt,
            ">=" => Operator::Ge,
            "==" => Operator::Eq,
            "!=" => Operator::Ne,
            "&" => Operator::BitAnd,
            "^" => Operator::BitXor,
            "|" => Operator::BitOr,
            "&&" => Operator::LogAnd,
            "||" => Operator::LogOr,
            _ => return None,
        })
    }

    fn precedence(self) -> u32 {
        match self {
            Operator::Mul | Operator::Div | Operator::Mod => 1,
            Operator::Add | Operator::Sub => 2,
            Operator::Shl | Operator::Shr => 3,
            Operator::Lt | Operator::Le | Operator::Gt | Operator::Ge => 4,
            Operator::Eq | Operator::Ne => 5,
            Operator::BitAnd => 6,
            Operator::BitXor => 7,
            Operator::BitOr => 8,
            Operator::LogAnd => 9,
            Operator::LogOr => 10,
        }
    }

    fn apply(self, lhs: i64, rhs: i64) -> i64 {
        match self {
            Operator::Mul => lhs.wrapping_mul(rhs),
            Operator::Div => lhs.wrapping_div(rhs),
            Operator::Mod => lhs.wrapping_rem(rhs),
            Operator::Add => lhs.wrapping_add(rhs),
            Operator::Sub => lhs.wrapping_sub(rhs),
            Operator::Shl => lhs.wrapping_shl(rhs as u32 & 63),
            Operator::Shr => lhs.wrapping_shr(rhs as u32 & 63),
            Operator::Lt => i64::from(lhs < rhs),
            Operator::Le => i64::from(lhs <= rhs),
            Operator::Gt => i64::from(lhs > rhs),
            Operator::Ge => i64::from(lhs >= rhs),
            Operator::Eq => i64::from(lhs == rhs),
            Operator::Ne => i64::from(lhs != rhs),
            Operator::BitAnd => lhs & rhs,
            Operator::BitXor => lhs ^ rhs,
            Operator::BitOr => lhs | rhs,
            Operator::LogAnd => i64::from(lhs != 0 && rhs != 0),
            Operator::LogOr => i64::from(lhs != 0 || rhs != 0),
        }
    }
}

/// Skips spaces and tabs.
fn skip_blanks(code: &mut CodeCursor) {
    while matches!(code.current(), b' ' | b'\t') {
        code.advance();
    }
}

fn starts_with(code: &CodeCursor, needle: &[u8]) -> bool {
    needle
        .iter()
        .enumerate()
        .all(|(offset, &byte)| code.peek(offset) == byte)
}

fn location_of(code: &CodeCursor, ctx: &Rc<Source>) -> Location {
    Location::new(ctx.path(), code.line(), code.col())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn eval(condition: &str) -> Result<i64> {
        let mut env = Environment::new();
        eval_with_env(condition, &mut env)
    }

    fn eval_with_env(condition: &str, env: &mut Environment) -> Result<i64> {
        let source = Rc::new(Source::from_literal(condition));
        let mut code = CodeCursor::new(&source);
        let mut lexer = Lexer::new(true, LexingMode::Preproc);
        let mut preproc = Preprocessor::new();
        preproc.cond_eval(&mut lexer, &mut code, &source, env, TOP_PRECEDENCE)
    }

    #[test]
    fn arithmetic_precedence() {
        assert_eq!(eval("10 + 11 * 35 % 10 - 2").unwrap(), 13);
        assert_eq!(eval("10 * (5 * 5 + 10)").unwrap(), 350);
    }

    #[test]
    fn bitwise_operators() {
        assert_eq!(eval("2 << 2 | 7 >> 1 & (~ 120 & 7)").unwrap(), 11);
        assert_eq!(eval("1 ^ 3").unwrap(), 2);
    }

    #[test]
    fn logical_and_relational_operators() {
        assert_eq!(eval("(20 || 10 && 1) < 2").unwrap(), 1);
        assert_eq!(eval("50 + 7 >= 57").unwrap(), 1);
        assert_eq!(eval("50 + 8 > 57").unwrap(), 1);
        assert_eq!(eval("50 + 7 <= 57").unwrap(), 1);
        assert_eq!(eval("50 + 8 > 58").unwrap(), 0);
    }

    #[test]
    fn unknown_identifier_is_zero() {
        assert_eq!(eval("10 != NEVER_DEFINED").unwrap(), 1);
        assert_eq!(eval("NEVER_DEFINED").unwrap(), 0);
    }

    #[test]
    fn character_literals_evaluate_to_code_points() {
        assert_eq!(eval("'a'").unwrap(), 97);
        assert_eq!(eval("'\\n'").unwrap(), 10);
        assert_eq!(eval("'\\t' == 9").unwrap(), 1);
    }

    #[test]
    fn boolean_words() {
        assert_eq!(eval("true").unwrap(), 1);
        assert_eq!(eval("TRUE && 1").unwrap(), 1);
        assert_eq!(eval("false || FALSE").unwrap(), 0);
    }

    #[test]
    fn macros_expand_in_conditions() {
        let mut env = Environment::new();
        env.define_from_cli("a=10").unwrap();
        env.define_from_cli("b(c,d)=c*d").unwrap();
        env.define_from_cli("e=10").unwrap();
        assert_eq!(eval_with_env("a + b(5, 5) + e == 45", &mut env).unwrap(), 1);
        assert_eq!(eval_with_env("a * (b(5, 5) + e) == 350", &mut env).unwrap(), 1);
    }

    #[test]
    fn division_by_zero_is_reported() {
        let err = eval("10 / UNDEFINED").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivByZero);
        let err = eval("10 % UNDEFINED").unwrap_err();
        assert_eq!(err.kind, ErrorKind::DivByZero);
    }

    #[test]
    fn incomplete_condition_is_an_error() {
        assert!(eval("").is_err());
        assert!(eval("10 +").is_err());
    }

    #[test]
    fn defined_operator_both_forms() {
        let mut env = Environment::new();
        env.define_from_cli("TEST").unwrap();
        assert_eq!(eval_with_env("defined(TEST)", &mut env).unwrap(), 1);
        assert_eq!(eval_with_env("defined TEST", &mut env).unwrap(), 1);
        assert_eq!(eval_with_env("!defined(OTHER)", &mut env).unwrap(), 1);
        assert!(eval_with_env("defined()", &mut env).is_err());
        assert!(eval_with_env("defined", &mut env).is_err());
    }
}
