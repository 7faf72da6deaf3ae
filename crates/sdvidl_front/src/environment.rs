//! Compiler environment: include directories, macros, extensions, options.
//!
//! One [`Environment`] exists per compilation. It owns the include search
//! path, the macro map, the extension flags and the option table exposed to
//! the code-generation layer. Entities reference it through this interface
//! only, never through the command-line layer that populated it.
//!
//! Extension flags default to enabled; `strict` mode turns them all off.

use std::cell::RefCell;
use std::path::{Path, PathBuf};

use sdvidl_base::{CompileError, ErrorKind, Location, Result};

use crate::codepos::CodeCursor;
use crate::lexer::{Lexer, LexingMode, NullSink};
use crate::macros::{MacroDef, MacroMap, UsedMacroSet};
use crate::token::{Token, TokenKind};

/// Option name: directory of the compiler executable.
pub const OPTION_DEV_ENV_DIR: &str = "dev_env_dir";
/// Option name: output directory.
pub const OPTION_OUT_DIR: &str = "out_dir";
/// Option name: name of the processed file.
pub const OPTION_FILENAME: &str = "filename";
/// Option name: path of the processed file.
pub const OPTION_FILE_PATH: &str = "file_path";
/// Option name: code generation parameter set.
pub const OPTION_CODE_GEN: &str = "code_gen";

/// Parser environment management.
#[derive(Debug, Clone)]
pub struct Environment {
    include_dirs: Vec<PathBuf>,
    macros: MacroMap,
    files: Vec<PathBuf>,
    file_index: usize,
    output_dir: PathBuf,
    compiler_path: PathBuf,
    resolve_const: bool,
    no_proxy_stub: bool,
    proxy_stub_target: String,
    ext_interface_type: bool,
    ext_exception_type: bool,
    ext_pointer_type: bool,
    ext_unicode: bool,
    ext_case_sensitive: bool,
    ext_context_names: bool,
    ext_multi_dim_array: bool,
    /// Macros used by the current top-level expansion; prevents a macro
    /// from re-entering itself through its own expansion result.
    used_in_expansion: RefCell<UsedMacroSet>,
}

impl Default for Environment {
    fn default() -> Self {
        Self::new()
    }
}

impl Environment {
    /// Creates an environment with all extensions enabled and an empty
    /// include path.
    pub fn new() -> Self {
        Self {
            include_dirs: Vec::new(),
            macros: MacroMap::new(),
            files: Vec::new(),
            file_index: 0,
            output_dir: PathBuf::new(),
            compiler_path: PathBuf::new(),
            resolve_const: false,
            no_proxy_stub: false,
            proxy_stub_target: "proxystub".to_owned(),
            ext_interface_type: true,
            ext_exception_type: true,
            ext_pointer_type: true,
            ext_unicode: true,
            ext_case_sensitive: true,
            ext_context_names: true,
            ext_multi_dim_array: true,
            used_in_expansion: RefCell::new(UsedMacroSet::new()),
        }
    }

    // ---- include directories -------------------------------------------

    /// Appends a directory to the include search path.
    pub fn add_include_dir(&mut self, dir: impl AsRef<Path>) {
        self.include_dirs.push(dir.as_ref().to_path_buf());
    }

    /// The include search path, in search order.
    pub fn include_dirs(&self) -> &[PathBuf] {
        &self.include_dirs
    }

    // ---- input files ---------------------------------------------------

    /// Appends a positional IDL file.
    pub fn add_file(&mut self, path: impl AsRef<Path>) {
        self.files.push(path.as_ref().to_path_buf());
    }

    /// The next file to process, or `None` when all are done.
    pub fn next_file(&mut self) -> Option<PathBuf> {
        let file = self.files.get(self.file_index).cloned();
        if file.is_some() {
            self.file_index += 1;
        }
        file
    }

    /// The output directory (empty when not set).
    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Sets the output directory.
    pub fn set_output_dir(&mut self, dir: impl AsRef<Path>) {
        self.output_dir = dir.as_ref().to_path_buf();
    }

    /// Records the path of the compiler executable (for `dev_env_dir`).
    pub fn set_compiler_path(&mut self, path: impl AsRef<Path>) {
        self.compiler_path = path.as_ref().to_path_buf();
    }

    // ---- macro management ----------------------------------------------

    /// Adds a macro definition given in the command-line form `name`,
    /// `name=value` or `name(p1,…)=value`.
    pub fn define_from_cli(&mut self, definition: &str) -> Result<()> {
        let mut cursor = CodeCursor::from_text(definition);
        let mut lexer = Lexer::new(self.ext_case_sensitive, LexingMode::Idl);
        let mut sink = NullSink;

        let name = lexer.next(&mut cursor, None, &mut sink)?;
        if name.kind() != TokenKind::Identifier {
            return Err(CompileError::bare(
                ErrorKind::MacroArity,
                format!("invalid macro definition '{definition}': name missing"),
            ));
        }

        let mut params = None;
        if cursor.current() == b'(' {
            params = Some(parse_parameter_list(&mut lexer, &mut cursor)?);
        }

        let assign = lexer.next(&mut cursor, None, &mut sink)?;
        let value = if assign.is_valid() {
            if assign != "=" {
                return Err(CompileError::bare(
                    ErrorKind::MacroArity,
                    format!("invalid macro definition '{definition}'"),
                ));
            }
            cursor.location(TokenKind::None).text().to_owned()
        } else {
            String::new()
        };

        let name = name.text().to_owned();
        self.add_macro(
            Location::default(),
            MacroDef::new(&name, params, &value),
        )
    }

    /// Adds a macro. Redefinition with identical content is a no-op;
    /// redefinition with different content fails.
    pub fn add_macro(&mut self, location: Location, macro_def: MacroDef) -> Result<()> {
        if let Some(existing) = self.macros.get(macro_def.name()) {
            if *existing != macro_def {
                return Err(CompileError::new(
                    ErrorKind::Redefinition,
                    format!("redefinition of macro '{}' with different content", macro_def.name()),
                    location,
                ));
            }
            return Ok(());
        }
        self.macros.insert(macro_def.name().to_owned(), macro_def);
        Ok(())
    }

    /// Removes a macro; a no-op when the name is not defined.
    pub fn remove_definition(&mut self, name: &str) {
        self.macros.remove(name);
    }

    /// Returns `true` when the macro exists.
    pub fn defined(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }

    /// Looks up a macro definition.
    pub fn get_macro(&self, name: &str) -> Option<&MacroDef> {
        self.macros.get(name)
    }

    /// Tests whether `name` denotes a macro use at the cursor and, if so,
    /// expands it and prepends the result to the cursor.
    ///
    /// Returns `false` when the name is no macro, when a function-like
    /// macro is not followed by parentheses (the bare name is not a macro
    /// use), or when the macro is already active in `used` — the guard
    /// against circular expansion. `in_expansion` states whether the
    /// identifier itself came out of a previous expansion.
    ///
    /// When `used` is passed in empty, the environment's internal top-level
    /// expansion set is used instead; it is cleared whenever a fresh
    /// top-level expansion starts.
    pub fn test_and_expand(
        &self,
        name: &str,
        cursor: &mut CodeCursor,
        in_expansion: bool,
        used: &mut UsedMacroSet,
    ) -> Result<bool> {
        if name.is_empty() {
            return Ok(false);
        }
        if used.is_empty() {
            let mut internal = self.used_in_expansion.borrow_mut();
            self.test_and_expand_impl(name, cursor, in_expansion, &mut internal, false)
        } else {
            self.test_and_expand_impl(name, cursor, in_expansion, used, true)
        }
    }

    /// [`Environment::test_and_expand`] for the top-level token pump, using
    /// the environment's internal used-macro set.
    pub fn test_and_expand_current(
        &self,
        name: &str,
        cursor: &mut CodeCursor,
        in_expansion: bool,
    ) -> Result<bool> {
        let mut empty = UsedMacroSet::new();
        self.test_and_expand(name, cursor, in_expansion, &mut empty)
    }

    fn test_and_expand_impl(
        &self,
        name: &str,
        cursor: &mut CodeCursor,
        in_expansion: bool,
        used: &mut UsedMacroSet,
        seeded: bool,
    ) -> Result<bool> {
        // An identifier produced by an expansion may not re-enter a macro
        // that is still active; a fresh top-level use starts a new set.
        if in_expansion || seeded {
            if used.contains(name) {
                return Ok(false);
            }
        } else {
            used.clear();
        }

        let Some(macro_def) = self.macros.get(name) else {
            return Ok(false);
        };

        let call = cursor.location(TokenKind::None);
        let mut args: Vec<String> = Vec::new();
        if macro_def.expect_parameters() {
            // Peek for the opening parenthesis; a bare name is no macro use.
            let mut probe = cursor.clone();
            let mut lexer = Lexer::new(self.ext_case_sensitive, LexingMode::Idl);
            let mut sink = NullSink;
            if lexer.next(&mut probe, None, &mut sink)? != "(" {
                return Ok(false);
            }
            lexer.next(cursor, None, &mut sink)?;
            args = parse_macro_arguments(cursor, macro_def.params().is_empty())?;
        }

        used.insert(name.to_owned());
        let expansion = macro_def.expand(self, &call, &args, used)?;
        cursor.prepend(&expansion);
        Ok(true)
    }

    // ---- options --------------------------------------------------------

    /// Resolve const initializers eagerly instead of exporting the
    /// expression.
    pub fn resolve_const(&self) -> bool {
        self.resolve_const
    }

    /// Sets eager const resolution.
    pub fn set_resolve_const(&mut self, value: bool) {
        self.resolve_const = value;
    }

    /// Suppress generation of proxy/stub code.
    pub fn no_proxy_stub(&self) -> bool {
        self.no_proxy_stub
    }

    /// Sets proxy/stub suppression.
    pub fn set_no_proxy_stub(&mut self, value: bool) {
        self.no_proxy_stub = value;
    }

    /// Library target name for the generated CMake file.
    pub fn proxy_stub_target(&self) -> &str {
        &self.proxy_stub_target
    }

    /// Sets the proxy/stub CMake target name.
    pub fn set_proxy_stub_target(&mut self, name: impl Into<String>) {
        self.proxy_stub_target = name.into();
    }

    /// Number of values the named option provides; 0 for unknown options.
    pub fn get_option_count(&self, option: &str) -> u32 {
        match option {
            OPTION_DEV_ENV_DIR | OPTION_OUT_DIR | OPTION_FILENAME | OPTION_FILE_PATH => 1,
            OPTION_CODE_GEN => 10,
            _ => 0,
        }
    }

    /// The value of the named option at `index`; empty for unknown options
    /// or indices out of range.
    pub fn get_option(&self, option: &str, index: u32) -> String {
        if index >= self.get_option_count(option) {
            return String::new();
        }
        match option {
            OPTION_DEV_ENV_DIR => self
                .compiler_path
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default(),
            _ => String::new(),
        }
    }

    // ---- extensions ------------------------------------------------------

    /// `interface_t`, `interface_id` and `null` keyword support.
    pub fn interface_type_extension(&self) -> bool {
        self.ext_interface_type
    }

    /// `exception_id` keyword support.
    pub fn exception_type_extension(&self) -> bool {
        self.ext_exception_type
    }

    /// `pointer` keyword support.
    pub fn pointer_type_extension(&self) -> bool {
        self.ext_pointer_type
    }

    /// UTF-8/16/32 character and string type support.
    pub fn unicode_extension(&self) -> bool {
        self.ext_unicode
    }

    /// Case-sensitive name extension; when off, identifiers colliding with
    /// keywords by case only are rejected.
    pub fn case_sensitive_extension(&self) -> bool {
        self.ext_case_sensitive
    }

    /// Context-dependent name support.
    pub fn context_names_extension(&self) -> bool {
        self.ext_context_names
    }

    /// Multi-dimensional array support.
    pub fn multi_dim_array_extension(&self) -> bool {
        self.ext_multi_dim_array
    }

    /// Sets a single extension flag by logical name. Unknown names are
    /// ignored.
    pub fn set_extension(&mut self, name: &str, enabled: bool) {
        match name {
            "interface_type" => self.ext_interface_type = enabled,
            "exception_type" => self.ext_exception_type = enabled,
            "pointer_type" => self.ext_pointer_type = enabled,
            "unicode_char" => self.ext_unicode = enabled,
            "case_sensitive" => self.ext_case_sensitive = enabled,
            "context_names" => self.ext_context_names = enabled,
            "multi_dimensional_array" => self.ext_multi_dim_array = enabled,
            _ => {}
        }
    }

    /// Strict OMG-IDL conformance: disables every extension.
    pub fn set_strict(&mut self) {
        self.ext_interface_type = false;
        self.ext_exception_type = false;
        self.ext_pointer_type = false;
        self.ext_unicode = false;
        self.ext_case_sensitive = false;
        self.ext_context_names = false;
        self.ext_multi_dim_array = false;
    }

    /// The extension keywords active under the current flags.
    pub fn extension_keywords(&self) -> Vec<&'static str> {
        let mut keywords = Vec::new();
        if self.ext_unicode {
            keywords.extend(["char16", "char32", "u8string", "u16string", "u32string"]);
        }
        if self.ext_interface_type {
            keywords.extend(["interface_t", "interface_id", "null"]);
        }
        if self.ext_exception_type {
            keywords.push("exception_id");
        }
        if self.ext_pointer_type {
            keywords.push("pointer");
        }
        keywords
    }
}

/// Parses `(p1, p2, …)` from a `-D` style definition; duplicates fail.
fn parse_parameter_list(lexer: &mut Lexer, cursor: &mut CodeCursor) -> Result<Vec<String>> {
    let mut sink = NullSink;
    let open = lexer.next(cursor, None, &mut sink)?;
    if open != "(" {
        return Err(CompileError::bare(
            ErrorKind::MacroArity,
            "expecting '(' in macro definition",
        ));
    }

    let mut params = Vec::new();
    let mut first = true;
    loop {
        let token = lexer.next(cursor, None, &mut sink)?;
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

        let token = lexer.next(cursor, None, &mut sink)?;
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

/// Parses the arguments of a macro call, the opening parenthesis already
/// consumed. Commas split arguments at parenthesis depth 0 only; each
/// argument is trimmed.
fn parse_macro_arguments(cursor: &mut CodeCursor, zero_params: bool) -> Result<Vec<String>> {
    let mut args = Vec::new();
    let mut current = String::new();
    let mut depth = 0usize;
    let mut location = cursor.location(TokenKind::None);

    loop {
        match cursor.current() {
            b'(' => {
                depth += 1;
                current.push('(');
            }
            b')' => {
                if depth > 0 {
                    depth -= 1;
                    current.push(')');
                } else {
                    // An empty argument list is only valid for a macro with
                    // zero parameters.
                    let arg = current.trim();
                    if arg.is_empty() && args.is_empty() && zero_params {
                        cursor.advance();
                        return Ok(args);
                    }
                    push_argument(&mut args, &current, &location)?;
                    cursor.advance();
                    return Ok(args);
                }
            }
            b',' => {
                if depth > 0 {
                    current.push(',');
                } else {
                    push_argument(&mut args, &current, &location)?;
                    current.clear();
                    location = cursor.location(TokenKind::None);
                }
            }
            0 => {
                return Err(CompileError::new(
                    ErrorKind::Lex,
                    "unexpected end of file while parsing macro arguments",
                    location.location(),
                ));
            }
            byte => current.push(byte as char),
        }
        cursor.advance();
    }
}

fn push_argument(args: &mut Vec<String>, raw: &str, location: &Token) -> Result<()> {
    let arg = raw.trim();
    if arg.is_empty() {
        return Err(CompileError::new(
            ErrorKind::MacroArity,
            "missing parameter for macro",
            location.location(),
        ));
    }
    args.push(arg.to_owned());
    Ok(())
}
