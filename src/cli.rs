//! Command-line surface of the IDL compiler.
//!
//! Argument parsing is built on [`clap`] with derive macros. The parsed
//! arguments are converted into an [`Environment`] which is the only form
//! in which the rest of the compiler sees them.
//!
//! Extension toggles come in pairs (`--pointer_type` / `--no-pointer_type`);
//! the `--no-…` form wins when both are given, and `--strict` switches every
//! extension off regardless.

use std::path::PathBuf;

use clap::{ArgAction, Parser};
use sdvidl_front::Environment;

/// OMG IDL 4.2 compiler for the SDV vehicle-signal middleware.
#[derive(Debug, Parser)]
#[command(name = "sdvidlc", version, about)]
pub struct Cli {
    /// Add a directory to the include search path (repeatable).
    #[arg(short = 'I', value_name = "DIR", action = ArgAction::Append)]
    pub include_dir: Vec<PathBuf>,

    /// Set the output directory.
    #[arg(short = 'O', value_name = "DIR")]
    pub out_dir: Option<PathBuf>,

    /// Set a macro definition: name, name=value or name(a,b)=value
    /// (repeatable).
    #[arg(short = 'D', value_name = "MACRO", action = ArgAction::Append)]
    pub define: Vec<String>,

    /// Use the calculated value for const declarations instead of the
    /// defined expression.
    #[arg(long)]
    pub resolve_const: bool,

    /// Do not create any proxy and stub code (interface definitions only).
    #[arg(long = "no_ps")]
    pub no_ps: bool,

    /// Proxy and stub library target name in the generated CMake file.
    #[arg(long = "ps_lib_name", value_name = "NAME", default_value = "proxystub")]
    pub ps_lib_name: String,

    /// Strictly maintain OMG-IDL conformance; disables all extensions.
    #[arg(long)]
    pub strict: bool,

    /// Enable the 'interface_t', 'interface_id' and 'null' type extension.
    #[arg(long = "interface_type", overrides_with = "no_interface_type")]
    pub interface_type: bool,
    /// Disable the interface type extension.
    #[arg(long = "no-interface_type")]
    pub no_interface_type: bool,

    /// Enable the 'exception_id' type extension.
    #[arg(long = "exception_type", overrides_with = "no_exception_type")]
    pub exception_type: bool,
    /// Disable the exception type extension.
    #[arg(long = "no-exception_type")]
    pub no_exception_type: bool,

    /// Enable the 'pointer' type extension.
    #[arg(long = "pointer_type", overrides_with = "no_pointer_type")]
    pub pointer_type: bool,
    /// Disable the pointer type extension.
    #[arg(long = "no-pointer_type")]
    pub no_pointer_type: bool,

    /// Enable the UTF-8, UTF-16 and UTF-32 character and string extensions.
    #[arg(long = "unicode_char", overrides_with = "no_unicode_char")]
    pub unicode_char: bool,
    /// Disable the Unicode extensions.
    #[arg(long = "no-unicode_char")]
    pub no_unicode_char: bool,

    /// Enable the case-sensitive name restriction extension.
    #[arg(long = "case_sensitive", overrides_with = "no_case_sensitive")]
    pub case_sensitive: bool,
    /// Disable the case-sensitive name restriction extension.
    #[arg(long = "no-case_sensitive")]
    pub no_case_sensitive: bool,

    /// Enable context dependent names in declarations.
    #[arg(long = "context_names", overrides_with = "no_context_names")]
    pub context_names: bool,
    /// Disable context dependent names.
    #[arg(long = "no-context_names")]
    pub no_context_names: bool,

    /// Enable the multi-dimensional array extension.
    #[arg(long = "multi_dimensional_array", overrides_with = "no_multi_dimensional_array")]
    pub multi_dimensional_array: bool,
    /// Disable the multi-dimensional array extension.
    #[arg(long = "no-multi_dimensional_array")]
    pub no_multi_dimensional_array: bool,

    /// Do not show any information on stdout. Not compatible with
    /// --verbose.
    #[arg(short, long, conflicts_with = "verbose")]
    pub silent: bool,

    /// Provide verbose information. Not compatible with --silent.
    #[arg(short, long)]
    pub verbose: bool,

    /// IDL files to compile.
    #[arg(value_name = "FILE", required = true)]
    pub files: Vec<PathBuf>,
}

impl Cli {
    /// Builds the compiler environment from the parsed arguments.
    pub fn to_environment(&self) -> Result<Environment, sdvidl_base::CompileError> {
        let mut env = Environment::new();

        for dir in &self.include_dir {
            env.add_include_dir(dir);
        }
        if let Some(dir) = &self.out_dir {
            env.set_output_dir(dir);
        }
        for file in &self.files {
            env.add_file(file);
        }
        if let Ok(compiler) = std::env::current_exe() {
            env.set_compiler_path(compiler);
        }

        env.set_resolve_const(self.resolve_const);
        env.set_no_proxy_stub(self.no_ps);
        env.set_proxy_stub_target(&self.ps_lib_name);

        // Extensions default to enabled; only an explicit --no-… form (not
        // overridden by a later positive form) turns one off.
        for (name, disabled) in [
            ("interface_type", self.no_interface_type),
            ("exception_type", self.no_exception_type),
            ("pointer_type", self.no_pointer_type),
            ("unicode_char", self.no_unicode_char),
            ("case_sensitive", self.no_case_sensitive),
            ("context_names", self.no_context_names),
            ("multi_dimensional_array", self.no_multi_dimensional_array),
        ] {
            env.set_extension(name, !disabled);
        }
        if self.strict {
            env.set_strict();
        }

        // Command-line macros go through the same definition path as
        // `#define`.
        for definition in &self.define {
            env.define_from_cli(definition)?;
        }

        Ok(env)
    }

    /// The log level selected by the verbosity flags.
    pub fn log_level(&self) -> log::LevelFilter {
        if self.silent {
            log::LevelFilter::Off
        } else if self.verbose {
            log::LevelFilter::Debug
        } else {
            log::LevelFilter::Warn
        }
    }
}
