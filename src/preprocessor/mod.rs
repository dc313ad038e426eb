//! Textual preprocessor
//!
//! A line-oriented preprocessor over the root translation unit: file
//! inclusion, object- and function-like macro expansion, and the
//! `#if`-family conditional stack. The output is a single expanded string
//! that forms the logical translation unit handed to the parser.
//!
//! Directives are always parsed so conditional bookkeeping stays correct,
//! but their semantic effect (define/undef/include) is applied only in
//! active regions; the stack-structural directives are applied
//! unconditionally.

mod conditionals;
mod macros;

pub use conditionals::{eval_condition, ConditionalStack};
pub use macros::{parse_define, MacroDef, MacroTable};

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Preprocessor errors
#[derive(Error, Debug)]
pub enum PreprocessError {
    #[error("cannot read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("include file not found: {target}")]
    IncludeNotFound { target: String },

    #[error("malformed #include target: {target}")]
    InvalidInclude { target: String },

    #[error("#{keyword} without matching #if")]
    WithoutIf { keyword: &'static str },

    #[error("includes nested deeper than {limit} levels (cycle?)")]
    IncludeTooDeep { limit: usize },

    #[error("unbalanced #if: {depth} conditional(s) still open at end of input")]
    UnbalancedConditional { depth: usize },
}

/// Deepest allowed `#include` nesting; beyond this a cycle is assumed.
const MAX_INCLUDE_DEPTH: usize = 64;

/// The preprocessor for one translation unit.
pub struct Preprocessor {
    include_dirs: Vec<PathBuf>,
    macros: MacroTable,
    conditionals: ConditionalStack,
    include_depth: usize,
}

impl Preprocessor {
    pub fn new() -> Self {
        Self {
            include_dirs: Vec::new(),
            macros: MacroTable::new(),
            conditionals: ConditionalStack::new(),
            include_depth: 0,
        }
    }

    /// Add an include directory to the search path.
    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        self.include_dirs.push(dir.into());
    }

    /// Apply a command-line macro spec of the form `NAME` or `NAME=value`.
    pub fn define_macro_spec(&mut self, spec: &str) {
        let (name, body) = match spec.split_once('=') {
            Some((name, value)) => (name.trim(), value.trim()),
            None => (spec.trim(), "1"),
        };
        if name.is_empty() {
            return;
        }
        self.macros.define(MacroDef {
            name: name.to_string(),
            params: None,
            body: body.to_string(),
        });
    }

    /// Current depth of the conditional stack (zero outside `#if` regions).
    pub fn conditional_depth(&self) -> usize {
        self.conditionals.depth()
    }

    /// Preprocess the translation unit rooted at `root`.
    pub fn preprocess(&mut self, root: &Path) -> Result<String, PreprocessError> {
        let mut out = String::new();
        self.process_file(root, &mut out)?;
        self.check_balance()?;
        Ok(out)
    }

    /// Preprocess source text directly, resolving quoted includes against
    /// the working directory. Used by tests and by `-E` on piped input.
    pub fn preprocess_str(&mut self, source: &str) -> Result<String, PreprocessError> {
        let mut out = String::new();
        self.process_source(source, Path::new("."), &mut out)?;
        self.check_balance()?;
        Ok(out)
    }

    fn check_balance(&self) -> Result<(), PreprocessError> {
        let depth = self.conditionals.depth();
        if depth != 0 {
            return Err(PreprocessError::UnbalancedConditional { depth });
        }
        Ok(())
    }

    fn process_file(&mut self, path: &Path, out: &mut String) -> Result<(), PreprocessError> {
        let text = std::fs::read_to_string(path).map_err(|source| PreprocessError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();
        self.process_source(&text, &dir, out)
    }

    fn process_source(
        &mut self,
        source: &str,
        current_dir: &Path,
        out: &mut String,
    ) -> Result<(), PreprocessError> {
        for raw in source.split('\n') {
            // CRLF and LF both accepted
            let line = raw.strip_suffix('\r').unwrap_or(raw);

            if line.trim_start().starts_with('#') {
                self.handle_directive(line, current_dir, out)?;
            } else if self.conditionals.is_active() {
                out.push_str(&self.macros.expand_line(line));
                out.push('\n');
            }
        }
        Ok(())
    }

    fn handle_directive(
        &mut self,
        line: &str,
        current_dir: &Path,
        out: &mut String,
    ) -> Result<(), PreprocessError> {
        let rest = line.trim_start();
        let rest = rest[1..].trim_start(); // past '#'

        let keyword_end = rest
            .find(|c: char| !c.is_ascii_alphanumeric() && c != '_')
            .unwrap_or(rest.len());
        let keyword = &rest[..keyword_end];
        let arg = rest[keyword_end..].trim();

        let active = self.conditionals.is_active();

        match keyword {
            "include" if active => self.handle_include(arg, current_dir, out)?,
            "define" if active => {
                if let Some(def) = parse_define(arg) {
                    self.macros.define(def);
                }
            }
            "undef" if active => {
                if let Some(name) = arg.split_whitespace().next() {
                    self.macros.undefine(name);
                }
            }
            "include" | "define" | "undef" => {} // parsed but inert in inactive regions
            "ifdef" => {
                let name = arg.split_whitespace().next().unwrap_or("");
                self.conditionals.push_if(self.macros.is_defined(name));
            }
            "ifndef" => {
                let name = arg.split_whitespace().next().unwrap_or("");
                self.conditionals.push_if(!self.macros.is_defined(name));
            }
            "if" => {
                let cond = eval_condition(arg, &self.macros);
                self.conditionals.push_if(cond);
            }
            "elif" => {
                let cond = eval_condition(arg, &self.macros);
                if !self.conditionals.handle_elif(cond) {
                    return Err(PreprocessError::WithoutIf { keyword: "elif" });
                }
            }
            "else" => {
                if !self.conditionals.handle_else() {
                    return Err(PreprocessError::WithoutIf { keyword: "else" });
                }
            }
            "endif" => {
                if !self.conditionals.handle_endif() {
                    return Err(PreprocessError::WithoutIf { keyword: "endif" });
                }
            }
            // Recognised and discarded
            "pragma" | "line" | "error" | "warning" => {}
            _ => {}
        }
        Ok(())
    }

    fn handle_include(
        &mut self,
        arg: &str,
        current_dir: &Path,
        out: &mut String,
    ) -> Result<(), PreprocessError> {
        let (target, angled) = match parse_include_target(arg) {
            Some(parsed) => parsed,
            None => {
                // One macro-expansion pass before re-parsing the delimiters
                let expanded = self.macros.expand_line(arg);
                parse_include_target(expanded.trim()).ok_or_else(|| {
                    PreprocessError::InvalidInclude {
                        target: arg.to_string(),
                    }
                })?
            }
        };

        let path = self
            .resolve_include(&target, angled, current_dir)
            .ok_or(PreprocessError::IncludeNotFound { target })?;

        if self.include_depth >= MAX_INCLUDE_DEPTH {
            return Err(PreprocessError::IncludeTooDeep {
                limit: MAX_INCLUDE_DEPTH,
            });
        }
        self.include_depth += 1;
        let result = self.process_file(&path, out);
        self.include_depth -= 1;
        result
    }

    /// Resolve an include target to the first existing regular file.
    ///
    /// Quoted targets search the directory of the currently-processing file
    /// first, then the configured include directories, then the working
    /// directory; angled targets skip the current-file directory.
    fn resolve_include(&self, target: &str, angled: bool, current_dir: &Path) -> Option<PathBuf> {
        let mut candidates = Vec::new();
        if !angled {
            candidates.push(current_dir.join(target));
        }
        for dir in &self.include_dirs {
            candidates.push(dir.join(target));
        }
        candidates.push(PathBuf::from(target));

        candidates.into_iter().find(|p| p.is_file())
    }
}

impl Default for Preprocessor {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse `"target"` or `<target>`; `None` when neither delimiter matches.
fn parse_include_target(arg: &str) -> Option<(String, bool)> {
    if let Some(rest) = arg.strip_prefix('"') {
        let end = rest.find('"')?;
        Some((rest[..end].to_string(), false))
    } else if let Some(rest) = arg.strip_prefix('<') {
        let end = rest.find('>')?;
        Some((rest[..end].to_string(), true))
    } else {
        None
    }
}
