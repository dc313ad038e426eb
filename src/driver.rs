//! Compilation driver
//!
//! Orchestrates the pipeline: preprocess, parse and build the AST, run the
//! semantic checker, generate IR. Each stage owns its output and hands it
//! to the next by move; a failure at any stage aborts the compilation with
//! a single message.

use std::path::{Path, PathBuf};

use crate::ast::TranslationUnit;
use crate::ast_builder::{build_translation_unit, BuildError};
use crate::ir::{generate_ir, IrError};
use crate::parser::{ParseError, Parser};
use crate::preprocessor::{PreprocessError, Preprocessor};
use crate::typeck::TypeChecker;
use thiserror::Error;

/// Any failure of the compilation pipeline.
#[derive(Error, Debug)]
pub enum CompileError {
    #[error(transparent)]
    Preprocess(#[from] PreprocessError),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Build(#[from] BuildError),

    #[error(transparent)]
    Ir(#[from] IrError),
}

/// The compiler driver.
pub struct Driver {
    include_dirs: Vec<PathBuf>,
    defines: Vec<String>,
    verbose: bool,
}

impl Driver {
    pub fn new() -> Self {
        Self {
            include_dirs: Vec::new(),
            defines: Vec::new(),
            verbose: false,
        }
    }

    pub fn verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    pub fn add_include_dir(&mut self, dir: impl Into<PathBuf>) {
        self.include_dirs.push(dir.into());
    }

    pub fn add_define(&mut self, spec: impl Into<String>) {
        self.defines.push(spec.into());
    }

    /// Preprocess the translation unit rooted at `input`.
    pub fn preprocess(&self, input: &Path) -> Result<String, CompileError> {
        self.log(&format!("preprocessing {}", input.display()));
        let mut pp = Preprocessor::new();
        for dir in &self.include_dirs {
            pp.add_include_dir(dir.clone());
        }
        for def in &self.defines {
            pp.define_macro_spec(def);
        }
        Ok(pp.preprocess(input)?)
    }

    /// Parse preprocessed text and build the AST.
    pub fn parse_and_build(&self, text: &str) -> Result<TranslationUnit, CompileError> {
        self.log("parsing");
        let mut parser = Parser::new(text);
        let tree = parser.parse_translation_unit();
        if let Some(error) = parser.errors().first() {
            return Err(error.clone().into());
        }

        let tu = build_translation_unit(&tree)?;

        // The semantic checker has no user-visible effect on compilation;
        // its findings are surfaced in verbose mode only.
        let diagnostics = TypeChecker::new().check(&tu);
        for diag in &diagnostics {
            self.log(&format!("sema: {}", diag));
        }

        Ok(tu)
    }

    /// Lower the AST to the textual IR document.
    pub fn generate_ir(&self, tu: &TranslationUnit) -> Result<String, CompileError> {
        self.log("generating IR");
        Ok(generate_ir(tu)?)
    }

    /// The whole pipeline: source file in, IR text out.
    pub fn compile(&self, input: &Path) -> Result<String, CompileError> {
        let text = self.preprocess(input)?;
        let tu = self.parse_and_build(&text)?;
        self.generate_ir(&tu)
    }

    /// Compile source text directly (no include-relative resolution).
    pub fn compile_str(&self, source: &str) -> Result<String, CompileError> {
        let mut pp = Preprocessor::new();
        for dir in &self.include_dirs {
            pp.add_include_dir(dir.clone());
        }
        for def in &self.defines {
            pp.define_macro_spec(def);
        }
        let text = pp.preprocess_str(source)?;
        let tu = self.parse_and_build(&text)?;
        self.generate_ir(&tu)
    }

    fn log(&self, message: &str) {
        if self.verbose {
            eprintln!("[driver] {}", message);
        }
    }
}

impl Default for Driver {
    fn default() -> Self {
        Self::new()
    }
}
