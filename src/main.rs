//! mmoc command-line interface
//!
//! The `mmoc` command drives the pipeline from a C source file to the
//! textual SSA IR document; assembling and linking the IR are jobs for
//! external tools.

use clap::Parser;
use mmoc::Driver;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "mmoc")]
#[command(version = mmoc::VERSION)]
#[command(about = "A small C-subset to SSA-IR compiler", long_about = None)]
struct Cli {
    /// Input file to compile
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output file (defaults to stdout)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Add an include directory
    #[arg(short = 'I', value_name = "DIR")]
    include: Vec<PathBuf>,

    /// Define a macro (NAME or NAME=value)
    #[arg(short = 'D', value_name = "MACRO")]
    define: Vec<String>,

    /// Preprocess only
    #[arg(short = 'E', long)]
    preprocess_only: bool,

    /// Emit the IR document to stdout even when -o is given
    #[arg(long)]
    emit_ir: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> miette::Result<()> {
    let cli = Cli::parse();

    let mut driver = Driver::new().verbose(cli.verbose);
    for dir in &cli.include {
        driver.add_include_dir(dir.clone());
    }
    for def in &cli.define {
        driver.add_define(def.clone());
    }

    if cli.preprocess_only {
        let text = driver
            .preprocess(&cli.input)
            .map_err(|e| miette::miette!("{}", e))?;
        print!("{}", text);
        return Ok(());
    }

    let ir = driver
        .compile(&cli.input)
        .map_err(|e| miette::miette!("{}", e))?;

    if cli.emit_ir {
        print!("{}", ir);
    }

    match &cli.output {
        Some(path) => {
            fs::write(path, &ir)
                .map_err(|e| miette::miette!("cannot write {}: {}", path.display(), e))?;
        }
        None if !cli.emit_ir => print!("{}", ir),
        None => {}
    }

    Ok(())
}
