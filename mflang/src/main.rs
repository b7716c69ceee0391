//! MF CLI

use clap::{Parser, Subcommand};
use mflang::interp::{ListObject, Value};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "mf", version, about = "MF - a typed scripting language with async intents")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Type check and run an MF script
    Run {
        /// Source file to run
        file: PathBuf,
        /// Report type errors but keep executing
        #[arg(long)]
        permissive: bool,
        /// Arguments exposed to the script as ARGS
        #[arg(trailing_var_arg = true)]
        args: Vec<String>,
    },
    /// Type check an MF source file
    Check {
        /// Source file to check
        file: PathBuf,
    },
    /// Parse and dump AST (debug)
    Parse {
        /// Source file to parse
        file: PathBuf,
    },
    /// Tokenize and dump tokens (debug)
    Tokens {
        /// Source file to tokenize
        file: PathBuf,
    },
    /// Start an interactive session
    Repl,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Command::Run {
            file,
            permissive,
            args,
        } => run_file(&file, permissive, &args),
        Command::Check { file } => check_file(&file),
        Command::Parse { file } => parse_file(&file),
        Command::Tokens { file } => tokenize_file(&file),
        Command::Repl => run_repl(),
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run_file(
    path: &Path,
    permissive: bool,
    script_args: &[String],
) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let tokens = match mflang::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            mflang::error::report_error(&filename, &source, &e);
            return Err("lexing failed".into());
        }
    };
    let program = match mflang::parser::parse(tokens) {
        Ok(program) => program,
        Err(e) => {
            mflang::error::report_error(&filename, &source, &e);
            return Err("parsing failed".into());
        }
    };

    // static check before execution
    let base_dir = path.parent().unwrap_or(Path::new("."));
    let mut checker = mflang::types::TypeChecker::with_base_dir(base_dir);
    checker.check(&program);
    let diagnostics = checker.take_errors();
    if !diagnostics.is_empty() {
        for diagnostic in &diagnostics {
            eprintln!("TypeError: {diagnostic}");
        }
        if !permissive {
            return Err("type checking failed".into());
        }
        eprintln!("continuing despite type checker errors");
    }

    let mut interpreter = mflang::interp::Interpreter::new();
    interpreter.permissive = permissive;

    let args_list: Vec<Value> = script_args.iter().cloned().map(Value::string).collect();
    interpreter.globals.lock().define_untyped(
        "ARGS",
        Value::List(Arc::new(ListObject::with_items("string", args_list))),
    );

    // core modules load into globals before user code
    let core_dir = std::env::current_dir()?.join("core");
    interpreter.load_core_modules(&core_dir);

    interpreter.set_file(path, &source);
    interpreter
        .interpret(&program)
        .map_err(|e| format!("{e}"))?;
    Ok(())
}

fn check_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let diagnostics = mflang::types::check(&source);
    if diagnostics.is_empty() {
        println!("✓ {filename} type checks successfully");
        Ok(())
    } else {
        for diagnostic in &diagnostics {
            match diagnostic.span {
                Some(span) => {
                    let (line, column) = span.line_col(&source);
                    eprintln!("TypeError at {line}:{column}: {diagnostic}");
                }
                None => eprintln!("TypeError: {diagnostic}"),
            }
        }
        Err(format!("{} type error(s)", diagnostics.len()).into())
    }
}

fn parse_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;
    let filename = path.display().to_string();

    let tokens = match mflang::lexer::tokenize(&source) {
        Ok(tokens) => tokens,
        Err(e) => {
            mflang::error::report_error(&filename, &source, &e);
            return Err("lexing failed".into());
        }
    };
    let program = match mflang::parser::parse(tokens) {
        Ok(program) => program,
        Err(e) => {
            mflang::error::report_error(&filename, &source, &e);
            return Err("parsing failed".into());
        }
    };

    println!("{}", serde_json::to_string_pretty(&program)?);
    Ok(())
}

fn tokenize_file(path: &Path) -> Result<(), Box<dyn std::error::Error>> {
    let source = std::fs::read_to_string(path)?;

    let tokens = mflang::lexer::tokenize(&source)?;
    for (token, span) in &tokens {
        println!("{token:?} @ {}..{}", span.start, span.end);
    }

    Ok(())
}

fn run_repl() -> Result<(), Box<dyn std::error::Error>> {
    let mut repl = mflang::repl::Repl::new()?;
    repl.run()?;
    Ok(())
}
