//! REPL (Read-Eval-Print Loop) for MF

use crate::interp::Interpreter;
use crate::lexer::tokenize;
use crate::parser::parse;
use rustyline::error::ReadlineError;
use rustyline::{DefaultEditor, Result as RlResult};
use std::path::PathBuf;

const PROMPT: &str = "> ";
const HISTORY_FILE: &str = ".mf_history";

/// REPL state
pub struct Repl {
    editor: DefaultEditor,
    interpreter: Interpreter,
    history_path: Option<PathBuf>,
}

impl Repl {
    /// Create a new REPL
    pub fn new() -> RlResult<Self> {
        let editor = DefaultEditor::new()?;
        let interpreter = Interpreter::new();

        let history_path = home_dir().map(|home| home.join(HISTORY_FILE));

        let mut repl = Repl {
            editor,
            interpreter,
            history_path,
        };

        if let Some(path) = repl.history_path.clone() {
            let _ = repl.editor.load_history(&path);
        }

        Ok(repl)
    }

    /// Run the REPL
    pub fn run(&mut self) -> RlResult<()> {
        println!("MF REPL");
        println!("Type :help for help, :quit to exit.\n");

        loop {
            match self.editor.readline(PROMPT) {
                Ok(line) => {
                    let line = line.trim();

                    if line.is_empty() {
                        continue;
                    }

                    let _ = self.editor.add_history_entry(line);

                    if line.starts_with(':') {
                        if self.handle_command(line) {
                            break;
                        }
                        continue;
                    }

                    self.eval_input(line);
                }
                Err(ReadlineError::Interrupted) => {
                    println!("^C");
                    continue;
                }
                Err(ReadlineError::Eof) => break,
                Err(err) => {
                    eprintln!("readline error: {err}");
                    break;
                }
            }
        }

        if let Some(path) = &self.history_path {
            let _ = self.editor.save_history(path);
        }
        Ok(())
    }

    /// Handle a `:command`; returns true when the REPL should exit
    fn handle_command(&mut self, line: &str) -> bool {
        match line {
            ":quit" | ":q" | ":exit" => true,
            ":help" | ":h" => {
                println!(":help   show this help");
                println!(":quit   exit the REPL");
                println!();
                println!("Anything else is evaluated as MF code;");
                println!("expression results are printed.");
                false
            }
            other => {
                println!("unknown command '{other}' (try :help)");
                false
            }
        }
    }

    fn eval_input(&mut self, line: &str) {
        let tokens = match tokenize(line) {
            Ok(tokens) => tokens,
            Err(err) => {
                eprintln!("{err}");
                return;
            }
        };
        let program = match parse(tokens) {
            Ok(program) => program,
            Err(err) => {
                eprintln!("{err}");
                return;
            }
        };
        self.interpreter.set_source(line);
        self.interpreter.interpret_interactive(&program);
    }
}

fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME")
        .or_else(|| std::env::var_os("USERPROFILE"))
        .map(PathBuf::from)
}
