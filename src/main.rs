mod class;
mod environment;
mod error;
mod function;
mod interpreter;
mod object;
mod parser;
mod resolver;
mod scanner;
mod syntax;
mod token;

use std::env;
use std::fs;
use std::io::{self, BufRead, Write};
use std::process::ExitCode;

use error::Error;
use interpreter::Interpreter;
use parser::Parser;
use resolver::Resolver;
use scanner::Scanner;

struct Lox {
    interpreter: Interpreter,
    // Carried across `run` calls so that REPL lines never reuse an
    // `ExprId` the interpreter's side table already has an entry for.
    next_expr_id: syntax::ExprId,
}

impl Lox {
    fn new() -> Self {
        Lox {
            interpreter: Interpreter::new(),
            next_expr_id: 0,
        }
    }

    fn run_file(&mut self, path: &str) -> Result<(), Error> {
        let source = fs::read_to_string(path)?;
        self.run(&source)
    }

    fn run_prompt(&mut self) -> Result<(), Error> {
        let stdin = io::stdin();
        print!("> ");
        io::stdout().flush()?;

        for line in stdin.lock().lines() {
            let mut line = line?;
            // A bare expression is the common REPL case -- let a line stand
            // on its own without forcing the user to type a trailing `;`.
            if !line.trim_end().ends_with(';') {
                line.push(';');
            }
            // A bad line shouldn't poison the rest of the session: report it
            // and keep reading, instead of propagating the error out.
            if let Err(err) = self.run(&line) {
                if let Error::Runtime { .. } = err {
                    eprintln!("{err}");
                }
            }
            print!("> ");
            io::stdout().flush()?;
        }

        Ok(())
    }

    fn run(&mut self, source: &str) -> Result<(), Error> {
        log::trace!(target: "lox::pipeline", "scanning {} bytes", source.len());
        let mut scanner = Scanner::new(source.to_string());
        let tokens = scanner.scan_tokens().clone();

        if scanner.had_error {
            return Err(Error::Scan);
        }

        let mut parser = Parser::new(&tokens, self.next_expr_id);
        let statements = parser.parse();
        self.next_expr_id = parser.next_id();

        if parser.had_error {
            return Err(Error::Parse);
        }

        // Skip the interpreter on a syntax error -- code that doesn't parse
        // is never going to run, so there's no value in resolving it either.
        // The resolver pokes its side table directly into the interpreter
        // as it walks.
        log::trace!(target: "lox::pipeline", "resolving {} statements", statements.len());
        let mut resolver = Resolver::new(&mut self.interpreter);
        resolver.resolve_stmts(&statements);

        if resolver.had_error {
            return Err(Error::Parse);
        }

        log::trace!(target: "lox::pipeline", "interpreting");
        self.interpreter.interpret(&statements)
    }
}

fn main() -> ExitCode {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let mut lox = Lox::new();

    match args.as_slice() {
        [_, path] => match lox.run_file(path) {
            Ok(()) => ExitCode::SUCCESS,
            Err(Error::Runtime { .. }) => ExitCode::from(70),
            Err(Error::Scan) | Err(Error::Parse) => ExitCode::from(65),
            Err(Error::Return { .. }) => unreachable!("a return always unwinds at a call boundary"),
            Err(Error::Io(e)) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        [_] => match lox.run_prompt() {
            Ok(()) => ExitCode::SUCCESS,
            Err(e) => {
                eprintln!("{e}");
                ExitCode::FAILURE
            }
        },
        _ => {
            eprintln!("Usage: lox-rs [script]");
            ExitCode::from(64)
        }
    }
}
