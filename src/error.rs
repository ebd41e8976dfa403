use thiserror::Error as ThisError;

use crate::object::Object;
use crate::token::{Token, TokenType};

/// The crate-wide error type. `Scan` and `Parse` are sentinels: by the time
/// one is returned, the offending diagnostic has already been printed at
/// the point of discovery (scanning and parsing keep going after an error
/// to surface as many as they can), so the variant only carries enough to
/// pick an exit code. `Return` is not a user-visible error at all — it is
/// how a function's `return` statement unwinds back to its call site.
#[derive(Debug, ThisError)]
pub enum Error {
    #[error("errors were reported during scanning")]
    Scan,
    #[error("errors were reported during parsing or resolution")]
    Parse,
    #[error("{message}\n[line {}]", token.line)]
    Runtime { token: Token, message: String },
    #[error("return is not a real error; something failed to intercept it at a call boundary")]
    Return { value: Object },
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Reports a scanner-level diagnostic: `[line N] Error: MESSAGE`.
pub fn scan_error(line: usize, message: &str) {
    report(line, "", message);
}

/// Reports a parser- or resolver-level diagnostic attached to a token:
/// `[line N] Error at 'LEXEME': MESSAGE`, or `Error at end` for EOF.
pub fn token_error(token: &Token, message: &str) {
    if token.token_type == TokenType::Eof {
        report(token.line, " at end", message);
    } else {
        report(token.line, &format!(" at '{}'", token.lexeme), message);
    }
}

fn report(line: usize, location: &str, message: &str) {
    log::debug!(target: "lox::diagnostics", "line {line}{location}: {message}");
    eprintln!("[line {line}] Error{location}: {message}");
}
