//! Operator prompt capability.
//!
//! Host selection and destructive-action confirmation both read one line of
//! operator input. The capability is injected so the engine is testable and
//! scriptable without a controlling terminal.

use std::collections::VecDeque;
use std::io::{BufRead, Write};
use std::sync::Mutex;

pub trait OperatorPrompt: Send + Sync {
    /// Print `message` and read one line of operator input.
    fn ask(&self, message: &str) -> std::io::Result<String>;

    /// Yes/no confirmation; accepts `y` / `yes`, case-insensitive.
    fn confirm(&self, message: &str) -> std::io::Result<bool> {
        let answer = self.ask(message)?;
        let answer = answer.trim().to_lowercase();
        Ok(answer == "y" || answer == "yes")
    }
}

/// Reads from the controlling terminal's stdin.
#[derive(Debug, Default)]
pub struct TerminalPrompt;

impl OperatorPrompt for TerminalPrompt {
    fn ask(&self, message: &str) -> std::io::Result<String> {
        let mut stdout = std::io::stdout();
        write!(stdout, "{message}")?;
        stdout.flush()?;

        let mut line = String::new();
        std::io::stdin().lock().read_line(&mut line)?;
        Ok(line.trim_end_matches('\n').to_string())
    }
}

/// Answers from a pre-seeded queue, for automation and tests.
#[derive(Debug, Default)]
pub struct ScriptedPrompt {
    answers: Mutex<VecDeque<String>>,
}

impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            answers: Mutex::new(answers.into_iter().map(Into::into).collect()),
        }
    }
}

impl OperatorPrompt for ScriptedPrompt {
    fn ask(&self, message: &str) -> std::io::Result<String> {
        let mut answers = self.answers.lock().expect("prompt queue poisoned");
        answers.pop_front().ok_or_else(|| {
            std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                format!("no scripted answer for prompt: {message}"),
            )
        })
    }
}
