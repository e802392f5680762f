// Prompt layer: every interactive read and every operator-facing message goes
// through the `Prompt` trait so the flows can be driven by a script in tests.
// The console implementation uses `dialoguer`, same as the rest of the UI.

use crossterm::style::Stylize;
use dialoguer::{Confirm, Input, Password};
use std::io;

/// Synchronous operator interaction. An `Err` from any read means the
/// operator (or stdin) went away and the caller should take its cancel path.
pub trait Prompt {
    /// Read one line of text. Empty input is allowed.
    fn line(&mut self, prompt: &str) -> io::Result<String>;

    /// Read a secret without echoing it.
    fn secret(&mut self, prompt: &str) -> io::Result<String>;

    /// Ask a yes/no question.
    fn confirm(&mut self, prompt: &str, default: bool) -> io::Result<bool>;

    /// Show an informational message.
    fn say(&mut self, message: &str);

    /// Show a problem. Defaults to a plain message.
    fn warn(&mut self, message: &str) {
        self.say(message);
    }
}

/// Terminal-backed prompt.
#[derive(Default)]
pub struct ConsolePrompt;

impl ConsolePrompt {
    pub fn new() -> Self {
        ConsolePrompt
    }
}

impl Prompt for ConsolePrompt {
    fn line(&mut self, prompt: &str) -> io::Result<String> {
        Input::<String>::new()
            .with_prompt(prompt)
            .allow_empty(true)
            .interact_text()
    }

    fn secret(&mut self, prompt: &str) -> io::Result<String> {
        Password::new()
            .with_prompt(prompt)
            .allow_empty_password(true)
            .interact()
    }

    fn confirm(&mut self, prompt: &str, default: bool) -> io::Result<bool> {
        Confirm::new()
            .with_prompt(prompt)
            .default(default)
            .interact()
    }

    fn say(&mut self, message: &str) {
        println!("{}", message);
    }

    fn warn(&mut self, message: &str) {
        println!("{}", message.red());
    }
}

/// Prompt fed from a fixed list of answers; records everything it shows.
/// Running out of answers behaves like a closed stdin.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct ScriptedPrompt {
    answers: std::collections::VecDeque<String>,
    pub output: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new<I, S>(answers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ScriptedPrompt {
            answers: answers.into_iter().map(Into::into).collect(),
            output: Vec::new(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.answers.len()
    }

    pub fn printed(&self, needle: &str) -> bool {
        self.output.iter().any(|line| line.contains(needle))
    }

    fn next(&mut self) -> io::Result<String> {
        self.answers
            .pop_front()
            .ok_or_else(|| io::Error::new(io::ErrorKind::UnexpectedEof, "script exhausted"))
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn line(&mut self, _prompt: &str) -> io::Result<String> {
        self.next()
    }

    fn secret(&mut self, _prompt: &str) -> io::Result<String> {
        self.next()
    }

    fn confirm(&mut self, _prompt: &str, default: bool) -> io::Result<bool> {
        let answer = self.next()?;
        Ok(match answer.trim() {
            "" => default,
            other => other.eq_ignore_ascii_case("y") || other.eq_ignore_ascii_case("yes"),
        })
    }

    fn say(&mut self, message: &str) {
        self.output.push(message.to_string());
    }
}
