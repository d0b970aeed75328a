//! Operator confirmation
//!
//! The gate and the destination loop only ever talk to a [`Prompt`], so they
//! run the same way against a terminal or a scripted test double.

use std::io::{self, BufRead, Write};

/// Operator reply to a question
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Answer {
    Yes,
    No,
    /// Stop all remaining work
    Quit,
}

impl Answer {
    /// Only an exact `y` or `q` counts; everything else declines
    pub fn from_reply(reply: &str) -> Self {
        match reply.trim() {
            "y" => Answer::Yes,
            "q" => Answer::Quit,
            _ => Answer::No,
        }
    }
}

/// Confirmation provider
pub trait Prompt {
    /// Ask `question`; `allow_quit` offers the `q` choice
    fn ask(&mut self, question: &str, allow_quit: bool) -> Answer;

    fn confirm(&mut self, question: &str) -> bool {
        self.ask(question, false) == Answer::Yes
    }
}

/// Prompt on stdout, read replies from stdin
pub struct TerminalPrompt<R> {
    input: R,
}

impl TerminalPrompt<io::StdinLock<'static>> {
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> TerminalPrompt<R> {
    pub fn new(input: R) -> Self {
        Self { input }
    }
}

impl<R: BufRead> Prompt for TerminalPrompt<R> {
    fn ask(&mut self, question: &str, allow_quit: bool) -> Answer {
        let choices = if allow_quit { "y/n/q" } else { "y/n" };
        print!("{question} ({choices})? ");
        let _ = io::stdout().flush();

        let mut reply = String::new();
        match self.input.read_line(&mut reply) {
            // EOF or unreadable input never confirms
            Ok(0) | Err(_) => Answer::No,
            Ok(_) => match Answer::from_reply(&reply) {
                Answer::Quit if !allow_quit => Answer::No,
                answer => answer,
            },
        }
    }
}

/// Scripted prompt for tests: replays canned answers, records questions
#[cfg(test)]
pub struct ScriptedPrompt {
    answers: std::collections::VecDeque<Answer>,
    pub asked: Vec<String>,
}

#[cfg(test)]
impl ScriptedPrompt {
    pub fn new(answers: &[Answer]) -> Self {
        Self {
            answers: answers.iter().copied().collect(),
            asked: Vec::new(),
        }
    }
}

#[cfg(test)]
impl Prompt for ScriptedPrompt {
    fn ask(&mut self, question: &str, _allow_quit: bool) -> Answer {
        self.asked.push(question.to_string());
        self.answers.pop_front().unwrap_or(Answer::No)
    }
}
