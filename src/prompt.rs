//! Confirmation decisions
//!
//! The aggregator asks before side effects such as running the installer
//! after an upgrade. Answers come from a `DecisionProvider`: a terminal prompt,
//! a fixed answer from the command line, or a scripted list in tests.

use dialoguer::Confirm;
use std::collections::VecDeque;
use std::sync::Mutex;
use tracing::debug;

/// Answers yes/no questions synchronously
pub trait DecisionProvider: Send + Sync {
    fn confirm(&self, question: &str, default: bool) -> bool;
}

/// Always gives the same answer
#[derive(Debug, Clone, Copy)]
pub struct FixedDecision(pub bool);

impl DecisionProvider for FixedDecision {
    fn confirm(&self, question: &str, _default: bool) -> bool {
        debug!("{} -> {}", question, self.0);
        self.0
    }
}

/// Interactive terminal prompt; falls back to the default when there is no terminal
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalPrompt;

impl DecisionProvider for TerminalPrompt {
    fn confirm(&self, question: &str, default: bool) -> bool {
        match Confirm::new()
            .with_prompt(question)
            .default(default)
            .interact()
        {
            Ok(answer) => answer,
            Err(e) => {
                debug!("prompt unavailable ({}), using default {}", e, default);
                default
            }
        }
    }
}

/// Answers from a fixed script, recording every question asked
#[derive(Debug, Default)]
pub struct ScriptedDecisions {
    answers: Mutex<VecDeque<bool>>,
    asked: Mutex<Vec<String>>,
}

impl ScriptedDecisions {
    /// Create a script; once exhausted, questions get their default answer
    pub fn new(answers: impl IntoIterator<Item = bool>) -> Self {
        Self {
            answers: Mutex::new(answers.into_iter().collect()),
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Questions asked so far
    pub fn asked(&self) -> Vec<String> {
        self.asked
            .lock()
            .map(|asked| asked.clone())
            .unwrap_or_default()
    }
}

impl DecisionProvider for ScriptedDecisions {
    fn confirm(&self, question: &str, default: bool) -> bool {
        if let Ok(mut asked) = self.asked.lock() {
            asked.push(question.to_string());
        }
        self.answers
            .lock()
            .ok()
            .and_then(|mut answers| answers.pop_front())
            .unwrap_or(default)
    }
}
