//! Incremental terminal rendering of a streaming answer.

use crate::cli::Output;
use crate::message::{Message, StepStatus};
use crate::reducer::{Conversation, PLACEHOLDER_STEP_ID};
use indicatif::ProgressBar;
use std::collections::HashSet;
use std::io::Write;

/// Prints whatever a conversation update added since the last call.
pub struct LiveAnswer {
    spinner: Option<ProgressBar>,
    started: HashSet<String>,
    completed: HashSet<String>,
    printed: usize,
}

impl LiveAnswer {
    pub fn new() -> Self {
        Self {
            spinner: Some(Output::spinner("Thinking...")),
            started: HashSet::new(),
            completed: HashSet::new(),
            printed: 0,
        }
    }

    pub fn update(&mut self, conversation: &Conversation) {
        let Some(answer) = conversation.last_answer() else {
            return;
        };
        self.print_steps(answer);
        self.print_content(answer);
    }

    /// Close the output of one answer.
    pub fn finish(&mut self, conversation: &Conversation) {
        self.update(conversation);
        self.clear_spinner();
        println!();

        if let Some(answer) = conversation.last_answer() {
            Output::sources(answer.sources.as_deref().unwrap_or_default());
            Output::suggestions(answer.suggestions.as_deref().unwrap_or_default());
        }
        println!();
    }

    fn print_steps(&mut self, answer: &Message) {
        for step in answer.steps() {
            if step.id == PLACEHOLDER_STEP_ID {
                continue;
            }
            let fresh = self.started.insert(step.id.clone());
            let done = step.status == StepStatus::Completed && self.completed.insert(step.id.clone());
            if fresh || done {
                self.clear_spinner();
                Output::step(step);
            }
        }
    }

    fn print_content(&mut self, answer: &Message) {
        // Answer content only ever grows by appending.
        let Some(fresh) = answer.content.get(self.printed..) else {
            return;
        };
        if fresh.is_empty() {
            return;
        }
        self.clear_spinner();
        if self.printed == 0 {
            println!();
        }
        print!("{}", fresh);
        let _ = std::io::stdout().flush();
        self.printed = answer.content.len();
    }

    fn clear_spinner(&mut self) {
        if let Some(spinner) = self.spinner.take() {
            spinner.finish_and_clear();
        }
    }
}
