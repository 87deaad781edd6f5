use std::collections::HashMap;
use std::sync::Mutex;

use crate::models::{AnswerValue, SavedAnswer};

/// Single source of truth for the student's current answers, at most one per
/// question. Writes happen synchronously with the triggering edit so the
/// submission flush always observes the latest values.
#[derive(Debug, Default)]
pub(crate) struct AnswerStore {
    answers: Mutex<HashMap<String, AnswerValue>>,
}

impl AnswerStore {
    /// Seeds previously persisted answers on resume. Must run before the
    /// first render so progress indicators start out correct.
    pub(crate) fn seed(&self, saved: Vec<SavedAnswer>) {
        let mut answers = self.answers.lock().expect("answer store lock");
        for entry in saved {
            answers.insert(entry.question_id, entry.value);
        }
    }

    /// Overwrites the answer for one question and returns the complete new
    /// answer set for re-rendering.
    pub(crate) fn set(&self, question_id: &str, value: AnswerValue) -> HashMap<String, AnswerValue> {
        let mut answers = self.answers.lock().expect("answer store lock");
        answers.insert(question_id.to_string(), value);
        answers.clone()
    }

    pub(crate) fn get(&self, question_id: &str) -> Option<AnswerValue> {
        self.answers.lock().expect("answer store lock").get(question_id).cloned()
    }

    pub(crate) fn snapshot(&self) -> HashMap<String, AnswerValue> {
        self.answers.lock().expect("answer store lock").clone()
    }

    pub(crate) fn answered_count(&self) -> usize {
        self.answers.lock().expect("answer store lock").len()
    }
}
