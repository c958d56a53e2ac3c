use crate::error::Result;
use crate::prompt::{CONTEXT_HEADER, NOT_FOUND_SENTINEL, PASSAGE_SEPARATOR, QUESTION_HEADER};
use async_trait::async_trait;
use std::collections::HashSet;

/// Completion model used to phrase the final answer.
#[async_trait]
pub trait ChatModel: Send + Sync {
    async fn complete(&self, prompt: &str) -> Result<String>;
}

/// Offline model: answers with the context passage sharing the most words
/// with the question, or the not-found sentinel when nothing overlaps.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExtractiveModel;

impl ExtractiveModel {
    fn answer(prompt: &str) -> Option<String> {
        let context_start = prompt.find(&format!("\n{CONTEXT_HEADER}\n"))? + CONTEXT_HEADER.len() + 2;
        let question_start = prompt.rfind(&format!("\n\n{QUESTION_HEADER}"))?;
        if question_start < context_start {
            return None;
        }

        let context = &prompt[context_start..question_start];
        let question = prompt[question_start + QUESTION_HEADER.len() + 2..]
            .lines()
            .next()
            .unwrap_or_default();
        let wanted = words(question);

        context
            .split(PASSAGE_SEPARATOR)
            .map(|passage| (words(passage).intersection(&wanted).count(), passage))
            .filter(|(overlap, _)| *overlap > 0)
            .max_by_key(|(overlap, _)| *overlap)
            .map(|(_, passage)| passage.trim().to_string())
    }
}

#[async_trait]
impl ChatModel for ExtractiveModel {
    async fn complete(&self, prompt: &str) -> Result<String> {
        Ok(Self::answer(prompt).unwrap_or_else(|| NOT_FOUND_SENTINEL.to_string()))
    }
}

fn words(text: &str) -> HashSet<String> {
    text.split(|ch: char| !ch.is_alphanumeric() && ch != '$')
        .filter(|word| word.chars().count() > 2)
        .map(str::to_lowercase)
        .collect()
}
