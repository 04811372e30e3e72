use serde::{Deserialize, Serialize};

use super::PassageId;

/// A retrieved passage ready to hand to the conversational agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormattedContext {
    passage_id: PassageId,
    source: String,
    body: String,
    distance: f32,
}

impl FormattedContext {
    pub fn new(passage_id: PassageId, source: String, body: String, distance: f32) -> Self {
        Self {
            passage_id,
            source,
            body,
            distance,
        }
    }

    pub fn passage_id(&self) -> &str {
        &self.passage_id
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn body(&self) -> &str {
        &self.body
    }

    pub fn distance(&self) -> f32 {
        self.distance
    }

    /// Renders the block the agent sees for this passage.
    pub fn render(&self) -> String {
        format!("Source: {}\nContent: {}\n", self.source, self.body)
    }
}

/// Outcome of one session search.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    /// New passages, in rank order. May be empty if every hit was missing
    /// from the passage corpus.
    Found(Vec<FormattedContext>),
    /// Every candidate had already been surfaced in this session.
    NoNewResults,
}

impl SearchOutcome {
    pub fn contexts(&self) -> &[FormattedContext] {
        match self {
            SearchOutcome::Found(contexts) => contexts,
            SearchOutcome::NoNewResults => &[],
        }
    }

    pub fn is_no_new_results(&self) -> bool {
        matches!(self, SearchOutcome::NoNewResults)
    }

    pub fn passage_ids(&self) -> Vec<&str> {
        self.contexts().iter().map(|c| c.passage_id()).collect()
    }
}

/// Joins context blocks with a blank line between them.
pub fn render_contexts(contexts: &[FormattedContext]) -> String {
    contexts
        .iter()
        .map(FormattedContext::render)
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(id: &str, source: &str, body: &str) -> FormattedContext {
        FormattedContext::new(id.to_string(), source.to_string(), body.to_string(), 0.1)
    }

    #[test]
    fn test_render_single_block() {
        let block = context("a", "FAQ Page", "Detergents are safe for pets.").render();
        assert_eq!(block, "Source: FAQ Page\nContent: Detergents are safe for pets.\n");
    }

    #[test]
    fn test_render_joins_blocks_with_blank_line() {
        let rendered = render_contexts(&[context("a", "One", "first"), context("b", "Two", "second")]);
        assert_eq!(
            rendered,
            "Source: One\nContent: first\n\n\nSource: Two\nContent: second\n"
        );
    }

    #[test]
    fn test_outcome_accessors() {
        let found = SearchOutcome::Found(vec![context("a", "s", "b")]);
        assert_eq!(found.passage_ids(), vec!["a"]);
        assert!(!found.is_no_new_results());

        assert!(SearchOutcome::NoNewResults.contexts().is_empty());
        assert!(SearchOutcome::NoNewResults.is_no_new_results());
    }
}
