//! Duplicate resolution
//!
//! Once an incoming image has been fingerprinted and matched against the
//! index, the resolver decides whether it enters the catalog. Automatic mode
//! applies the strict threshold silently; interactive mode defers loose
//! matches to an operator through the [`OperatorPrompt`] seam so the policy
//! stays testable without a terminal.

use crate::catalog::ArtworkId;
use serde::{Deserialize, Serialize};

/// Resolution policy selected per run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResolverMode {
    /// Suppress matches silently, never prompt
    #[default]
    Auto,
    /// Defer each match to the operator
    Interactive,
}

/// Operator answer to a duplicate prompt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptChoice {
    /// Import despite the matches
    Keep,
    /// Skip this item
    Skip,
    /// Show match details, then ask again
    Inspect,
    /// Stop the whole run
    Abort,
}

/// One similarity hit enriched with catalog metadata for display
#[derive(Debug, Clone)]
pub struct MatchDetail {
    pub id: ArtworkId,
    pub distance: u32,
    pub artist: String,
    pub title: String,
}

/// Seam between resolution policy and the operator's terminal
pub trait OperatorPrompt {
    /// Ask what to do with a candidate that has near matches
    fn choose(&mut self, candidate: &str, matches: &[MatchDetail]) -> PromptChoice;

    /// Print expanded match details (the "inspect" path)
    fn show_details(&mut self, matches: &[MatchDetail]);
}

/// How an item's duplicate check concluded
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// No matches, import proceeds
    Accepted,
    /// Matches found, item suppressed without asking
    Skipped,
    /// Operator saw the matches and chose to import anyway
    AskedAndKept,
    /// Operator saw the matches and chose to skip
    AskedAndSkipped,
    /// Operator asked to stop the run
    AbortRequested,
}

/// Resolution result: the outcome plus the matches that drove it
#[derive(Debug, Clone)]
pub struct Decision {
    pub outcome: Outcome,
    pub matches: Vec<MatchDetail>,
}

/// Applies the run's resolution policy to one item at a time
pub enum DuplicateResolver {
    Auto,
    Interactive(Box<dyn OperatorPrompt>),
}

impl DuplicateResolver {
    /// Build a resolver for the configured mode
    ///
    /// `prompt` is only consulted in interactive mode.
    pub fn new(mode: ResolverMode, prompt: Box<dyn OperatorPrompt>) -> Self {
        match mode {
            ResolverMode::Auto => Self::Auto,
            ResolverMode::Interactive => Self::Interactive(prompt),
        }
    }

    /// Decide the fate of `candidate` given its near matches
    ///
    /// An empty match list is always [`Outcome::Accepted`]; neither mode
    /// prompts for it.
    pub fn resolve(&mut self, candidate: &str, matches: Vec<MatchDetail>) -> Decision {
        if matches.is_empty() {
            return Decision {
                outcome: Outcome::Accepted,
                matches,
            };
        }

        match self {
            Self::Auto => Decision {
                outcome: Outcome::Skipped,
                matches,
            },
            Self::Interactive(prompt) => {
                // Inspect loops back to the same question
                let outcome = loop {
                    match prompt.choose(candidate, &matches) {
                        PromptChoice::Keep => break Outcome::AskedAndKept,
                        PromptChoice::Skip => break Outcome::AskedAndSkipped,
                        PromptChoice::Abort => break Outcome::AbortRequested,
                        PromptChoice::Inspect => prompt.show_details(&matches),
                    }
                };
                Decision { outcome, matches }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::VecDeque;

    use std::rc::Rc;
    use std::cell::Cell;

    /// Prompt that replays a fixed script of answers
    struct ScriptedPrompt {
        answers: VecDeque<PromptChoice>,
        details_shown: Rc<Cell<usize>>,
    }

    impl ScriptedPrompt {
        fn new(answers: &[PromptChoice]) -> Self {
            Self {
                answers: answers.iter().copied().collect(),
                details_shown: Rc::new(Cell::new(0)),
            }
        }

        fn detail_counter(&self) -> Rc<Cell<usize>> {
            Rc::clone(&self.details_shown)
        }
    }

    impl OperatorPrompt for ScriptedPrompt {
        fn choose(&mut self, _candidate: &str, _matches: &[MatchDetail]) -> PromptChoice {
            self.answers.pop_front().unwrap_or(PromptChoice::Abort)
        }

        fn show_details(&mut self, _matches: &[MatchDetail]) {
            self.details_shown.set(self.details_shown.get() + 1);
        }
    }

    fn one_match() -> Vec<MatchDetail> {
        vec![MatchDetail {
            id: 7,
            distance: 3,
            artist: "judy".to_string(),
            title: "Carrot Field".to_string(),
        }]
    }

    #[test]
    fn test_no_matches_accepts_without_prompting() {
        let mut auto = DuplicateResolver::Auto;
        assert_eq!(auto.resolve("item", Vec::new()).outcome, Outcome::Accepted);

        // Interactive with an empty script: never consulted
        let mut interactive =
            DuplicateResolver::Interactive(Box::new(ScriptedPrompt::new(&[])));
        assert_eq!(
            interactive.resolve("item", Vec::new()).outcome,
            Outcome::Accepted
        );
    }

    #[test]
    fn test_auto_skips_any_match() {
        let mut resolver = DuplicateResolver::Auto;
        let decision = resolver.resolve("item", one_match());
        assert_eq!(decision.outcome, Outcome::Skipped);
        assert_eq!(decision.matches.len(), 1);
    }

    #[test]
    fn test_interactive_keep_and_skip() {
        let mut keeper =
            DuplicateResolver::Interactive(Box::new(ScriptedPrompt::new(&[PromptChoice::Keep])));
        assert_eq!(keeper.resolve("a", one_match()).outcome, Outcome::AskedAndKept);

        let mut skipper =
            DuplicateResolver::Interactive(Box::new(ScriptedPrompt::new(&[PromptChoice::Skip])));
        assert_eq!(
            skipper.resolve("b", one_match()).outcome,
            Outcome::AskedAndSkipped
        );
    }

    #[test]
    fn test_interactive_inspect_loops_back() {
        let prompt = ScriptedPrompt::new(&[
            PromptChoice::Inspect,
            PromptChoice::Inspect,
            PromptChoice::Keep,
        ]);
        let shown = prompt.detail_counter();
        let mut resolver = DuplicateResolver::Interactive(Box::new(prompt));

        let decision = resolver.resolve("item", one_match());
        assert_eq!(decision.outcome, Outcome::AskedAndKept);
        assert_eq!(shown.get(), 2);
    }

    #[test]
    fn test_interactive_abort() {
        let mut resolver =
            DuplicateResolver::Interactive(Box::new(ScriptedPrompt::new(&[PromptChoice::Abort])));
        assert_eq!(
            resolver.resolve("item", one_match()).outcome,
            Outcome::AbortRequested
        );
    }
}
