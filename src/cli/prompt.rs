//! Terminal duplicate prompts
//!
//! The dialoguer-backed [`OperatorPrompt`] implementation used by
//! interactive imports. A failed or interrupted prompt (EOF, broken
//! terminal) is treated as an abort so an unattended run never hangs or
//! imports blindly.

use crate::core::resolver::{MatchDetail, OperatorPrompt, PromptChoice};
use dialoguer::theme::ColorfulTheme;
use dialoguer::Select;

/// Shown at most this many matches before prompting
const PREVIEW_MATCHES: usize = 5;

/// Interactive prompt on the controlling terminal
#[derive(Debug, Default)]
pub struct CliPrompt;

impl CliPrompt {
    pub fn new() -> Self {
        Self
    }
}

impl OperatorPrompt for CliPrompt {
    fn choose(&mut self, candidate: &str, matches: &[MatchDetail]) -> PromptChoice {
        println!(
            "\n'{}' resembles {} existing item(s):",
            candidate,
            matches.len()
        );
        for detail in matches.iter().take(PREVIEW_MATCHES) {
            println!(
                "  #{:<6} {:>2} bits  '{}' by {}",
                detail.id, detail.distance, detail.title, detail.artist
            );
        }
        if matches.len() > PREVIEW_MATCHES {
            println!("  ... and {} more", matches.len() - PREVIEW_MATCHES);
        }

        let selection = Select::with_theme(&ColorfulTheme::default())
            .with_prompt("Import this item anyway?")
            .items(&["keep (import)", "skip", "inspect matches", "abort run"])
            .default(1)
            .interact();

        match selection {
            Ok(0) => PromptChoice::Keep,
            Ok(1) => PromptChoice::Skip,
            Ok(2) => PromptChoice::Inspect,
            Ok(_) | Err(_) => PromptChoice::Abort,
        }
    }

    fn show_details(&mut self, matches: &[MatchDetail]) {
        println!("\nAll matches:");
        for detail in matches {
            println!(
                "  #{:<6} distance {:>2}  '{}' by {}",
                detail.id, detail.distance, detail.title, detail.artist
            );
        }
        println!();
    }
}
