// Terminal interaction helpers: dialoguer prompts behind the Prompter
// seam, and an indicatif spinner for the long remote calls.

use crate::email::Prompter;
use anyhow::{Context, Result};
use dialoguer::{Confirm, Input};
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

/// Prompter that asks on the controlling terminal.
pub struct TerminalPrompter;

impl Prompter for TerminalPrompter {
    fn input(&mut self, prompt: &str) -> Result<String> {
        let value: String = Input::new()
            .with_prompt(prompt)
            .interact_text()
            .context("Failed to read terminal input")?;
        Ok(value)
    }

    fn confirm(&mut self, prompt: &str) -> Result<bool> {
        let answer = Confirm::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .context("Failed to read terminal confirmation")?;
        Ok(answer)
    }
}

/// Spinner shown while a remote call is in flight. Call `finish_and_clear`
/// when done so the result line prints on a clean row.
pub fn spinner(msg: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg}").unwrap());
    spinner.set_message(msg.to_string());
    spinner.enable_steady_tick(Duration::from_millis(120));
    spinner
}
