// Author email resolution: reconcile the --author-email flag with whatever
// a previous run saved, asking the user only when the two disagree or
// neither exists. The match below is total, so `save` has a defined value
// on every path.

use anyhow::Result;

/// Terminal question seam. `ui::TerminalPrompter` asks on the controlling
/// terminal; tests script the answers instead.
pub trait Prompter {
    fn input(&mut self, prompt: &str) -> Result<String>;
    fn confirm(&mut self, prompt: &str) -> Result<bool>;
}

/// What was decided: the email this submission runs under, and whether to
/// write it back to the session state once the submission succeeds.
#[derive(Debug, Clone, PartialEq)]
pub struct EmailDecision {
    pub email: String,
    pub save: bool,
}

/// The four cases of (provided, saved):
///
/// - both present and different: use the provided one, ask whether it
///   should become the new default
/// - nothing provided, one saved: use the saved one, say so
/// - neither: ask for one, ask whether to keep it
/// - provided and matching the saved value (or nothing saved yet): use it,
///   nothing to reconcile
///
/// Saving itself happens later, and only if the submission succeeds and is
/// not a dry run.
pub fn resolve_author_email<P: Prompter>(
    provided: Option<&str>,
    saved: Option<&str>,
    prompter: &mut P,
) -> Result<EmailDecision> {
    match (provided, saved) {
        (Some(p), Some(s)) if p != s => {
            let save = prompter.confirm(&format!(
                "Use '{}' as your default author email from now on?",
                p
            ))?;
            Ok(EmailDecision {
                email: p.to_string(),
                save,
            })
        }
        (Some(p), _) => Ok(EmailDecision {
            email: p.to_string(),
            save: false,
        }),
        (None, Some(s)) => {
            println!("Using saved author email '{}'", s);
            Ok(EmailDecision {
                email: s.to_string(),
                save: false,
            })
        }
        (None, None) => {
            let email = prompter.input("Author email for this submission")?;
            let save = prompter.confirm("Save this email for future submissions?")?;
            Ok(EmailDecision { email, save })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Scripted answers; popping an empty vec panics, so a case that is not
    /// supposed to prompt fails loudly if it does.
    struct Scripted {
        inputs: Vec<String>,
        confirms: Vec<bool>,
    }

    impl Scripted {
        fn silent() -> Self {
            Scripted {
                inputs: vec![],
                confirms: vec![],
            }
        }
    }

    impl Prompter for Scripted {
        fn input(&mut self, _prompt: &str) -> Result<String> {
            Ok(self.inputs.remove(0))
        }

        fn confirm(&mut self, _prompt: &str) -> Result<bool> {
            Ok(self.confirms.remove(0))
        }
    }

    #[test]
    fn nothing_known_asks_and_mirrors_the_answer() {
        let mut prompter = Scripted {
            inputs: vec!["ada@lovelace.org".into()],
            confirms: vec![true],
        };
        let decision = resolve_author_email(None, None, &mut prompter).unwrap();
        assert_eq!(decision.email, "ada@lovelace.org");
        assert!(decision.save);

        let mut prompter = Scripted {
            inputs: vec!["ada@lovelace.org".into()],
            confirms: vec![false],
        };
        let decision = resolve_author_email(None, None, &mut prompter).unwrap();
        assert!(!decision.save);
    }

    #[test]
    fn saved_email_is_used_without_prompting() {
        let mut prompter = Scripted::silent();
        let decision = resolve_author_email(None, Some("saved@example.org"), &mut prompter).unwrap();
        assert_eq!(decision.email, "saved@example.org");
        assert!(!decision.save);
    }

    #[test]
    fn matching_values_need_no_reconciliation() {
        let mut prompter = Scripted::silent();
        let decision =
            resolve_author_email(Some("a@example.org"), Some("a@example.org"), &mut prompter)
                .unwrap();
        assert_eq!(decision.email, "a@example.org");
        assert!(!decision.save);
    }

    #[test]
    fn provided_email_with_nothing_saved_never_prompts() {
        let mut prompter = Scripted::silent();
        let decision = resolve_author_email(Some("a@example.org"), None, &mut prompter).unwrap();
        assert_eq!(decision.email, "a@example.org");
        assert!(!decision.save);
    }

    #[test]
    fn a_disagreement_asks_about_the_new_default() {
        let mut prompter = Scripted {
            inputs: vec![],
            confirms: vec![true],
        };
        let decision =
            resolve_author_email(Some("new@example.org"), Some("old@example.org"), &mut prompter)
                .unwrap();
        assert_eq!(decision.email, "new@example.org");
        assert!(decision.save);

        let mut prompter = Scripted {
            inputs: vec![],
            confirms: vec![false],
        };
        let decision =
            resolve_author_email(Some("new@example.org"), Some("old@example.org"), &mut prompter)
                .unwrap();
        assert!(!decision.save);
    }
}
