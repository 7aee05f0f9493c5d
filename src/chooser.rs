// 🎯 Rarity disambiguation strategy
//
// When a set code was printed in several rarities and the CSV does not say
// which one is owned, reconciliation asks a RarityChooser. The call is
// synchronous and may block (an interactive prompt, for instance).

use std::io::{BufRead, Write};
use std::sync::Mutex;

pub trait RarityChooser {
    /// Pick one of `candidates` (ordered most-preferred first).
    ///
    /// Returning `None` declines; the first candidate is used instead.
    fn choose(&self, set_code: &str, candidates: &[String]) -> Option<String>;
}

/// Headless default: always the most preferred candidate
pub struct AutoPick;

impl RarityChooser for AutoPick {
    fn choose(&self, _set_code: &str, _candidates: &[String]) -> Option<String> {
        None
    }
}

impl<F> RarityChooser for F
where
    F: Fn(&str, &[String]) -> Option<String>,
{
    fn choose(&self, set_code: &str, candidates: &[String]) -> Option<String> {
        self(set_code, candidates)
    }
}

/// Ask `chooser`, then settle on a rarity that is actually among `candidates`.
///
/// Declines, blanks and answers outside the list all fall back to the first candidate.
/// Matching is case-insensitive and returns the candidate's own spelling.
pub fn settle_choice(chooser: &dyn RarityChooser, set_code: &str, candidates: &[String]) -> Option<String> {
    let first = candidates.first()?;
    let picked = chooser
        .choose(set_code, candidates)
        .map(|c| c.trim().to_string())
        .and_then(|c| {
            candidates
                .iter()
                .find(|cand| cand.eq_ignore_ascii_case(&c))
                .cloned()
        });

    Some(picked.unwrap_or_else(|| first.clone()))
}

/// Numbered prompt over any reader/writer pair (stdin/stderr in the CLI).
///
/// Accepts a 1-based number or a rarity name; empty input or EOF declines.
pub struct PromptChooser<R, W> {
    io: Mutex<(R, W)>,
}

impl<R: BufRead, W: Write> PromptChooser<R, W> {
    pub fn new(input: R, output: W) -> Self {
        PromptChooser {
            io: Mutex::new((input, output)),
        }
    }
}

impl<R: BufRead, W: Write> RarityChooser for PromptChooser<R, W> {
    fn choose(&self, set_code: &str, candidates: &[String]) -> Option<String> {
        let mut guard = self.io.lock().ok()?;
        let (input, output) = &mut *guard;

        let _ = writeln!(output, "Multiple rarities found for {}. Please choose:", set_code);
        for (i, c) in candidates.iter().enumerate() {
            let _ = writeln!(output, "  {}) {}", i + 1, c);
        }
        let _ = write!(output, "Choice [1]: ");
        let _ = output.flush();

        let mut line = String::new();
        if input.read_line(&mut line).ok()? == 0 {
            return None;
        }
        let answer = line.trim();
        if answer.is_empty() {
            return None;
        }

        match answer.parse::<usize>() {
            Ok(n) if n >= 1 && n <= candidates.len() => Some(candidates[n - 1].clone()),
            Ok(_) => None,
            Err(_) => Some(answer.to_string()),
        }
    }
}
