//! Shortfall policies selectable from the command line

use impublish_core::{ShortfallDecision, ShortfallPolicy, VerificationShortfall};
use std::cell::RefCell;
use std::io::{BufRead, Write};

/// Asks on the terminal whether to keep a record with missing files.
///
/// Anything but an explicit yes aborts; so does end of input.
pub struct PromptPolicy<R, W> {
    input: RefCell<R>,
    output: RefCell<W>,
}

impl<R: BufRead, W: Write> PromptPolicy<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self {
            input: RefCell::new(input),
            output: RefCell::new(output),
        }
    }
}

impl PromptPolicy<std::io::StdinLock<'static>, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdin().lock(), std::io::stderr())
    }
}

impl<R: BufRead, W: Write> ShortfallPolicy for PromptPolicy<R, W> {
    fn decide(&self, shortfall: &VerificationShortfall) -> ShortfallDecision {
        let mut output = self.output.borrow_mut();
        let _ = writeln!(
            output,
            "Record {} is missing {} file(s) after upload:",
            shortfall.record,
            shortfall.missing.len()
        );
        for name in shortfall.missing_names() {
            let _ = writeln!(output, "  {}", name);
        }
        let _ = write!(output, "Continue anyway? [y/N] ");
        let _ = output.flush();

        let mut line = String::new();
        match self.input.borrow_mut().read_line(&mut line) {
            Ok(0) | Err(_) => ShortfallDecision::Abort,
            Ok(_) => parse_answer(&line),
        }
    }
}

fn parse_answer(line: &str) -> ShortfallDecision {
    match line.trim().to_ascii_lowercase().as_str() {
        "y" | "yes" => ShortfallDecision::Continue,
        _ => ShortfallDecision::Abort,
    }
}

/// Policy chosen by `--yes`, `--abort-on-shortfall` or the terminal
pub enum CliPolicy {
    Prompt(PromptPolicy<std::io::StdinLock<'static>, std::io::Stderr>),
    Continue,
    Abort,
}

impl CliPolicy {
    pub fn from_flags(yes: bool, abort: bool) -> Self {
        use std::io::IsTerminal;
        if yes {
            CliPolicy::Continue
        } else if abort || !std::io::stdin().is_terminal() {
            CliPolicy::Abort
        } else {
            CliPolicy::Prompt(PromptPolicy::stdio())
        }
    }
}

impl ShortfallPolicy for CliPolicy {
    fn decide(&self, shortfall: &VerificationShortfall) -> ShortfallDecision {
        match self {
            CliPolicy::Prompt(prompt) => prompt.decide(shortfall),
            CliPolicy::Continue => ShortfallDecision::Continue,
            CliPolicy::Abort => ShortfallDecision::Abort,
        }
    }
}
