use std::io::{self, BufRead, Write};
use std::process::Command;

use anyhow::{Context, Result};
use vuru_installer::{ReviewDocument, ReviewGate};

use crate::render::TerminalRenderer;

/// Shows review documents through a pager and reads the answer from stdin.
pub(crate) struct TerminalReviewGate {
    renderer: TerminalRenderer,
    pager: Vec<String>,
}

impl TerminalReviewGate {
    pub(crate) fn new(renderer: TerminalRenderer, pager: Vec<String>) -> Self {
        Self { renderer, pager }
    }

    pub(crate) fn review_with(
        &self,
        document: &ReviewDocument,
        input: &mut dyn BufRead,
        output: &mut dyn Write,
    ) -> Result<bool> {
        self.renderer.print_status("step", &document.heading);

        if let Some(body) = &document.body {
            if !self.show_in_pager(body) {
                output
                    .write_all(body.as_bytes())
                    .and_then(|_| output.write_all(b"\n"))
                    .context("failed writing review document")?;
            }
        }

        write!(output, "{} ", document.prompt)
            .and_then(|_| output.flush())
            .context("failed writing review prompt")?;

        let mut answer = String::new();
        let read = input
            .read_line(&mut answer)
            .context("failed reading review answer")?;
        Ok(parse_confirmation((read > 0).then_some(answer.as_str())))
    }

    /// Returns false when the pager could not display the body.
    fn show_in_pager(&self, body: &str) -> bool {
        let Some((program, args)) = self.pager.split_first() else {
            return false;
        };
        let Ok(mut staged) = tempfile::Builder::new().prefix("vuru_review_").tempfile() else {
            return false;
        };
        if staged
            .write_all(body.as_bytes())
            .and_then(|_| staged.flush())
            .is_err()
        {
            return false;
        }

        Command::new(program)
            .args(args)
            .arg(staged.path())
            .status()
            .is_ok_and(|status| status.success())
    }
}

impl ReviewGate for TerminalReviewGate {
    fn review(&mut self, document: &ReviewDocument) -> Result<bool> {
        let stdin = io::stdin();
        let mut input = stdin.lock();
        let mut output = io::stdout();
        self.review_with(document, &mut input, &mut output)
    }
}

/// Empty input, `y` or `yes` (any case) approves; anything else, including EOF, declines.
pub(crate) fn parse_confirmation(answer: Option<&str>) -> bool {
    let Some(answer) = answer else {
        return false;
    };
    let answer = answer.trim();
    answer.is_empty() || answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes")
}
