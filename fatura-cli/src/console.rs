//! Terminal prompter for reconciliation.

use anyhow::Result;
use std::io::{BufRead, Write};

use fatura_core::{PendingItem, PromptOutcome, Prompter, Suggestion};

/// What one line of operator input means.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Answer {
    Pick(String),
    /// Unknown name; needs confirmation before it is created.
    New(String),
    Skip,
    Abort,
    Invalid(String),
}

pub fn interpret(
    line: &str,
    categories: &[String],
    suggestion: Option<&Suggestion>,
    fallback: &str,
) -> Answer {
    let input = line.trim();

    if input.is_empty() || input.eq_ignore_ascii_case(fallback) {
        return Answer::Skip;
    }
    if input == ":q" {
        return Answer::Abort;
    }

    if let Ok(n) = input.parse::<usize>() {
        return match (n, suggestion) {
            (0, Some(s)) => Answer::Pick(s.category.clone()),
            (0, None) => Answer::Invalid("no suggestion to accept".to_string()),
            (n, _) => match categories.get(n - 1) {
                Some(c) => Answer::Pick(c.clone()),
                None => Answer::Invalid(format!("choose 1-{}", categories.len())),
            },
        };
    }

    let name = input.to_lowercase();
    match categories.iter().find(|c| c.to_lowercase() == name) {
        Some(c) => Answer::Pick(c.clone()),
        None => Answer::New(name),
    }
}

pub struct ConsolePrompter<R, W> {
    input: R,
    output: W,
    fallback: String,
}

impl<R: BufRead, W: Write> ConsolePrompter<R, W> {
    pub fn new(input: R, output: W, fallback: impl Into<String>) -> Self {
        Self {
            input,
            output,
            fallback: fallback.into(),
        }
    }

    /// `None` on end of input.
    fn read_line(&mut self) -> Result<Option<String>> {
        let mut s = String::new();
        if self.input.read_line(&mut s)? == 0 {
            return Ok(None);
        }
        Ok(Some(s.trim().to_string()))
    }

    fn show(
        &mut self,
        item: &PendingItem,
        categories: &[String],
        suggestion: Option<&Suggestion>,
    ) -> Result<()> {
        let out = &mut self.output;
        writeln!(out)?;
        writeln!(out, "Unclassified: \"{}\" ({}x)", item.description, item.occurrences)?;
        for s in &item.samples {
            let date = s.date.map(|d| d.to_string()).unwrap_or_else(|| "-".to_string());
            write!(out, "    {date}  {:>10.2}  {}", s.amount, s.raw_description)?;
            if let Some(c) = &s.raw_category {
                write!(out, "  [{c}]")?;
            }
            writeln!(out)?;
        }
        if let Some(s) = suggestion {
            let tag = if s.known { "" } else { " (new)" };
            writeln!(out, "  0) suggested: {}{tag}", s.category)?;
        }
        for (i, c) in categories.iter().enumerate() {
            writeln!(out, "  {}) {c}", i + 1)?;
        }
        Ok(())
    }
}

impl<R: BufRead, W: Write> Prompter for ConsolePrompter<R, W> {
    fn ask(
        &mut self,
        item: &PendingItem,
        categories: &[String],
        suggestion: Option<&Suggestion>,
    ) -> Result<PromptOutcome> {
        self.show(item, categories, suggestion)?;

        loop {
            write!(
                self.output,
                "Category (number or name, Enter keeps '{}', :q stops): ",
                self.fallback
            )?;
            self.output.flush()?;

            let Some(line) = self.read_line()? else {
                return Ok(PromptOutcome::Aborted);
            };

            match interpret(&line, categories, suggestion, &self.fallback) {
                Answer::Pick(c) => return Ok(PromptOutcome::Confirmed(c)),
                Answer::Skip => return Ok(PromptOutcome::Skipped),
                Answer::Abort => return Ok(PromptOutcome::Aborted),
                Answer::Invalid(msg) => writeln!(self.output, "  {msg}")?,
                Answer::New(name) => {
                    write!(self.output, "Create category '{name}'? [y/N] ")?;
                    self.output.flush()?;
                    let Some(reply) = self.read_line()? else {
                        return Ok(PromptOutcome::Aborted);
                    };
                    if matches!(reply.to_lowercase().as_str(), "y" | "yes" | "s" | "sim") {
                        return Ok(PromptOutcome::Confirmed(name));
                    }
                }
            }
        }
    }
}
