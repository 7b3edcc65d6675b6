//! The human at the console: escalation choices, credential entry and
//! confirmations

use anyhow::{Context, Result};
use log::{debug, info};
#[cfg(any(test, feature = "mock"))]
use mockall::automock;
use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
};

/// Operator decision after a step exhausted its automatic attempts.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepChoice {
    Retry,
    /// Treat the step as done and continue.
    Skip,
    Abort,
    /// Give up on this device and start over with another one.
    Restart,
}

impl StepChoice {
    pub fn parse(input: &str) -> Option<Self> {
        match input.trim().to_lowercase().as_str() {
            "r" | "retry" => Some(StepChoice::Retry),
            "s" | "skip" => Some(StepChoice::Skip),
            "a" | "abort" => Some(StepChoice::Abort),
            "n" | "new" | "restart" => Some(StepChoice::Restart),
            _ => None,
        }
    }
}

#[cfg_attr(any(test, feature = "mock"), automock)]
pub trait Operator {
    fn ask_step_failure(&mut self, step: &str, attempts: u32) -> StepChoice;

    /// `None` means the operator gave up.
    fn ask_credential(&mut self, reason: &str) -> Option<String>;

    fn confirm(&mut self, question: &str) -> bool;

    /// Manual firmware image selection; `None` skips the update.
    fn pick_firmware_image(&mut self, hint: &str) -> Option<PathBuf>;

    fn notify(&mut self, message: &str);
}

/// Operator answering on a line-based terminal
pub struct TerminalOperator<R, W> {
    input: R,
    output: W,
}

impl TerminalOperator<io::StdinLock<'static>, io::Stdout> {
    pub fn stdio() -> Self {
        Self::new(io::stdin().lock(), io::stdout())
    }
}

impl<R: BufRead, W: Write> TerminalOperator<R, W> {
    pub fn new(input: R, output: W) -> Self {
        Self { input, output }
    }

    /// Print `prompt` and read one trimmed line; `None` on end of input.
    fn ask(&mut self, prompt: &str) -> Result<Option<String>> {
        write!(self.output, "{prompt}").context("failed to write prompt")?;
        self.output.flush().context("failed to flush prompt")?;

        let mut line = String::new();
        let read = self
            .input
            .read_line(&mut line)
            .context("failed to read operator input")?;

        Ok((read > 0).then(|| line.trim().to_string()))
    }

    fn ask_or_none(&mut self, prompt: &str) -> Option<String> {
        match self.ask(prompt) {
            Ok(answer) => answer,
            Err(e) => {
                log::error!("{e:#}");
                None
            }
        }
    }
}

impl<R: BufRead, W: Write> Operator for TerminalOperator<R, W> {
    fn ask_step_failure(&mut self, step: &str, attempts: u32) -> StepChoice {
        let prompt = format!(
            "step '{step}' failed after {attempts} attempts. [r]etry, [s]kip, [a]bort, [n]ew device? "
        );

        loop {
            // end of input counts as abort
            let Some(answer) = self.ask_or_none(&prompt) else {
                return StepChoice::Abort;
            };

            match StepChoice::parse(&answer) {
                Some(choice) => {
                    debug!("operator chose {choice:?} for {step}");
                    return choice;
                }
                None => self.notify(&format!("unknown choice '{answer}'")),
            }
        }
    }

    fn ask_credential(&mut self, reason: &str) -> Option<String> {
        self.notify(reason);
        self.ask_or_none("device password (empty to abort): ")
            .filter(|credential| !credential.is_empty())
    }

    fn confirm(&mut self, question: &str) -> bool {
        self.ask_or_none(&format!("{question} [y/N] "))
            .is_some_and(|answer| matches!(answer.to_lowercase().as_str(), "y" | "yes" | "j" | "ja"))
    }

    fn pick_firmware_image(&mut self, hint: &str) -> Option<PathBuf> {
        self.notify(hint);

        loop {
            let answer = self
                .ask_or_none("path of the firmware image (empty to skip): ")
                .filter(|path| !path.is_empty())?;

            let path = PathBuf::from(answer);
            if path.is_file() {
                return Some(path);
            }

            self.notify(&format!("{} is not a file", path.display()));
        }
    }

    fn notify(&mut self, message: &str) {
        info!("{message}");
    }
}
