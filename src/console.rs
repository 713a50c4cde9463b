//! # Operator Console
//!
//! The interactive channel used to guide the operator through calibration.
//! Prompts are passed explicitly to whatever needs them so that calibration can
//! run headless in tests.

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, Lines, Stdin};

use crate::error::{Result, SharedJoystickError};

/// Interactive channel to the operator.
#[async_trait]
pub trait Prompter: Send {
    /// Shows an instruction or a status line.
    fn show(&mut self, message: &str);

    /// Shows a message and waits for the operator to press Enter.
    async fn confirm(&mut self, message: &str) -> Result<()>;
}

/// Prompter on stdin/stdout.
pub struct ConsolePrompter {
    lines: Lines<BufReader<Stdin>>,
}

impl Default for ConsolePrompter {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsolePrompter {
    #[must_use]
    pub fn new() -> Self {
        Self {
            lines: BufReader::new(tokio::io::stdin()).lines(),
        }
    }

    /// Asks a question and returns the trimmed answer.
    ///
    /// # Errors
    ///
    /// Returns `Io` if stdin is closed before a line is read.
    pub async fn ask(&mut self, question: &str) -> Result<String> {
        let mut stdout = tokio::io::stdout();
        stdout.write_all(question.as_bytes()).await?;
        stdout.flush().await?;
        self.read_line().await.map(|line| line.trim().to_string())
    }

    async fn read_line(&mut self) -> Result<String> {
        self.lines.next_line().await?.ok_or_else(|| {
            SharedJoystickError::Io(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "stdin closed",
            ))
        })
    }
}

#[async_trait]
impl Prompter for ConsolePrompter {
    fn show(&mut self, message: &str) {
        println!("{}", message);
    }

    async fn confirm(&mut self, message: &str) -> Result<()> {
        println!("{}", message);
        self.read_line().await.map(|_| ())
    }
}
