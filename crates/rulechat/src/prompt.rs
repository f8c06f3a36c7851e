use std::io::{self, Write as _};

use async_trait::async_trait;
use owo_colors::OwoColorize;
use rulechat_core::InputSource;
use tokio::io::{AsyncBufReadExt, BufReader, Stdin};

/// Reads user lines from stdin, showing a grey label first.
pub struct StdinPrompt {
    stdin: BufReader<Stdin>,
}

impl StdinPrompt {
    /// Creates a prompt over the process's stdin.
    #[inline]
    pub fn new() -> Self {
        Self {
            stdin: BufReader::new(tokio::io::stdin()),
        }
    }
}

impl Default for StdinPrompt {
    #[inline]
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl InputSource for StdinPrompt {
    async fn read_line(&mut self, label: &str) -> io::Result<Option<String>> {
        {
            let mut stdout = io::stdout().lock();
            write!(stdout, "{}: ", label.truecolor(128, 128, 128))?;
            stdout.flush()?;
        }

        let mut line = String::new();
        if self.stdin.read_line(&mut line).await? == 0 {
            return Ok(None);
        }
        Ok(Some(line))
    }
}
