use anyhow::Result;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};

use super::super::Container;

const PROMPT: &str = "> ";

pub struct SessionController<'a> {
    container: &'a Container,
}

impl<'a> SessionController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    pub async fn session(&self) -> Result<String> {
        let surfaced = self
            .run(BufReader::new(tokio::io::stdin()), tokio::io::stdout())
            .await?;
        Ok(format!("Session closed after surfacing {} passages.", surfaced))
    }

    /// Answers one query per input line until EOF or `exit`. Returns the
    /// number of passages surfaced.
    pub async fn run<R, W>(&self, input: R, mut output: W) -> Result<usize>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut session = self.container.retrieval_service()?.open_session();
        let mut lines = input.lines();

        output.write_all(PROMPT.as_bytes()).await?;
        output.flush().await?;

        while let Some(line) = lines.next_line().await? {
            let query = line.trim();
            if query == "exit" || query == "quit" {
                break;
            }
            if !query.is_empty() {
                let reply = session.lookup(query).await;
                output.write_all(reply.message().as_bytes()).await?;
                output.write_all(b"\n\n").await?;
            }
            output.write_all(PROMPT.as_bytes()).await?;
            output.flush().await?;
        }

        Ok(session.close())
    }
}
