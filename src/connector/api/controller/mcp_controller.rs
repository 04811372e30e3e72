use anyhow::Result;
use tracing::warn;

use crate::connector::adapter::mcp::{serve_stdio, FaqsearchMcpServer};

use super::super::Container;

pub struct McpController<'a> {
    container: &'a Container,
}

impl<'a> McpController<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self { container }
    }

    /// Serves until the client disconnects. A missing or unreadable store
    /// does not stop the server; the tool then reports that nothing was found.
    pub async fn serve(&self) -> Result<String> {
        let service = match self.container.retrieval_service() {
            Ok(service) => Some(service),
            Err(e) => {
                warn!("Knowledge base unavailable, serving without it: {:#}", e);
                None
            }
        };

        serve_stdio(FaqsearchMcpServer::new(service.as_ref())).await?;
        Ok(String::new())
    }
}
