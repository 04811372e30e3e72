use std::sync::Arc;

use rmcp::handler::server::tool::ToolRouter;
use rmcp::handler::server::wrapper::Parameters;
use rmcp::model::{
    CallToolResult, Content, Implementation, ProtocolVersion, ServerCapabilities, ServerInfo,
};
use rmcp::tool;
use rmcp::tool_handler;
use rmcp::tool_router;
use rmcp::ErrorData as McpError;
use rmcp::{ServerHandler, ServiceExt};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::application::{LookupReply, RetrievalService, RetrievalSession};

use super::tools::LookupToolInput;

/// MCP server exposing the knowledge base to a conversational agent.
///
/// One server instance serves one connection, so it holds a single retrieval
/// session: passages returned by earlier calls are never returned again.
/// Without a loaded store every call answers with the unavailable message.
#[derive(Clone)]
pub struct FaqsearchMcpServer {
    session: Option<Arc<Mutex<RetrievalSession>>>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl FaqsearchMcpServer {
    pub fn new(service: Option<&RetrievalService>) -> Self {
        Self {
            session: service.map(|s| Arc::new(Mutex::new(s.open_session()))),
            tool_router: Self::tool_router(),
        }
    }

    pub async fn lookup(&self, query: &str) -> LookupReply {
        match &self.session {
            Some(session) => session.lock().await.lookup(query).await,
            None => {
                warn!("lookup_info called without a loaded knowledge base");
                LookupReply::Unavailable
            }
        }
    }

    /// Look up information in the business knowledge base (FAQ, pricing, policies).
    /// Each call returns passages not already returned in this conversation, so call it
    /// again with the same or a refined query to get more.
    #[tool(name = "lookup_info")]
    async fn lookup_info(
        &self,
        params: Parameters<LookupToolInput>,
    ) -> Result<CallToolResult, McpError> {
        let reply = self.lookup(&params.0.query).await;
        Ok(CallToolResult::success(vec![Content::text(
            reply.into_message(),
        )]))
    }
}

#[tool_handler]
impl ServerHandler for FaqsearchMcpServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2024_11_05,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation::from_build_env(),
            instructions: Some(
                "Knowledge base lookup server. Use the lookup_info tool to fetch passages that \
                 answer a customer's question. Passages are attributed to the document they \
                 came from and are never repeated within one conversation."
                    .into(),
            ),
        }
    }
}

/// Serves the MCP protocol over stdin/stdout until the client disconnects.
pub async fn serve_stdio(server: FaqsearchMcpServer) -> anyhow::Result<()> {
    info!("Starting MCP server on stdio");
    let running = server.serve(rmcp::transport::stdio()).await?;
    let reason = running.waiting().await?;
    info!("MCP server stopped: {:?}", reason);
    Ok(())
}
