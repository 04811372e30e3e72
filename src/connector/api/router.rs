use anyhow::Result;

use crate::Commands;

use super::container::Container;
use super::controller::{
    BuildController, ItemsController, McpController, QueryController, SessionController,
    StatsController,
};

pub struct Router<'a> {
    build_controller: BuildController<'a>,
    query_controller: QueryController<'a>,
    session_controller: SessionController<'a>,
    items_controller: ItemsController<'a>,
    stats_controller: StatsController<'a>,
    mcp_controller: McpController<'a>,
}

impl<'a> Router<'a> {
    pub fn new(container: &'a Container) -> Self {
        Self {
            build_controller: BuildController::new(container),
            query_controller: QueryController::new(container),
            session_controller: SessionController::new(container),
            items_controller: ItemsController::new(container),
            stats_controller: StatsController::new(container),
            mcp_controller: McpController::new(container),
        }
    }

    pub async fn route(&self, command: Commands) -> Result<String> {
        match command {
            Commands::Build {
                corpus,
                trees,
                metric,
                seed,
                concurrency,
                batch_size,
                extensions,
            } => {
                self.build_controller
                    .build(corpus, trees, metric, seed, concurrency, batch_size, extensions)
                    .await
            }
            Commands::Query {
                text,
                num,
                search_effort,
            } => self.query_controller.query(text, num, search_effort).await,
            Commands::Session => self.session_controller.session().await,
            Commands::Items { limit, id } => self.items_controller.items(limit, id).await,
            Commands::Stats => self.stats_controller.stats().await,
            Commands::Mcp => self.mcp_controller.serve().await,
        }
    }
}
