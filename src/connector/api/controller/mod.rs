pub mod build_controller;
pub mod items_controller;
pub mod mcp_controller;
pub mod query_controller;
pub mod session_controller;
pub mod stats_controller;

pub use build_controller::BuildController;
pub use items_controller::ItemsController;
pub use mcp_controller::McpController;
pub use query_controller::QueryController;
pub use session_controller::SessionController;
pub use stats_controller::StatsController;
