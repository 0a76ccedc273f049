//! MCP tool surface over stdio.
//!
//! Each tool is a thin wrapper that forwards to [`Dispatcher`]; the text it
//! returns is the tool result, and `❌` responses are flagged as tool errors.

use crate::dispatch::{DispatchResponse, Dispatcher, ToolArguments, ToolOperation};
use rmcp::handler::server::wrapper::Parameters;
use rmcp::{
    ErrorData as McpError, ServerHandler,
    handler::server::tool::ToolRouter,
    model::{CallToolResult, Content, Implementation, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use schemars::JsonSchema;
use serde::Deserialize;
use std::sync::Arc;

#[derive(Clone)]
pub struct GameNewsServer {
    dispatcher: Arc<Dispatcher>,
    tool_router: ToolRouter<Self>,
}

impl GameNewsServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    async fn call(&self, operation: ToolOperation, arguments: ToolArguments) -> Result<CallToolResult, McpError> {
        let DispatchResponse { text, is_error } =
            self.dispatcher.dispatch(operation.name(), &arguments).await;
        if is_error {
            Ok(CallToolResult::error(vec![Content::text(text)]))
        } else {
            Ok(CallToolResult::success(vec![Content::text(text)]))
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct ListParams {
    /// Game key: "lordnine", "epic_seven" or "lost_ark"
    pub game: String,
    /// Maximum number of items to return (1-50, default 10)
    #[serde(default)]
    pub limit: Option<i64>,
}

impl From<ListParams> for ToolArguments {
    fn from(p: ListParams) -> Self {
        ToolArguments {
            game: p.game,
            url: None,
            limit: p.limit,
        }
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
pub struct DetailParams {
    /// Game key: "lordnine", "epic_seven" or "lost_ark"
    pub game: String,
    /// Article URL as returned by the matching list tool
    pub url: String,
}

impl From<DetailParams> for ToolArguments {
    fn from(p: DetailParams) -> Self {
        ToolArguments {
            game: p.game,
            url: Some(p.url),
            limit: None,
        }
    }
}

#[tool_router]
impl GameNewsServer {
    #[tool(description = "List the latest official announcements for a game.")]
    async fn get_game_announcements(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        self.call(ToolOperation::GameAnnouncements, params.into()).await
    }

    #[tool(description = "Show the full text of one announcement by URL.")]
    async fn get_announcement_detail(
        &self,
        Parameters(params): Parameters<DetailParams>,
    ) -> Result<CallToolResult, McpError> {
        self.call(ToolOperation::AnnouncementDetail, params.into()).await
    }

    #[tool(description = "List the latest in-game events for a game.")]
    async fn get_game_events(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        self.call(ToolOperation::GameEvents, params.into()).await
    }

    #[tool(description = "Show the full text of one event by URL.")]
    async fn get_event_detail(
        &self,
        Parameters(params): Parameters<DetailParams>,
    ) -> Result<CallToolResult, McpError> {
        self.call(ToolOperation::EventDetail, params.into()).await
    }

    #[tool(description = "List recent patch notes and maintenance updates for a game.")]
    async fn get_game_updates(
        &self,
        Parameters(params): Parameters<ListParams>,
    ) -> Result<CallToolResult, McpError> {
        self.call(ToolOperation::GameUpdates, params.into()).await
    }

    #[tool(description = "Show the full text of one update note by URL.")]
    async fn get_update_detail(
        &self,
        Parameters(params): Parameters<DetailParams>,
    ) -> Result<CallToolResult, McpError> {
        self.call(ToolOperation::UpdateDetail, params.into()).await
    }
}

#[tool_handler]
impl ServerHandler for GameNewsServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: env!("CARGO_PKG_NAME").into(),
                title: Some("Game News".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                r#"Official news for Lordnine, Epic Seven and Lost Ark.

GAMES: "lordnine", "epic_seven", "lost_ark"

List tools return numbered items with date, URL and tags.
Pass a URL from a list result to the matching *_detail tool for the full text.
Lost Ark pages are rendered in a headless browser and take longer."#
                    .into(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scrapers::ScraperRegistry;

    #[test]
    fn test_list_params_deserialize() {
        let params: ListParams = serde_json::from_str(r#"{"game": "lordnine", "limit": 5}"#).unwrap();
        assert_eq!(params.game, "lordnine");
        assert_eq!(params.limit, Some(5));

        let params: ListParams = serde_json::from_str(r#"{"game": "lost_ark"}"#).unwrap();
        assert_eq!(params.limit, None);
        let args: ToolArguments = params.into();
        assert!(args.url.is_none());
    }

    #[test]
    fn test_detail_params_require_url() {
        let params: DetailParams =
            serde_json::from_str(r#"{"game": "epic_seven", "url": "https://page.onstove.com/epicseven/global/view/1"}"#)
                .unwrap();
        let args: ToolArguments = params.into();
        assert_eq!(args.url.as_deref(), Some("https://page.onstove.com/epicseven/global/view/1"));

        assert!(serde_json::from_str::<DetailParams>(r#"{"game": "epic_seven"}"#).is_err());
    }

    #[test]
    fn test_server_info_enables_tools() {
        let server = GameNewsServer::new(Arc::new(Dispatcher::new(Arc::new(ScraperRegistry::new()))));
        let info = server.get_info();
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.unwrap().contains("epic_seven"));
    }

    #[tokio::test]
    async fn test_unknown_game_is_tool_error() {
        let server = GameNewsServer::new(Arc::new(Dispatcher::new(Arc::new(ScraperRegistry::new()))));
        let result = server
            .call(
                ToolOperation::GameEvents,
                ToolArguments {
                    game: "unknown_game".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(result.is_error, Some(true));
    }
}
