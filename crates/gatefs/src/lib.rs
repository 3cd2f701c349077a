//! MCP gateway exposing sandboxed filesystem tools.
//!
//! Every operation is confined to an allow-list of root directories fixed at
//! startup. Path validation (canonicalization, symlink-escape checks) lives
//! in [`guard`]; the tool surface is dispatched over the rmcp stdio
//! transport.

use rmcp::{
    ServerHandler,
    handler::server::router::tool::ToolRouter,
    model::{Implementation, ServerCapabilities, ServerInfo},
    tool_handler,
};

pub mod config;
pub mod error;
pub mod guard;
pub mod ops;
pub mod probe;
pub mod tools;
pub mod walk;

use config::LimitsConfig;
use guard::PathGuard;

/// MCP filesystem gateway with directory-level access control.
#[derive(Debug, Clone)]
pub struct FilesystemGateway {
    pub(crate) guard: PathGuard,
    pub(crate) limits: LimitsConfig,
    pub(crate) tool_router: ToolRouter<Self>,
}

#[tool_handler]
impl ServerHandler for FilesystemGateway {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: Default::default(),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "gatefs".into(),
                title: Some("GateFS Filesystem Gateway".into()),
                version: env!("CARGO_PKG_VERSION").into(),
                ..Default::default()
            },
            instructions: Some(
                "Filesystem gateway providing sandboxed file and directory operations \
                 confined to the configured allowed directories."
                    .into(),
            ),
        }
    }
}
