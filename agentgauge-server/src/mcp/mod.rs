// Copyright 2025 Agentgauge Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Model Context Protocol surface for the evaluation engine.
//!
//! Exposes the engine's operations as MCP tools over JSON-RPC 2.0 so
//! that MCP-capable hosts can create suites, launch experiments and
//! simulations, and manage the experiment archive. The surface speaks
//! the `initialize`, `tools/list`, and `tools/call` methods; transports
//! (stdio, sockets) are the embedding host's concern and plug in on top
//! of [`handlers::McpEngineHandler::handle`].

pub mod handlers;
pub mod protocol;
pub mod tools;

pub use handlers::{EngineState, McpEngineHandler};
pub use protocol::{
    CallToolParams, CallToolResult, JsonRpcError, JsonRpcId, JsonRpcRequest, JsonRpcResponse,
    Tool, ToolContent,
};
pub use tools::get_tool_definitions;
