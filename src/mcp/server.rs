use crate::config::Config;
use crate::error::{ErrorKind, RelmcpError, Result};
use crate::mcp::tools::{self, ArticleListing, Collection, Discovery};
use crate::mcp::types::*;
use crate::related::StoreRegistry;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};

/// MCP Server implementation
pub struct McpServer {
    config: Config,
    registry: StoreRegistry,
}

impl McpServer {
    /// Create a new MCP server over the configured store endpoints
    pub fn new(config: Config) -> Result<Self> {
        let registry = StoreRegistry::from_config(&config)?;
        Ok(Self { config, registry })
    }

    /// Process one JSON-RPC request.
    ///
    /// Returns `None` for notifications. Handler failures become JSON-RPC
    /// error responses; nothing is returned alongside an error.
    pub async fn process_mcp_request(
        &self,
        request: JsonRpcRequest,
        initialized: &mut bool,
    ) -> Option<JsonRpcResponse> {
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                if request.method == "notifications/initialized" {
                    *initialized = true;
                }
                return None;
            }
        };

        if request.jsonrpc != "2.0" {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::new(
                    error_codes::INVALID_REQUEST,
                    format!("Unsupported jsonrpc version: {}", request.jsonrpc),
                ),
            ));
        }

        // tools are served only after a successful handshake
        if request.method.starts_with("tools/") && !*initialized {
            return Some(JsonRpcResponse::error(
                id,
                JsonRpcError::new(
                    error_codes::INVALID_REQUEST,
                    format!("{} before initialize", request.method),
                ),
            ));
        }

        let response = match request.method.as_str() {
            "initialize" => {
                let response = self.handle_initialize(&id, &request.params);
                if response.is_ok() {
                    *initialized = true;
                }
                response
            }
            "tools/list" => self.handle_tools_list(&id),
            "tools/call" => self.handle_tools_call(&id, &request.params).await,
            "shutdown" => Ok(JsonRpcResponse::result(id.clone(), Value::Null)),
            _ => Ok(JsonRpcResponse::error(
                id.clone(),
                JsonRpcError::new(error_codes::METHOD_NOT_FOUND, format!("Unknown method: {}", request.method)),
            )),
        };

        Some(response.unwrap_or_else(|e| {
            log::warn!("{} failed: {}", request.method, e);
            JsonRpcResponse::error(id, error_response(&e))
        }))
    }

    /// Run the MCP server (reads from stdin, writes to stdout)
    pub async fn run(&self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdin_reader = AsyncBufReader::new(stdin);
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();
        let mut initialized = false;

        log::info!(
            "RelMcp server v{} serving {} endpoint(s)",
            env!("CARGO_PKG_VERSION"),
            self.config.store.endpoints.len()
        );

        loop {
            line.clear();
            let bytes_read = stdin_reader.read_line(&mut line).await?;

            // EOF - client disconnected
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    if let Some(id) = extract_id_from_line(trimmed) {
                        let error_response = JsonRpcResponse::error(
                            id,
                            JsonRpcError::new(error_codes::PARSE_ERROR, format!("Parse error: {}", e)),
                        );
                        send_response(&mut stdout, &error_response).await?;
                    }
                    continue;
                }
            };

            let was_initialized = initialized;
            if let Some(response) = self.process_mcp_request(request, &mut initialized).await {
                send_response(&mut stdout, &response).await?;
            }
            if initialized && !was_initialized {
                log::info!("Client initialized");
            }
        }

        log::info!("MCP server shutting down");
        Ok(())
    }

    fn handle_initialize(&self, id: &JsonRpcId, params: &Option<Value>) -> Result<JsonRpcResponse> {
        let params: InitializeParams = serde_json::from_value(params.clone().unwrap_or(json!({})))
            .map_err(|e| RelmcpError::invalid(format!("Invalid initialize params: {}", e)))?;

        let protocol_version = if params.protocol_version.starts_with("2024")
            || params.protocol_version.starts_with("2025")
        {
            "2024-11-05".to_string()
        } else {
            params.protocol_version.clone()
        };

        let result = InitializeResult {
            protocol_version,
            capabilities: json!({ "tools": {} }),
            server_info: ServerInfo {
                name: "relmcp",
                version: env!("CARGO_PKG_VERSION"),
            },
        };

        Ok(JsonRpcResponse::result(id.clone(), serialize(&result)?))
    }

    fn handle_tools_list(&self, id: &JsonRpcId) -> Result<JsonRpcResponse> {
        let result = ToolsListResult { tools: tools::get_tool_definitions() };
        Ok(JsonRpcResponse::result(id.clone(), serialize(&result)?))
    }

    async fn handle_tools_call(&self, id: &JsonRpcId, params: &Option<Value>) -> Result<JsonRpcResponse> {
        let params: ToolsCallParams = serde_json::from_value(
            params
                .clone()
                .ok_or_else(|| RelmcpError::invalid("Missing params for tools/call"))?,
        )
        .map_err(|e| RelmcpError::invalid(format!("Invalid tools/call params: {}", e)))?;

        let registry = &self.registry;
        let browse = &self.config.browse;
        let name = params.name.as_str();
        let args = &params.arguments;

        let result = match name {
            "related_similar_redacted" => {
                tools::handle_related(registry, name, Discovery::Similar { redact: true }, args).await?
            }
            "related_similar" => {
                tools::handle_related(registry, name, Discovery::Similar { redact: false }, args).await?
            }
            "related_by_shared_source" => tools::handle_related(registry, name, Discovery::SharedSource, args).await?,
            "related_by_origin" => tools::handle_related(registry, name, Discovery::Origin, args).await?,
            "related_by_entities" => tools::handle_related(registry, name, Discovery::Entities, args).await?,
            "related_docs_by_url" => tools::handle_related(registry, name, Discovery::CrossDocument, args).await?,
            "related_docs_path_counts" => tools::handle_related(registry, name, Discovery::PathCounts, args).await?,
            "articles_recent" => {
                tools::handle_article_listing(registry, browse, name, ArticleListing::Recent, args).await?
            }
            "articles_by_category" => {
                tools::handle_article_listing(registry, browse, name, ArticleListing::ByCategory, args).await?
            }
            "articles_by_author" => {
                tools::handle_article_listing(registry, browse, name, ArticleListing::ByAuthor, args).await?
            }
            "articles_by_entity" => {
                tools::handle_article_listing(registry, browse, name, ArticleListing::ByEntity, args).await?
            }
            "articles_search" => tools::handle_listing(registry, browse, name, Collection::Article, false, args).await?,
            "articles_by_date_range" => {
                tools::handle_listing(registry, browse, name, Collection::Article, true, args).await?
            }
            "article_by_key" => tools::handle_by_key(registry, name, Collection::Article, args).await?,
            "article_categories" => {
                tools::handle_distinct(registry, browse, name, Collection::Article, false, args).await?
            }
            "article_authors" => tools::handle_distinct(registry, browse, name, Collection::Article, true, args).await?,
            "document_by_key" => tools::handle_by_key(registry, name, Collection::Document, args).await?,
            "documents_by_date_range" => {
                tools::handle_listing(registry, browse, name, Collection::Document, true, args).await?
            }
            "documents_search" => {
                tools::handle_listing(registry, browse, name, Collection::Document, false, args).await?
            }
            "document_categories" => {
                tools::handle_distinct(registry, browse, name, Collection::Document, false, args).await?
            }
            "document_authors" => {
                tools::handle_distinct(registry, browse, name, Collection::Document, true, args).await?
            }
            "document_edges" => tools::handle_document_edges(registry, browse, args).await?,
            "system_time" => tools::handle_system_time(),
            _ => {
                return Ok(JsonRpcResponse::error(
                    id.clone(),
                    JsonRpcError::new(error_codes::INVALID_PARAMS, format!("Unknown tool: {}", params.name)),
                ));
            }
        };

        Ok(JsonRpcResponse::result(id.clone(), serialize(&result)?))
    }
}

/// JSON-RPC error for a failed request, coded by error kind.
fn error_response(e: &RelmcpError) -> JsonRpcError {
    match e.kind() {
        ErrorKind::InvalidArgument => JsonRpcError::new(error_codes::INVALID_PARAMS, e.to_string()),
        ErrorKind::StoreUnavailable => JsonRpcError::new(error_codes::STORE_UNAVAILABLE, e.to_string())
            .with_data(json!({ "retryable": true })),
        ErrorKind::Internal => JsonRpcError::new(error_codes::INTERNAL_ERROR, format!("Internal error: {}", e))
            .with_data(json!({ "details": e.to_string() })),
    }
}

fn serialize<T: serde::Serialize>(value: &T) -> Result<Value> {
    serde_json::to_value(value).map_err(|e| RelmcpError::McpProtocol(format!("JSON serialization error: {}", e)))
}

/// Send JSON-RPC response to stdout (newline-delimited)
async fn send_response(stdout: &mut tokio::io::Stdout, response: &JsonRpcResponse) -> Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| RelmcpError::McpProtocol(format!("JSON serialization error: {}", e)))?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Extract ID from JSON line (for error handling)
fn extract_id_from_line(line: &str) -> Option<Value> {
    let id_start = line.find(r#""id":"#)?;
    let id_str = &line[id_start + 5..];
    let id_end = id_str.find([',', '}'])?;
    let id_val = id_str[..id_end].trim();
    if id_val.len() >= 2 && id_val.starts_with('"') && id_val.ends_with('"') {
        Some(Value::String(id_val[1..id_val.len() - 1].to_string()))
    } else {
        id_val.parse::<i64>().ok().map(|n| Value::Number(n.into()))
    }
}
