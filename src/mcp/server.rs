// MCP Server Implementation
//
// Line-delimited JSON-RPC over stdio. Each line is one request; responses
// are written back one per line. Logs go to stderr.

use anyhow::Result;
use serde_json::Value;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tracing::{error, info};

use crate::mcp::protocol::*;
use crate::service::PaymentService;

/// MCP Server for handling Model Context Protocol requests
pub struct MCPServer {
    service: Arc<PaymentService>,
}

impl MCPServer {
    pub fn new(service: Arc<PaymentService>) -> Self {
        Self { service }
    }

    /// Run the MCP server with stdio transport
    pub async fn run(self) -> Result<()> {
        info!("Starting MCP server with stdio transport");
        let reader = BufReader::new(tokio::io::stdin());
        let writer = tokio::io::stdout();
        self.serve(reader, writer).await
    }

    /// Serve requests from `reader` until EOF
    pub async fn serve<R, W>(&self, mut reader: R, mut writer: W) -> Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        loop {
            let mut line = String::new();
            match reader.read_line(&mut line).await {
                Ok(0) => break, // EOF
                Ok(_) => {
                    let trimmed = line.trim();
                    if trimmed.is_empty() {
                        continue;
                    }

                    for message in self.handle_line(trimmed).await {
                        let encoded = serde_json::to_string(&message)?;
                        writer.write_all(encoded.as_bytes()).await?;
                        writer.write_all(b"\n").await?;
                    }
                    writer.flush().await?;
                }
                Err(e) => {
                    error!("Error reading from stdin: {}", e);
                    break;
                }
            }
        }

        Ok(())
    }

    /// Messages to send back for one request line (possibly none)
    pub async fn handle_line(&self, line: &str) -> Vec<Value> {
        let request: Value = match serde_json::from_str(line) {
            Ok(req) => req,
            Err(e) => {
                error!("Failed to parse JSON request: {}", e);
                return Vec::new();
            }
        };

        let method = request["method"].as_str().unwrap_or("");
        let id = request["id"].clone();

        match method {
            "initialize" => vec![handle_initialize(&request)],
            "tools/list" => vec![handle_tools_list(&request)],
            "tools/call" => vec![handle_tools_call(&self.service, &request).await],
            _ if id.is_null() => {
                info!("Received notification: {}", method);
                Vec::new()
            }
            _ => {
                error!("Unknown method: {}", method);
                vec![method_not_found(id)]
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::GatewaySettings;

    fn server() -> MCPServer {
        let service = PaymentService::from_settings(&GatewaySettings::default()).unwrap();
        MCPServer::new(Arc::new(service))
    }

    #[tokio::test]
    async fn test_initialize_replies_once() {
        let server = server();
        let replies = server
            .handle_line(r#"{"jsonrpc":"2.0","id":1,"method":"initialize","params":{}}"#)
            .await;
        assert_eq!(replies.len(), 1);
        assert_eq!(replies[0]["id"], 1);
        assert_eq!(replies[0]["result"]["protocolVersion"], PROTOCOL_VERSION);

        // the client's initialized notification is accepted silently
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/initialized"}"#)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn test_notifications_and_garbage_get_no_reply() {
        let server = server();
        assert!(server
            .handle_line(r#"{"jsonrpc":"2.0","method":"notifications/cancelled"}"#)
            .await
            .is_empty());
        assert!(server.handle_line("not json").await.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_method() {
        let replies = server()
            .handle_line(r#"{"jsonrpc":"2.0","id":"x","method":"resources/list"}"#)
            .await;
        assert_eq!(replies[0]["id"], "x");
        assert_eq!(replies[0]["error"]["code"], METHOD_NOT_FOUND);
    }

    #[tokio::test]
    async fn test_serve_round_trip() {
        let input = concat!(
            r#"{"jsonrpc":"2.0","id":1,"method":"tools/list"}"#,
            "\n\n",
            r#"{"jsonrpc":"2.0","id":2,"method":"tools/call","params":{"name":"initiate_payment","arguments":{"amount":100,"transactionId":"TXN-001","successUrl":"https://shop.example.com/ok","failureUrl":"https://shop.example.com/fail"}}}"#,
            "\n"
        );
        let mut output = Vec::new();
        server().serve(input.as_bytes(), &mut output).await.unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0]["result"]["tools"].as_array().unwrap().len(), 7);

        let call = &lines[1]["result"];
        assert_eq!(call["isError"], false);
        assert_eq!(
            call["structuredContent"]["paymentData"]["signature"],
            "NAmQNA4frUMSFqdX8BSoDVytAF52pKOFK4KUCWKPR2U="
        );
    }
}
