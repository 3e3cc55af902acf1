//! Lazily-connecting handle over one server transport.

use std::collections::HashMap;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::Mutex;

use crate::mcp::client::{McpClientError, RpcConnection, ToolDescriptor, ToolOutcome};
use crate::mcp::transport::TransportDescriptor;

/// One connected-or-connectable server transport.
///
/// The underlying session (a spawned process or an HTTP session) is opened
/// on first use, so composing a registry never blocks on unreachable
/// servers. Calls on one handle are serialized; link-merged handles are
/// shared across compositions behind an `Arc`.
#[derive(Debug)]
pub struct TransportHandle {
    descriptor: TransportDescriptor,
    request_timeout: Duration,
    connection: Mutex<Option<RpcConnection>>,
}

impl TransportHandle {
    pub fn new(descriptor: TransportDescriptor, request_timeout: Duration) -> Self {
        Self {
            descriptor,
            request_timeout,
            connection: Mutex::new(None),
        }
    }

    pub fn descriptor(&self) -> &TransportDescriptor {
        &self.descriptor
    }

    pub async fn is_connected(&self) -> bool {
        self.connection.lock().await.is_some()
    }

    /// Open the session eagerly. Idempotent.
    pub async fn connect(&self) -> Result<(), McpClientError> {
        let mut guard = self.connection.lock().await;
        if guard.is_none() {
            *guard = Some(RpcConnection::open(&self.descriptor, self.request_timeout).await?);
        }
        Ok(())
    }

    pub async fn list_tools(&self) -> Result<Vec<ToolDescriptor>, McpClientError> {
        let mut guard = self.connection.lock().await;
        let connection = Self::ensure(&mut guard, &self.descriptor, self.request_timeout).await?;
        connection.list_tools(self.request_timeout).await
    }

    pub async fn call_tool(
        &self,
        name: &str,
        arguments: HashMap<String, Value>,
    ) -> Result<ToolOutcome, McpClientError> {
        let mut guard = self.connection.lock().await;
        let connection = Self::ensure(&mut guard, &self.descriptor, self.request_timeout).await?;
        connection.call_tool(name, arguments, self.request_timeout).await
    }

    /// Tear the session down; the handle stays connectable.
    pub async fn disconnect(&self) {
        if let Some(mut connection) = self.connection.lock().await.take() {
            connection.close();
        }
    }

    async fn ensure<'a>(
        guard: &'a mut Option<RpcConnection>,
        descriptor: &TransportDescriptor,
        timeout: Duration,
    ) -> Result<&'a mut RpcConnection, McpClientError> {
        if guard.is_none() {
            *guard = Some(RpcConnection::open(descriptor, timeout).await?);
        }
        guard
            .as_mut()
            .ok_or_else(|| McpClientError::Protocol("connection unavailable".to_string()))
    }
}
