//! JSON-RPC Server
//!
//! JSON-RPC 2.0 over HTTP and WebSocket on one localhost port. Progress
//! subscriptions need the WebSocket transport.

use crate::error::{to_rpc_error, ServerError};
use crate::handler::RpcHandler;
use crate::types::{
    CloseSessionRequest, StatusRequest, StoreRequest, SubmitRequest, SubscribeRequest,
    UpdateContactRequest,
};
use jsonrpsee::core::SubscriptionResult;
use jsonrpsee::server::{Server, ServerHandle};
use jsonrpsee::types::ErrorObjectOwned;
use jsonrpsee::{PendingSubscriptionSink, RpcModule, SubscriptionMessage};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

const DEFAULT_RPC_HOST: &str = "127.0.0.1";
const DEFAULT_RPC_PORT: u16 = 9630;

/// An attached progress stream keeps its session alive at this rate
const SESSION_KEEPALIVE: Duration = Duration::from_secs(30);

/// Notification method carrying progress events
pub const PROGRESS_NOTIFICATION: &str = "sync.progress";

/// RPC Server Configuration
#[derive(Debug, Clone)]
pub struct RpcServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for RpcServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_RPC_HOST.to_string(),
            port: DEFAULT_RPC_PORT,
        }
    }
}

fn register_error<E: std::fmt::Display>(method: &'static str) -> impl FnOnce(E) -> ServerError {
    move |e| ServerError::Register {
        method,
        reason: e.to_string(),
    }
}

/// Stream a session's progress events until the session ends or the
/// client goes away. A client disconnect closes the session; while the
/// stream is attached the session counts as active.
async fn stream_progress(
    handler: Arc<RpcHandler>,
    params: jsonrpsee::types::Params<'static>,
    pending: PendingSubscriptionSink,
) -> SubscriptionResult {
    let req: SubscribeRequest = match params.parse() {
        Ok(req) => req,
        Err(e) => {
            pending.reject(e).await;
            return Ok(());
        }
    };
    let mut events = match handler.sessions().subscribe(&req.session_id) {
        Ok(events) => events,
        Err(e) => {
            pending.reject(to_rpc_error(e)).await;
            return Ok(());
        }
    };

    let sink = pending.accept().await?;
    debug!(session_id = %req.session_id, "Progress subscriber attached");

    let mut keepalive = tokio::time::interval(SESSION_KEEPALIVE);
    loop {
        tokio::select! {
            _ = keepalive.tick() => {
                handler.sessions().touch(&req.session_id);
            }
            event = events.recv() => match event {
                Some(event) => {
                    let message = SubscriptionMessage::from_json(&event)?;
                    if sink.send(message).await.is_err() {
                        handler.sessions().close(&req.session_id);
                        break;
                    }
                }
                // Session closed or a newer subscriber took over
                None => break,
            },
            _ = sink.closed() => {
                info!(session_id = %req.session_id, "Progress subscriber disconnected");
                handler.sessions().close(&req.session_id);
                break;
            }
        }
    }
    Ok(())
}

/// RPC Server
pub struct RpcServer {
    config: RpcServerConfig,
    handler: Arc<RpcHandler>,
}

impl RpcServer {
    pub fn new(config: RpcServerConfig, handler: Arc<RpcHandler>) -> Self {
        Self { config, handler }
    }

    fn module(&self) -> Result<RpcModule<()>, ServerError> {
        let mut module = RpcModule::new(());

        let handler = self.handler.clone();
        module
            .register_method("session.open.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.open_session())
            })
            .map_err(register_error("session.open.v1"))?;

        let handler = self.handler.clone();
        module
            .register_method("session.close.v1", move |params, _, _| {
                let req: CloseSessionRequest = params.parse()?;
                Ok::<_, ErrorObjectOwned>(handler.close_session(req))
            })
            .map_err(register_error("session.close.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("sync.submit.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: SubmitRequest = params.parse()?;
                    handler.submit(req).await
                }
            })
            .map_err(register_error("sync.submit.v1"))?;

        let handler = self.handler.clone();
        module
            .register_method("sync.status.v1", move |params, _, _| {
                let req: StatusRequest = params.parse()?;
                handler.status(req)
            })
            .map_err(register_error("sync.status.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("overdue.evaluate.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StoreRequest = params.parse()?;
                    handler.evaluate_overdue(req).await
                }
            })
            .map_err(register_error("overdue.evaluate.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("store.schema.ensure.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StoreRequest = params.parse()?;
                    handler.ensure_schema(req).await
                }
            })
            .map_err(register_error("store.schema.ensure.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("contacts.list.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: StoreRequest = params.parse()?;
                    handler.list_contacts(req).await
                }
            })
            .map_err(register_error("contacts.list.v1"))?;

        let handler = self.handler.clone();
        module
            .register_async_method("contacts.update.v1", move |params, _, _| {
                let handler = handler.clone();
                async move {
                    let req: UpdateContactRequest = params.parse()?;
                    handler.update_contact(req).await
                }
            })
            .map_err(register_error("contacts.update.v1"))?;

        let handler = self.handler.clone();
        module
            .register_method("admin.stats.v1", move |_, _, _| {
                Ok::<_, ErrorObjectOwned>(handler.stats())
            })
            .map_err(register_error("admin.stats.v1"))?;

        let handler = self.handler.clone();
        module
            .register_subscription(
                "sync.progress.subscribe.v1",
                PROGRESS_NOTIFICATION,
                "sync.progress.unsubscribe.v1",
                move |params, pending, _, _| stream_progress(handler.clone(), params, pending),
            )
            .map_err(register_error("sync.progress.subscribe.v1"))?;

        Ok(module)
    }

    /// Start the JSON-RPC server, returning the bound address
    pub async fn start(self) -> Result<(SocketAddr, ServerHandle), ServerError> {
        let addr = format!("{}:{}", self.config.host, self.config.port);
        let module = self.module()?;

        let server = Server::builder()
            .build(&addr)
            .await
            .map_err(|e| ServerError::Bind {
                addr: addr.clone(),
                reason: e.to_string(),
            })?;
        let local_addr = server.local_addr().map_err(|e| ServerError::Bind {
            addr: addr.clone(),
            reason: e.to_string(),
        })?;

        info!(addr = %local_addr, "JSON-RPC server started");
        Ok((local_addr, server.start(module)))
    }
}
