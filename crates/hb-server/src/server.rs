use std::net::SocketAddr;
use std::sync::Arc;

use hb_ledger::SourceStore;
use hb_protocol::{
    error_codes, read_message, write_message, HbMessage, ProtocolResult, StoreRequest,
    PROTOCOL_VERSION,
};
use hb_sync::{LocalStore, RemoteStore};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::Semaphore;
use tracing::{debug, info, warn};

use crate::config::ServerConfig;
use crate::error::ServerResult;
use crate::handler::{dispatch, error_code};

/// hashback store server.
pub struct HbServer {
    config: ServerConfig,
    store: Arc<dyn RemoteStore>,
}

impl HbServer {
    pub fn new(config: ServerConfig, store: Arc<dyn RemoteStore>) -> Self {
        Self { config, store }
    }

    /// Serve the on-disk store at `config.store_root`.
    pub fn open(config: ServerConfig) -> ServerResult<Self> {
        let store = SourceStore::open(&config.store_root, config.ledger.clone())?;
        Ok(Self::new(config, Arc::new(LocalStore::new(Arc::new(store)))))
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind `config.bind_addr` and serve until the listener fails.
    pub async fn serve(self) -> ServerResult<()> {
        let listener = TcpListener::bind(self.config.bind_addr).await?;
        self.serve_on(listener).await
    }

    /// Serve connections from an already bound listener.
    pub async fn serve_on(self, listener: TcpListener) -> ServerResult<()> {
        let uuid = self.store.get_uuid().await?;
        info!(addr = %listener.local_addr()?, %uuid, "hashback server listening");
        let slots = Arc::new(Semaphore::new(self.config.max_connections.max(1)));
        let uuid: Arc<str> = uuid.into();

        loop {
            let (stream, peer) = listener.accept().await?;
            let Ok(permit) = Arc::clone(&slots).try_acquire_owned() else {
                warn!(%peer, "connection limit reached, refusing");
                continue;
            };
            let store = Arc::clone(&self.store);
            let uuid = Arc::clone(&uuid);
            let max_frame = self.config.max_frame_size;
            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, peer, store, &uuid, max_frame).await {
                    warn!(%peer, error = %e, "connection closed with error");
                }
                drop(permit);
            });
        }
    }
}

/// Answer frames from one peer until it hangs up.
///
/// Failed requests are answered with an `Error` frame and the connection
/// stays open; a broken frame ends the connection.
async fn handle_connection(
    mut stream: TcpStream,
    peer: SocketAddr,
    store: Arc<dyn RemoteStore>,
    uuid: &str,
    max_frame: usize,
) -> ProtocolResult<()> {
    stream.set_nodelay(true)?;
    match read_message(&mut stream, max_frame).await? {
        Some(HbMessage::Hello { version }) if version == PROTOCOL_VERSION => {
            let ack = HbMessage::HelloAck {
                version: PROTOCOL_VERSION,
                uuid: uuid.to_string(),
            };
            write_message(&mut stream, &ack, max_frame).await?;
        }
        Some(HbMessage::Hello { version }) => {
            let refusal = HbMessage::Error {
                id: 0,
                code: error_codes::BAD_REQUEST,
                message: format!("unsupported protocol version {version}"),
            };
            return write_message(&mut stream, &refusal, max_frame).await;
        }
        Some(other) => {
            debug!(%peer, kind = other.type_name(), "frame before handshake");
            return Ok(());
        }
        None => return Ok(()),
    }
    debug!(%peer, "handshake complete");

    while let Some(msg) = read_message(&mut stream, max_frame).await? {
        let (id, request) = match msg {
            HbMessage::Call { id, request } => (id, request),
            HbMessage::HasBytes { id, hash } => (id, StoreRequest::HasBytes { hash }),
            HbMessage::PushBytes {
                id,
                hash,
                offset,
                data,
            } => (id, StoreRequest::PutBytes { hash, offset, data }),
            other => {
                let reply = HbMessage::Error {
                    id: other.id().unwrap_or(0),
                    code: error_codes::BAD_REQUEST,
                    message: format!("unexpected {} frame", other.type_name()),
                };
                write_message(&mut stream, &reply, max_frame).await?;
                continue;
            }
        };

        let name = request.name();
        let reply = match dispatch(store.as_ref(), request).await {
            Ok(response) => HbMessage::Reply { id, response },
            Err(e) => {
                warn!(%peer, request = name, error = %e, "request failed");
                HbMessage::Error {
                    id,
                    code: error_code(&e),
                    message: e.to_string(),
                }
            }
        };
        write_message(&mut stream, &reply, max_frame).await?;
    }
    debug!(%peer, "peer disconnected");
    Ok(())
}
