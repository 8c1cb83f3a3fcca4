use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::{TcpListener, TcpStream};
use tokio::task;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::EnvFilter;

use crate::codec::{Limits, ProtocolError};
use crate::config::Config;
use crate::connection::Connection;
use crate::dispatch::Dispatcher;
use crate::frame::Frame;
use crate::store::Store;
use crate::Error;

/// Opens the configured storage and serves clients until the listener fails.
pub async fn run(config: Config) -> Result<(), Error> {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init()
        .map_err(|e| debug!("Failed to initialize global tracing: {}", e));

    let db = config.storage.open_db()?;
    let dispatcher = Dispatcher::new(Arc::new(Store::new(db)));

    let listener = TcpListener::bind((config.bind.as_str(), config.port)).await?;
    info!(
        storage = ?config.storage,
        "ordis listening on {}",
        listener.local_addr()?
    );

    serve(listener, dispatcher, config.limits).await
}

/// Accepts connections on an already bound listener, one task per client.
pub async fn serve(
    listener: TcpListener,
    dispatcher: Dispatcher,
    limits: Limits,
) -> Result<(), Error> {
    loop {
        let (socket, client_address) = listener.accept().await?;
        let dispatcher = dispatcher.clone();
        info!("Accepted connection from {:?}", client_address);

        tokio::spawn(async move {
            if let Err(e) = handle_connection(socket, client_address, dispatcher, limits).await {
                error!(error = %e, "Connection failed");
            }
        });
    }
}

#[instrument(
    name = "connection",
    skip(stream, dispatcher, limits),
    fields(connection_id, client_address)
)]
async fn handle_connection(
    stream: TcpStream,
    client_address: SocketAddr,
    dispatcher: Dispatcher,
    limits: Limits,
) -> Result<(), Error> {
    let mut conn = Connection::new(stream, client_address, limits);

    tracing::Span::current()
        .record("connection_id", conn.id.to_string())
        .record("client_address", client_address.to_string());

    loop {
        let command = match conn.read_command().await {
            Ok(Some(command)) => command,
            Ok(None) => break,
            Err(ProtocolError::Io(e)) => return Err(e.into()),
            Err(e) => {
                // The stream can't be resynchronized after corrupt framing.
                warn!(error = %e, "Closing connection after protocol error");
                conn.write_frame(Frame::Error(format!("ERR {e}"))).await?;
                break;
            }
        };

        debug!("Received command from client: {:?}", command);
        // Commands wait on the shared lock and, with fsync, on the disk.
        let worker = dispatcher.clone();
        let span = tracing::Span::current();
        let response =
            task::spawn_blocking(move || span.in_scope(|| worker.dispatch(command))).await?;
        debug!("Sending response to client: {}", response.frame);

        conn.write_frame(response.frame).await?;

        if response.close {
            break;
        }
    }

    info!("Connection closed");
    Ok(())
}
