use futures::{SinkExt, StreamExt};
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tokio_util::codec::Framed;
use uuid::Uuid;

use crate::codec::{CommandCodec, Limits, ProtocolError};
use crate::command::Command;
use crate::frame::Frame;

/// One client connection. Requests are read and replies written strictly in order.
pub struct Connection {
    pub id: Uuid,
    pub client_address: SocketAddr,
    framed: Framed<TcpStream, CommandCodec>,
}

impl Connection {
    pub fn new(stream: TcpStream, client_address: SocketAddr, limits: Limits) -> Connection {
        Connection {
            id: Uuid::new_v4(),
            client_address,
            framed: Framed::new(stream, CommandCodec::new(limits)),
        }
    }

    /// Returns `None` once the client has closed the connection.
    pub async fn read_command(&mut self) -> Result<Option<Command>, ProtocolError> {
        self.framed.next().await.transpose()
    }

    pub async fn write_frame(&mut self, frame: Frame) -> Result<(), ProtocolError> {
        self.framed.send(frame).await
    }
}
