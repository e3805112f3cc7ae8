//! Broadcast engine control channel
//!
//! Line protocol over TCP: one connection per command, one command line
//! out, one response line back, then close. The whole exchange shares a
//! single timeout.

use crate::error::{Error, Result};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ControlClient {
    addr: String,
    namespace: String,
    timeout: Duration,
}

impl ControlClient {
    pub fn new(addr: impl Into<String>, namespace: impl Into<String>, timeout: Duration) -> Self {
        Self {
            addr: addr.into(),
            namespace: namespace.into(),
            timeout,
        }
    }

    /// Skip the track currently on air
    pub async fn skip(&self) -> Result<String> {
        self.send("skip").await
    }

    /// Ask the engine to re-read its playlist file
    pub async fn reload(&self) -> Result<String> {
        self.send("reload").await
    }

    /// Engine's description of the current track
    pub async fn current(&self) -> Result<String> {
        self.send("current").await
    }

    /// Open a session, send `<namespace>.<command>`, return the response line
    pub async fn send(&self, command: &str) -> Result<String> {
        let line = format!("{}.{}\n", self.namespace, command);

        let exchange = async {
            let mut stream = TcpStream::connect(&self.addr).await?;
            stream.write_all(line.as_bytes()).await?;
            stream.flush().await?;

            let mut reader = BufReader::new(stream);
            let mut response = String::new();
            let read = reader.read_line(&mut response).await?;
            Ok::<_, std::io::Error>((read, response))
        };

        let (read, response) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| Error::ControlChannel(format!("{} timed out after {:?}", command, self.timeout)))?
            .map_err(|e| Error::ControlChannel(format!("{} to {}: {}", command, self.addr, e)))?;

        if read == 0 {
            return Err(Error::ControlChannel(format!("{}: connection closed without response", command)));
        }

        let response = response.trim().to_string();
        debug!(command, response = %response, "Control command answered");
        Ok(response)
    }
}
