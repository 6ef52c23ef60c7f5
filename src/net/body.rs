//! Streaming response bodies with tee support.
//!
//! A fetch response body is a one-shot chunk stream. The interceptor must
//! read it for the session log while leaving the original fully consumable
//! by the caller, so [`ResponseBody::tee`] splits one stream into two
//! independent ones, mirroring `Response.clone()`.

use std::pin::Pin;
use std::task::{Context, Poll};

use futures::Stream;
use tokio::sync::mpsc;

/// A response body read that failed mid-stream.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct BodyError(pub String);

/// Producer half of a streaming body, for transports that deliver chunks
/// as they arrive.
pub struct BodySender {
    tx: mpsc::UnboundedSender<Result<Vec<u8>, BodyError>>,
}

impl BodySender {
    pub fn send_chunk(&self, chunk: Vec<u8>) {
        // The reader may have been dropped; nothing to do then.
        let _ = self.tx.send(Ok(chunk));
    }

    pub fn fail(self, message: impl Into<String>) {
        let _ = self.tx.send(Err(BodyError(message.into())));
    }
}

/// One-shot chunked response body.
#[derive(Debug)]
pub struct ResponseBody {
    rx: mpsc::UnboundedReceiver<Result<Vec<u8>, BodyError>>,
}

impl ResponseBody {
    /// A body fed lazily through the returned sender. The stream ends when
    /// the sender is dropped.
    pub fn channel() -> (BodySender, ResponseBody) {
        let (tx, rx) = mpsc::unbounded_channel();
        (BodySender { tx }, ResponseBody { rx })
    }

    pub fn empty() -> Self {
        let (_tx, body) = Self::channel();
        body
    }

    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self::from_chunks(vec![bytes])
    }

    pub fn from_text(text: impl Into<String>) -> Self {
        Self::from_bytes(text.into().into_bytes())
    }

    pub fn from_chunks(chunks: Vec<Vec<u8>>) -> Self {
        let (tx, body) = Self::channel();
        for chunk in chunks {
            tx.send_chunk(chunk);
        }
        body
    }

    /// Splits this body into two streams that each yield every remaining
    /// chunk. The forwarding task keeps feeding whichever side is still
    /// alive, so dropping one clone never starves the other.
    pub fn tee(mut self) -> (ResponseBody, ResponseBody) {
        let (left_tx, left_rx) = mpsc::unbounded_channel();
        let (right_tx, right_rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            while let Some(chunk) = self.rx.recv().await {
                let _ = left_tx.send(chunk.clone());
                let _ = right_tx.send(chunk);
            }
        });
        (ResponseBody { rx: left_rx }, ResponseBody { rx: right_rx })
    }

    /// Drains the stream into a single buffer.
    pub async fn bytes(mut self) -> Result<Vec<u8>, BodyError> {
        let mut out = Vec::new();
        while let Some(chunk) = self.rx.recv().await {
            out.extend_from_slice(&chunk?);
        }
        Ok(out)
    }

    /// Drains the stream and decodes it as text. Invalid UTF-8 is replaced
    /// rather than failing, matching `Response.text()` semantics.
    pub async fn text(self) -> Result<String, BodyError> {
        let bytes = self.bytes().await?;
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }
}

impl Stream for ResponseBody {
    type Item = Result<Vec<u8>, BodyError>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}
