//! Public entry point: connect once, then submit queries from as many
//! callers as you like. Every `Client` is a handle onto a single background
//! task (the `ProtocolEngine`) serving one FIFO of `Task`s, the way the
//! teacher's `tokio::Conn` owns exactly one socket per connection.

use std::pin::Pin;

use tokio::io::AsyncRead;
use tokio::sync::{broadcast, oneshot};

pub use crate::engine::ClientEvent;
use crate::engine::ProtocolEngine;
use crate::error::{Error, Result};
use crate::opts::Opts;
use crate::task::{self, LongDataCallback, OkPayload, QueryOutcome, Resultset, Task, TaskKind};
use crate::value::Param;

/// A connected client. Cloning it is cheap: all clones share the same
/// background engine task and its task queue.
#[derive(Clone)]
pub struct Client {
    queue: task::TaskQueue,
}

impl Client {
    /// Connect and authenticate, then spawn the background engine task.
    /// Returns once the handshake completes, so a caller never submits a
    /// query against a socket that hasn't authenticated yet.
    pub async fn connect(opts: Opts) -> Result<Self> {
        Self::connect_with_events(opts, None).await
    }

    /// Same as [`Client::connect`], additionally returning a receiver for
    /// the engine's lifecycle events (handshake, login failure, cache
    /// insertions, ...).
    pub async fn connect_with_events(
        opts: Opts,
        event_capacity: Option<usize>,
    ) -> Result<Self> {
        let events = event_capacity.map(|cap| broadcast::channel(cap).0);
        let mut engine = ProtocolEngine::new(opts, events);
        engine.handshake().await?;

        let (queue, receiver) = task::channel();
        tokio::spawn(engine.run(receiver));

        Ok(Self { queue })
    }

    /// Run a query and collect its full result set (or its `OkPayload` for
    /// DML/DDL) in memory. Variable-length columns are decoded as owned
    /// `Value`s.
    pub async fn query(&self, sql: impl Into<String>, params: Vec<Param>) -> Result<QueryOutcome> {
        self.submit(sql.into(), params, None).await
    }

    /// Run a query, routing each variable-length column through
    /// `on_long_data` instead of buffering it into the row matrix. Returning
    /// `None` from the callback for a given column falls back to the usual
    /// in-memory decode for that column.
    pub async fn query_with_sinks(
        &self,
        sql: impl Into<String>,
        params: Vec<Param>,
        on_long_data: LongDataCallback,
    ) -> Result<Resultset> {
        match self.submit(sql.into(), params, Some(on_long_data)).await? {
            QueryOutcome::Resultset(rs) => Ok(rs),
            QueryOutcome::Result(_) => Err(Error::protocol(
                "query_with_sinks was called against a statement that returned no result set",
            )),
        }
    }

    /// `COM_INIT_DB`: switch the connection's default database.
    pub async fn select_database(&self, name: impl Into<String>) -> Result<OkPayload> {
        let (reply, rx) = oneshot::channel();
        self.queue.submit(Task {
            kind: TaskKind::SelectDatabase { name: name.into() },
            reply,
        })?;
        match rx.await.map_err(|_| Error::Disconnected)?? {
            QueryOutcome::Result(ok) => Ok(ok),
            QueryOutcome::Resultset(_) => Err(Error::from_debug(
                "engine returned a resultset for a SelectDatabase task",
            )),
        }
    }

    /// `true` once the engine has given up reconnecting; every further
    /// `query`/`select_database` call will fail immediately.
    pub fn is_closed(&self) -> bool {
        self.queue.is_closed()
    }

    async fn submit(
        &self,
        sql: String,
        params: Vec<Param>,
        on_long_data: Option<LongDataCallback>,
    ) -> Result<QueryOutcome> {
        let (reply, rx) = oneshot::channel();
        self.queue.submit(Task {
            kind: TaskKind::Query { sql, params, on_long_data },
            reply,
        })?;
        rx.await.map_err(|_| Error::Disconnected)?
    }
}

/// Convenience wrapper so a [`tokio::io::AsyncRead`] source (a file, a
/// network body, anything implementing the trait) can be passed directly
/// where a [`Param`] is expected, without the caller naming the boxed
/// trait object type.
pub fn stream_param(source: impl AsyncRead + Send + Unpin + 'static) -> Param {
    Param::Stream(Pin::new(Box::new(source)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_param_builds_a_stream_variant() {
        let p = stream_param(std::io::Cursor::new(b"abc".to_vec()));
        assert!(p.is_stream());
    }
}
