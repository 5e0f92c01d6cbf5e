//! The FIFO of pending queries: one `Task` per `Client::submit*` call,
//! delivered to the engine's background loop over an unbounded
//! `tokio::sync::mpsc` channel.

use std::pin::Pin;

use tokio::io::AsyncWrite;
use tokio::sync::{mpsc, oneshot};

use crate::col::ColumnDescriptor;
use crate::constant::ServerStatusFlags;
use crate::error::Error;
use crate::value::{Param, Value};

/// Server OK packet, decoded (teacher: `protocol/response.rs::OkPayload`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: ServerStatusFlags,
    pub warnings: u16,
}

/// A fully materialized result set: ordered columns and row-major values.
#[derive(Debug, Clone, Default)]
pub struct Resultset {
    pub columns: Vec<ColumnDescriptor>,
    pub rows: Vec<Vec<Value>>,
}

#[derive(Debug)]
pub enum QueryOutcome {
    Result(OkPayload),
    Resultset(Resultset),
}

pub type Result<T> = core::result::Result<T, Error>;

/// Called once per variable-length column as its row is being decoded, with
/// the column's wire byte length, its descriptor, the zero-based index of
/// the row within the current resultset, and the rows already decoded for
/// this resultset. A `Some` return routes the column's bytes into that sink
/// instead of the row matrix; a `None` return keeps the usual in-memory
/// decode.
pub type LongDataCallback = Box<
    dyn FnMut(
            u64,
            &ColumnDescriptor,
            usize,
            &[Vec<Value>],
        ) -> Option<Pin<Box<dyn AsyncWrite + Send + Unpin>>>
        + Send,
>;

pub enum TaskKind {
    Query {
        sql: String,
        params: Vec<Param>,
        on_long_data: Option<LongDataCallback>,
    },
    SelectDatabase {
        name: String,
    },
}

pub struct Task {
    pub kind: TaskKind,
    pub reply: oneshot::Sender<Result<QueryOutcome>>,
}

/// Handle held by every `Client`; cloning it is cheap (it's a channel
/// sender). Submitting after the engine has shut down fails synchronously
/// rather than queuing silently.
#[derive(Clone)]
pub struct TaskQueue {
    sender: mpsc::UnboundedSender<Task>,
}

impl TaskQueue {
    pub fn submit(&self, task: Task) -> Result<()> {
        self.sender.send(task).map_err(|_| Error::Disconnected)
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

pub fn channel() -> (TaskQueue, mpsc::UnboundedReceiver<Task>) {
    let (sender, receiver) = mpsc::unbounded_channel();
    (TaskQueue { sender }, receiver)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn submit_delivers_to_receiver() {
        let (queue, mut receiver) = channel();
        let (reply_tx, _reply_rx) = oneshot::channel();

        queue
            .submit(Task {
                kind: TaskKind::SelectDatabase { name: "app".to_string() },
                reply: reply_tx,
            })
            .unwrap();

        let task = receiver.recv().await.unwrap();
        assert!(matches!(task.kind, TaskKind::SelectDatabase { .. }));
    }

    #[tokio::test]
    async fn submit_after_receiver_dropped_fails() {
        let (queue, receiver) = channel();
        drop(receiver);

        let (reply_tx, _reply_rx) = oneshot::channel();
        let err = queue
            .submit(Task {
                kind: TaskKind::SelectDatabase { name: "app".to_string() },
                reply: reply_tx,
            })
            .unwrap_err();
        assert!(matches!(err, Error::Disconnected));
    }
}
