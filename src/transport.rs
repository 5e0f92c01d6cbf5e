//! Owns the one `TcpStream` this crate ever opens. Connects lazily,
//! reconnects with a fixed delay on failure, and gives up permanently once
//! `max_retry_times` is exhausted.

use tokio::io::BufReader;
use tokio::net::TcpStream;

use crate::error::{Error, Result};
use crate::framed::FramedReader;
use crate::opts::Opts;

pub struct ReliableTransport {
    host: String,
    port: u16,
    tcp_nodelay: bool,
    retry_delay_time: std::time::Duration,
    max_retry_times: Option<u32>,
    conn: Option<FramedReader<BufReader<TcpStream>>>,
    closed: bool,
}

impl ReliableTransport {
    pub fn new(opts: &Opts) -> Self {
        Self {
            host: opts.host.clone(),
            port: opts.port,
            tcp_nodelay: opts.tcp_nodelay,
            retry_delay_time: opts.retry_delay_time,
            max_retry_times: opts.max_retry_times,
            conn: None,
            closed: false,
        }
    }

    /// Connect if not already connected. Retries with `retry_delay_time`
    /// between attempts; once `max_retry_times` is exhausted the transport
    /// is marked closed permanently and every future call fails fast.
    pub async fn ensure_connected(&mut self) -> Result<&mut FramedReader<BufReader<TcpStream>>> {
        if self.closed {
            return Err(Error::Disconnected);
        }
        if self.conn.is_some() {
            return Ok(self.conn.as_mut().unwrap());
        }

        let mut retries_left = self.max_retry_times;
        loop {
            match TcpStream::connect((self.host.as_str(), self.port)).await {
                Ok(stream) => {
                    stream.set_nodelay(self.tcp_nodelay)?;
                    self.conn = Some(FramedReader::new(BufReader::new(stream)));
                    return Ok(self.conn.as_mut().unwrap());
                }
                Err(e) => match retries_left {
                    Some(0) => {
                        self.closed = true;
                        return Err(Error::Disconnected);
                    }
                    Some(n) => {
                        retries_left = Some(n - 1);
                        tracing::warn!(error = %e, retries_left = n - 1, "reconnect failed, retrying");
                        tokio::time::sleep(self.retry_delay_time).await;
                    }
                    None => {
                        tracing::warn!(error = %e, "reconnect failed, retrying indefinitely");
                        tokio::time::sleep(self.retry_delay_time).await;
                    }
                },
            }
        }
    }

    /// Drop the live socket without closing the transport; the next
    /// `ensure_connected()` reconnects from scratch. Used after an IO error
    /// mid-session, before authentication repeats.
    pub fn mark_broken(&mut self) {
        self.conn = None;
    }

    /// Close permanently. Further `ensure_connected()` calls fail fast with
    /// `Error::Disconnected`.
    pub fn close(&mut self) {
        self.closed = true;
        self.conn = None;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn closed_transport_fails_fast() {
        let opts = Opts {
            host: "127.0.0.1".to_string(),
            port: 1,
            max_retry_times: Some(0),
            retry_delay_time: Duration::from_millis(1),
            ..Opts::default()
        };
        let mut transport = ReliableTransport::new(&opts);
        assert!(transport.ensure_connected().await.is_err());
        assert!(transport.is_closed());
        assert!(matches!(
            transport.ensure_connected().await,
            Err(Error::Disconnected)
        ));
    }

    #[test]
    fn close_marks_closed_and_drops_conn() {
        let opts = Opts::default();
        let mut transport = ReliableTransport::new(&opts);
        transport.close();
        assert!(transport.is_closed());
    }
}
