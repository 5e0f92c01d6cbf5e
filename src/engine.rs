//! The protocol engine: the single task that owns the transport, drives the
//! handshake, and turns queued `Task`s into `COM_STMT_PREPARE`/`EXECUTE`
//! round trips. Grounded in the teacher's `tokio/conn.rs` driver loop and
//! `protocol/command/prepared.rs`'s `Exec` state machine, generalized to a
//! `FramedReader`-driven straight-line `.await` style instead of the
//! teacher's `Action::NeedPacket` generator indirection.

use tokio::io::BufReader;
use tokio::net::TcpStream;
use tokio::sync::{broadcast, mpsc};

use crate::auth;
use crate::binary::{Reader, write_int_1, write_int_4};
use crate::col::{self, ColumnDescriptor};
use crate::constant::{CommandByte, ServerStatusFlags};
use crate::error::{Error, Result, ServerError};
use crate::long_data;
use crate::opts::Opts;
use crate::prepared::{self, PreparedCache};
use crate::task::{LongDataCallback, OkPayload, QueryOutcome, Resultset, Task, TaskKind};
use crate::transport::ReliableTransport;
use crate::value::{self, Param, Value};

/// Observer events. No caller is required to subscribe; when nobody is
/// listening, `broadcast::Sender::send` returning an error is ignored.
#[derive(Debug, Clone)]
pub enum ClientEvent {
    Handshake { server_version: String },
    LoginError { code: Option<u16>, message: String },
    Connected,
    PrepareCached { sql: String, statement_id: u32 },
    ColumnDescribed { column: String, sql: String },
}

pub struct ProtocolEngine {
    transport: ReliableTransport,
    opts: Opts,
    cache: PreparedCache,
    current_database: Option<String>,
    events: Option<broadcast::Sender<ClientEvent>>,
}

impl ProtocolEngine {
    pub fn new(opts: Opts, events: Option<broadcast::Sender<ClientEvent>>) -> Self {
        let current_database = opts.database.clone();
        Self {
            transport: ReliableTransport::new(&opts),
            opts,
            cache: PreparedCache::new(),
            current_database,
            events,
        }
    }

    fn emit(&self, event: ClientEvent) {
        if let Some(tx) = &self.events {
            let _ = tx.send(event);
        }
    }

    /// Connect, authenticate, then run until the task channel closes or the
    /// transport gives up permanently.
    /// `Client::connect` awaits the first handshake inline; this is spawned
    /// as a background task afterwards to keep serving queued work.
    pub async fn run(mut self, mut receiver: mpsc::UnboundedReceiver<Task>) {
        while let Some(task) = receiver.recv().await {
            let result = self.process(task.kind).await;
            let lost_connection = is_connection_fatal(&result);
            let _ = task.reply.send(result);

            if lost_connection {
                self.cache.clear();
                self.current_database = self.opts.database.clone();
                self.transport.mark_broken();

                if let Err(e) = self.handshake().await {
                    // Either the transport already gave up (exhausted
                    // retries, `is_closed()` already true) or this was an
                    // auth-level failure against a freshly reconnected
                    // socket. Both are session-fatal: per-task errors
                    // resolve their own task, but losing the session itself
                    // fails the whole queue, so close for good rather than
                    // limping along unauthenticated.
                    tracing::warn!(error = %e, "reconnect after disconnect failed");
                    self.transport.close();
                }
            }

            if self.transport.is_closed() {
                break;
            }
        }
        // `receiver` drops here. Any task still queued behind it resolves to
        // `Disconnected` on the client side when its `oneshot::Sender` is
        // dropped without a reply; nothing further to drain by hand.
    }

    pub async fn handshake(&mut self) -> Result<()> {
        let framed = self.transport.ensure_connected().await?;
        let (server_seq, payload) = framed.read_payload().await?;
        let handshake = auth::read_initial_handshake(&payload)?;
        self.emit(ClientEvent::Handshake {
            server_version: handshake.server_version.clone(),
        });

        let mut plugin_name = handshake.auth_plugin_name.clone();
        let mut challenge = handshake.auth_plugin_data.clone();
        let mut auth_response = self.scramble(&plugin_name, &challenge)?;

        let mut out = Vec::new();
        auth::write_handshake_response(
            &mut out,
            &self.opts.user,
            self.opts.database.as_deref(),
            &plugin_name,
            &auth_response,
            self.opts.character,
        );
        self.write_payload_seq(server_seq.wrapping_add(1), &out).await?;

        loop {
            let (_, payload) = self.transport.ensure_connected().await?.read_payload().await?;
            match payload.first().copied() {
                Some(0x00) => {
                    self.emit(ClientEvent::Connected);
                    return Ok(());
                }
                Some(0xFF) => {
                    let err = decode_err_payload(&payload);
                    if let Error::Server(ServerError { error_code, message, .. }) = &err {
                        self.emit(ClientEvent::LoginError {
                            code: Some(*error_code),
                            message: message.clone(),
                        });
                    }
                    return Err(err);
                }
                Some(0xFE) => {
                    let switch = auth::read_auth_switch_request(&payload)?;
                    plugin_name = switch.plugin_name;
                    challenge = switch.plugin_data;
                    auth_response = self.scramble(&plugin_name, &challenge)?;
                    self.write_payload(&auth_response).await?;
                }
                Some(0x01) => {
                    match auth::read_caching_sha2_fast_auth_result(&payload)? {
                        auth::CachingSha2FastAuthResult::Success => continue,
                        auth::CachingSha2FastAuthResult::FullAuthRequired => {
                            return Err(Error::Unsupported(
                                "caching_sha2_password full authentication requires TLS or RSA key exchange, neither of which this client implements".to_string(),
                            ));
                        }
                    }
                }
                other => {
                    return Err(Error::protocol(format!(
                        "unexpected byte {other:?} during authentication"
                    )));
                }
            }
        }
    }

    fn scramble(&self, plugin_name: &str, challenge: &[u8]) -> Result<Vec<u8>> {
        let password = self.opts.password.as_deref().unwrap_or("");
        match plugin_name {
            "mysql_native_password" => Ok(auth::auth_mysql_native_password(password, challenge).to_vec()),
            "caching_sha2_password" => Ok(auth::auth_caching_sha2_password(password, challenge).to_vec()),
            other => Err(Error::Unsupported(format!("unsupported auth plugin {other}"))),
        }
    }

    async fn process(&mut self, kind: TaskKind) -> Result<QueryOutcome> {
        match kind {
            TaskKind::SelectDatabase { name } => self.select_database(&name).await,
            TaskKind::Query { sql, mut params, on_long_data } => {
                self.query(&sql, &mut params, on_long_data).await
            }
        }
    }

    async fn select_database(&mut self, name: &str) -> Result<QueryOutcome> {
        let mut out = Vec::new();
        write_int_1(&mut out, CommandByte::InitDb as u8);
        out.extend_from_slice(name.as_bytes());
        self.write_payload(&out).await?;

        let (_, payload) = self.read_payload().await?;
        match payload.first().copied() {
            Some(0x00) | Some(0xFE) => {
                let ok = decode_ok_payload(&payload)?;
                self.current_database = Some(name.to_string());
                Ok(QueryOutcome::Result(ok))
            }
            Some(0xFF) => Err(decode_err_payload(&payload)),
            other => Err(Error::protocol(format!("unexpected USE response byte {other:?}"))),
        }
    }

    async fn query(
        &mut self,
        sql: &str,
        params: &mut Vec<Param>,
        on_long_data: Option<LongDataCallback>,
    ) -> Result<QueryOutcome> {
        let handle = self.ensure_prepared(sql).await?;
        if params.len() != handle.params_num as usize {
            return Err(Error::ParamMismatch {
                given: params.len(),
                expected: handle.params_num as usize,
            });
        }
        self.drain_streams(handle.statement_id, params).await?;
        self.execute(handle.statement_id, params, on_long_data).await
    }

    async fn ensure_prepared(&mut self, sql: &str) -> Result<prepared::PreparedHandle> {
        let db_key = self.current_database.clone().unwrap_or_default();
        if let Some(handle) = self.cache.get(&db_key, sql) {
            return Ok(handle);
        }

        let mut out = Vec::new();
        prepared::write_prepare(&mut out, sql);
        self.write_payload(&out).await?;

        let (_, payload) = self.read_payload().await?;
        if payload.first() == Some(&0xFF) {
            return Err(decode_err_payload(&payload));
        }
        let handle = prepared::read_prepare_ok(&payload)?;

        for _ in 0..handle.params_num {
            self.read_payload().await?;
        }
        if handle.params_num > 0 {
            self.read_payload().await?; // EOF
        }
        for _ in 0..handle.columns_num {
            self.read_payload().await?;
        }
        if handle.columns_num > 0 {
            self.read_payload().await?; // EOF
        }

        self.cache.insert(&db_key, sql, handle);
        self.emit(ClientEvent::PrepareCached {
            sql: sql.to_string(),
            statement_id: handle.statement_id,
        });
        Ok(handle)
    }

    async fn execute(
        &mut self,
        statement_id: u32,
        params: &[Param],
        mut on_long_data: Option<LongDataCallback>,
    ) -> Result<QueryOutcome> {
        debug_assert!(
            params.iter().all(|p| !p.is_stream()),
            "stream params must be drained before execute"
        );

        let mut out = Vec::new();
        write_int_1(&mut out, CommandByte::StmtExecute as u8);
        write_int_4(&mut out, statement_id);
        write_int_1(&mut out, 0x00); // CURSOR_TYPE_NO_CURSOR
        write_int_4(&mut out, 1); // iteration count

        if !params.is_empty() {
            value::write_param_null_bitmap(&mut out, params);
            write_int_1(&mut out, 0x01); // new-params-bound-flag
            value::write_param_types(&mut out, params);
            value::write_param_values(&mut out, params)?;
        }

        self.write_payload(&out).await?;

        let (_, payload) = self.read_payload().await?;
        match payload.first().copied() {
            Some(0x00) => Ok(QueryOutcome::Result(decode_ok_payload(&payload)?)),
            Some(0xFF) => Err(decode_err_payload(&payload)),
            _ => {
                let column_count = col::read_column_count(&payload)? as usize;
                let mut columns = Vec::with_capacity(column_count);
                for _ in 0..column_count {
                    let (_, def) = self.read_payload().await?;
                    columns.push(col::read_column_definition(&def)?);
                }
                if column_count > 0 {
                    self.read_payload().await?; // EOF
                }

                let mut rows = Vec::new();
                loop {
                    let (_, mut cursor) = self.open_payload_cursor().await?;
                    let header = cursor.read_exact(1).await?;

                    // EOF and ERR packets are always a single small packet;
                    // peek the declared length to tell them apart from a
                    // row that merely starts with the same marker byte.
                    let declared_len = cursor.declared_first_chunk_len();
                    if is_eof_packet(header[0], declared_len) {
                        if declared_len > 1 {
                            cursor.read_exact(declared_len - 1).await?;
                        }
                        break;
                    }
                    if header[0] == 0xFF {
                        let mut full = header;
                        full.extend(cursor.read_exact(declared_len - 1).await?);
                        return Err(decode_err_payload(&full));
                    }
                    if header[0] != 0x00 {
                        return Err(Error::protocol(format!(
                            "binary row header byte was {:#x}, expected 0x00",
                            header[0]
                        )));
                    }

                    let row = self
                        .decode_binary_row(&mut cursor, &columns, rows.len(), &rows, &mut on_long_data)
                        .await?;
                    rows.push(row);
                }

                Ok(QueryOutcome::Resultset(Resultset { columns, rows }))
            }
        }
    }

    /// Decode one already-header-consumed binary row, reading fixed-width
    /// fields off the wire as needed but pumping oversized variable-length
    /// columns straight into an `on_long_data` sink instead of buffering
    /// the whole row first.
    async fn decode_binary_row(
        &self,
        cursor: &mut crate::framed::PayloadCursor<'_, BufReader<TcpStream>>,
        columns: &[ColumnDescriptor],
        row_index: usize,
        resultset_so_far: &[Vec<Value>],
        on_long_data: &mut Option<LongDataCallback>,
    ) -> Result<Vec<Value>> {
        let bitmap_len = value::null_bitmap_len(columns.len(), 2);
        let bitmap = cursor.read_exact(bitmap_len).await?;
        let null_bitmap = value::NullBitmap::for_result_set(&bitmap);

        let mut values = Vec::with_capacity(columns.len());

        for (idx, column) in columns.iter().enumerate() {
            if null_bitmap.is_null(idx) {
                values.push(Value::Null);
                continue;
            }

            if column.variable_length() {
                let len = cursor.read_int_lenenc().await?;

                if let Some(callback) = on_long_data.as_mut() {
                    if let Some(mut sink) = callback(len, column, row_index, resultset_so_far) {
                        cursor.copy_n_to(len, &mut sink).await?;
                        values.push(Value::Streamed {
                            type_name: column.column_type.name().to_string(),
                            length: len,
                        });
                        continue;
                    }
                }

                let bytes = cursor.read_exact(len as usize).await?;
                values.push(value::bytes_to_value(column, bytes));
                continue;
            }

            if let Some(width) = value::fixed_width(column.column_type) {
                let bytes = cursor.read_exact(width).await?;
                let (value, _) = value::decode_value(column, &bytes, self.opts.convert_to_timestamp)?;
                values.push(value);
                continue;
            }

            // Temporal types carry their own leading length byte.
            let mut buf = cursor.read_exact(1).await?;
            let tail_len = value::temporal_payload_len(column.column_type, buf[0])?;
            buf.extend(cursor.read_exact(tail_len).await?);
            let (value, _) = value::decode_value(column, &buf, self.opts.convert_to_timestamp)?;
            values.push(value);
        }

        Ok(values)
    }

    /// Stream every `Param::Stream` parameter via `COM_STMT_SEND_LONG_DATA`
    /// before `execute()` is called for its statement.
    pub async fn drain_streams(&mut self, statement_id: u32, params: &mut [Param]) -> Result<()> {
        for (idx, param) in params.iter_mut().enumerate() {
            if let Param::Stream(source) = param {
                let conn = self.transport.ensure_connected().await?;
                long_data::send_long_data(conn.get_mut(), statement_id, idx as u16, source.as_mut())
                    .await?;
                *param = Param::Null; // placeholder slot: already sent, contributes no bytes
            }
        }
        Ok(())
    }

    async fn write_payload(&mut self, payload: &[u8]) -> Result<()> {
        self.write_payload_seq(0, payload).await
    }

    async fn write_payload_seq(&mut self, seq: u8, payload: &[u8]) -> Result<()> {
        let conn = self.transport.ensure_connected().await?;
        crate::framed::write_payload(conn.get_mut(), seq, payload).await
    }

    async fn read_payload(&mut self) -> Result<(u8, Vec<u8>)> {
        let conn = self.transport.ensure_connected().await?;
        conn.read_payload().await
    }

    async fn open_payload_cursor(
        &mut self,
    ) -> Result<(u8, crate::framed::PayloadCursor<'_, BufReader<TcpStream>>)> {
        let conn = self.transport.ensure_connected().await?;
        conn.open_payload_cursor().await
    }
}

/// Whether a task's failure means the underlying socket is no longer
/// trustworthy and should be torn down and reconnected, rather than a
/// per-task protocol/server error that leaves the session intact.
fn is_connection_fatal(result: &Result<QueryOutcome>) -> bool {
    matches!(result, Err(Error::Disconnected) | Err(Error::Io(_)))
}

fn decode_ok_payload(payload: &[u8]) -> Result<OkPayload> {
    let mut r = Reader::new(payload);
    let header = r.read_int_1()?;
    if header != 0x00 && header != 0xFE {
        return Err(Error::protocol(format!("expected OK packet, got {header:#x}")));
    }
    let affected_rows = r.read_int_lenenc()?;
    let last_insert_id = r.read_int_lenenc()?;
    let status_flags = ServerStatusFlags::from_bits_truncate(r.read_int_2()?);
    let warnings = r.read_int_2()?;
    Ok(OkPayload { affected_rows, last_insert_id, status_flags, warnings })
}

fn decode_err_payload(payload: &[u8]) -> Error {
    let mut r = Reader::new(payload);
    let _header = r.read_int_1().unwrap_or(0xFF);
    let error_code = r.read_int_2().unwrap_or(0);
    let _marker = r.read_bytes_fix(1).unwrap_or(&[]);
    let sql_state = r
        .read_bytes_fix(5)
        .map(|b| String::from_utf8_lossy(b).into_owned())
        .unwrap_or_default();
    let message = String::from_utf8_lossy(r.read_bytes_eof()).into_owned();
    Error::Server(ServerError { error_code, sql_state, message })
}

/// EOF packets are exactly 5 bytes (header + warnings + status flags); a
/// LONGLONG-prefixed row value could also start with `0xFE` but would never
/// be this short, so the packet's declared length disambiguates the two.
fn is_eof_packet(first_byte: u8, declared_len: usize) -> bool {
    first_byte == 0xFE && declared_len < 9
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn eof_packet_detection() {
        assert!(is_eof_packet(0xFE, 5));
        assert!(!is_eof_packet(0xFE, 20));
        assert!(!is_eof_packet(0x00, 2));
    }

    #[test]
    fn connection_fatal_errors() {
        assert!(is_connection_fatal(&Err(Error::Disconnected)));
        assert!(is_connection_fatal(&Err(Error::Io(std::io::Error::other(
            "broken pipe"
        )))));
        assert!(!is_connection_fatal(&Err(Error::ParamMismatch { given: 1, expected: 2 })));
        assert!(!is_connection_fatal(&Ok(QueryOutcome::Result(OkPayload {
            affected_rows: 0,
            last_insert_id: 0,
            status_flags: ServerStatusFlags::empty(),
            warnings: 0,
        }))));
    }

    #[test]
    fn decodes_ok_payload() {
        let mut payload = vec![0x00u8, 5, 10];
        payload.extend_from_slice(&0x0002u16.to_le_bytes());
        payload.extend_from_slice(&0u16.to_le_bytes());
        let ok = decode_ok_payload(&payload).unwrap();
        assert_eq!(ok.affected_rows, 5);
        assert_eq!(ok.last_insert_id, 10);
        assert!(ok.status_flags.contains(ServerStatusFlags::SERVER_STATUS_AUTOCOMMIT));
    }

    #[test]
    fn decodes_err_payload() {
        let mut payload = vec![0xFFu8];
        payload.extend_from_slice(&1045u16.to_le_bytes());
        payload.push(b'#');
        payload.extend_from_slice(b"28000");
        payload.extend_from_slice(b"Access denied");
        let err = decode_err_payload(&payload);
        match err {
            Error::Server(ServerError { error_code, sql_state, message }) => {
                assert_eq!(error_code, 1045);
                assert_eq!(sql_state, "28000");
                assert_eq!(message, "Access denied");
            }
            _ => panic!("expected Error::Server"),
        }
    }
}
