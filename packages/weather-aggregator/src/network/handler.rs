//! Per-connection worker: read framed messages, dispatch GET/PUT/SYNC,
//! write framed responses, and clean up on disconnect.

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use once_cell::sync::Lazy;
use regex::Regex;
use tokio::net::TcpStream;
use weather_core::{parse_request, read_frame, write_frame, Clock, Method, Request, Response};

use crate::config::ExpiryPolicy;
use crate::storage::RecordStore;

/// `GET` targets must be `/` or `/<id>` with no further path segments.
static GET_TARGET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^/[^/]*$").expect("valid regex"));

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as i64
}

/// Serves one TCP connection for its lifetime: the read/dispatch/write
/// loop, plus the station id this connection most recently wrote (needed,
/// and only needed, for connection-close cleanup).
pub struct ConnectionHandler {
    store: Arc<RecordStore>,
    clock: Arc<Clock>,
    policy: ExpiryPolicy,
    peer_host: String,
    peer_port: u16,
    owned_id: Option<String>,
}

impl ConnectionHandler {
    #[must_use]
    pub fn new(
        store: Arc<RecordStore>,
        clock: Arc<Clock>,
        policy: ExpiryPolicy,
        peer_host: String,
        peer_port: u16,
    ) -> Self {
        Self {
            store,
            clock,
            policy,
            peer_host,
            peer_port,
            owned_id: None,
        }
    }

    /// Drives the connection until the peer closes or I/O fails, then
    /// performs connection-close cleanup.
    pub async fn run(mut self, mut stream: TcpStream) {
        loop {
            match read_frame(&mut stream).await {
                Ok(Some(bytes)) => {
                    let response = self.handle_frame(&bytes).await;
                    if let Err(error) = write_frame(&mut stream, &response.into_bytes()).await {
                        tracing::warn!(peer = %self.peer_host, port = self.peer_port, %error, "failed to write response frame");
                        break;
                    }
                }
                Ok(None) => break,
                Err(error) => {
                    tracing::debug!(peer = %self.peer_host, port = self.peer_port, %error, "connection read failed");
                    break;
                }
            }
        }
        self.cleanup().await;
    }

    async fn handle_frame(&mut self, bytes: &[u8]) -> Response {
        match parse_request(bytes) {
            Ok(request) => self.dispatch(request).await,
            Err(error) => {
                let lamport = self.clock.tick_for_internal();
                tracing::warn!(%error, "unparseable request frame");
                Response::empty(400, lamport)
            }
        }
    }

    async fn dispatch(&mut self, request: Request) -> Response {
        match request.method {
            Method::Get => self.handle_get(&request).await,
            Method::Put => self.handle_put(&request).await,
            Method::Sync => self.handle_sync(&request).await,
        }
    }

    async fn handle_get(&mut self, request: &Request) -> Response {
        let Some(peer_lamport) = request.lamport() else {
            let lamport = self.clock.tick_for_internal();
            return Response::empty(400, lamport);
        };
        let lamport = self.clock.tick_for_request(peer_lamport);

        if !GET_TARGET.is_match(&request.target) {
            return Response::empty(400, lamport);
        }

        let id = request.target.trim_start_matches('/');
        if id.is_empty() {
            return Response::with_body(200, lamport, self.list_bodies().await);
        }

        let Some(record) = self.store.get(id) else {
            return Response::empty(400, lamport);
        };
        let global_seq = self.clock.update_count();
        if record
            .is_expired(global_seq, self.policy.max_age_ms, self.policy.max_seq_gap, now_millis())
            .await
            || !record.has_body().await
        {
            return Response::empty(400, lamport);
        }
        let snapshot = record.snapshot().await;
        Response::with_body(200, lamport, snapshot.body)
    }

    async fn list_bodies(&self) -> String {
        let global_seq = self.clock.update_count();
        let now = now_millis();
        let mut bodies = Vec::new();
        for record in self.store.iter() {
            if record.has_body().await
                && !record
                    .is_expired(global_seq, self.policy.max_age_ms, self.policy.max_seq_gap, now)
                    .await
            {
                bodies.push(record.snapshot().await.body);
            }
        }
        format!("[{}]", bodies.join(","))
    }

    async fn handle_put(&mut self, request: &Request) -> Response {
        let Some(peer_lamport) = request.lamport() else {
            let lamport = self.clock.tick_for_internal();
            return Response::empty(400, lamport);
        };

        if request.body.is_empty() || !request.body.starts_with('{') {
            let lamport = self.clock.tick_for_request(peer_lamport);
            return Response::empty(204, lamport);
        }

        let parsed: serde_json::Value = match serde_json::from_str(&request.body) {
            Ok(value) => value,
            Err(error) => {
                let lamport = self.clock.tick_for_request(peer_lamport);
                tracing::warn!(%error, "PUT body is not valid JSON");
                return Response::empty(500, lamport);
            }
        };

        let Some(id) = parsed.get("id").and_then(serde_json::Value::as_str) else {
            let lamport = self.clock.tick_for_request(peer_lamport);
            return Response::empty(400, lamport);
        };
        let id = id.to_string();

        let (lamport, seq) = self.clock.admit_write(peer_lamport);
        let (record, created) = self.store.get_or_create(&id);
        self.owned_id = Some(id.clone());

        record
            .merge(
                &request.body,
                peer_lamport,
                now_millis(),
                seq,
                &self.peer_host,
                self.peer_port,
            )
            .await;

        let status = if created { 201 } else { 200 };
        Response::empty(status, lamport)
    }

    async fn handle_sync(&mut self, request: &Request) -> Response {
        let peer_lamport = request.lamport().unwrap_or(0);
        let lamport = self.clock.tick_for_request(peer_lamport);
        Response::empty(200, lamport)
    }

    async fn cleanup(&self) {
        let Some(id) = &self.owned_id else {
            return;
        };
        let Some(record) = self.store.get(id) else {
            return;
        };
        if record.delete_if_origin(&self.peer_host, self.peer_port).await {
            self.store.remove_if_same(id, &record);
        }
    }
}
