//! Stub servers shared by the integration tests

#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::Path;
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

async fn serve(app: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// Webhook endpoint recording every JSON body it receives.
pub struct WebhookStub {
    pub url: String,
    received: Arc<Mutex<Vec<Value>>>,
}

impl WebhookStub {
    pub async fn spawn(status: StatusCode) -> Self {
        let received = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&received);
        let app = Router::new().route(
            "/hook",
            post(move |Json(body): Json<Value>| {
                let sink = Arc::clone(&sink);
                async move {
                    sink.lock().unwrap().push(body);
                    status
                }
            }),
        );
        let addr = serve(app).await;
        Self {
            url: format!("http://{}/hook", addr),
            received,
        }
    }

    pub fn received(&self) -> Vec<Value> {
        self.received.lock().unwrap().clone()
    }
}

/// Status API answering `{"online": ..}` for any address under `/3/`.
pub async fn spawn_status_api(status: StatusCode, online: bool) -> String {
    let app = Router::new().route(
        "/3/{address}",
        get(move |Path(address): Path<String>| async move {
            (status, Json(json!({ "online": online, "hostname": address })))
        }),
    );
    let addr = serve(app).await;
    format!("http://{}/3", addr)
}

/// Status API whose body lacks the `online` field.
pub async fn spawn_broken_status_api() -> String {
    let app = Router::new().route(
        "/3/{address}",
        get(|| async { Json(json!({ "ip": "127.0.0.1" })) }),
    );
    let addr = serve(app).await;
    format!("http://{}/3", addr)
}

fn put_varint(buf: &mut Vec<u8>, value: i32) {
    let mut value = value as u32;
    loop {
        if value & !0x7F == 0 {
            buf.push(value as u8);
            return;
        }
        buf.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }
}

async fn get_varint(stream: &mut TcpStream) -> std::io::Result<i32> {
    let mut value: u32 = 0;
    for i in 0..5 {
        let byte = stream.read_u8().await?;
        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            break;
        }
    }
    Ok(value as i32)
}

async fn skip_packet(stream: &mut TcpStream) -> std::io::Result<()> {
    let len = get_varint(stream).await?;
    let mut body = vec![0u8; len as usize];
    stream.read_exact(&mut body).await?;
    Ok(())
}

/// How the fake game server answers a status request.
#[derive(Clone)]
pub enum GameReply {
    Status(Value),
    Raw(Vec<u8>),
    Silent,
}

/// Minimal Minecraft status responder; returns the port it listens on.
pub async fn spawn_game_server(reply: GameReply) -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();

    tokio::spawn(async move {
        while let Ok((mut stream, _)) = listener.accept().await {
            let reply = reply.clone();
            tokio::spawn(async move {
                if skip_packet(&mut stream).await.is_err() || skip_packet(&mut stream).await.is_err() {
                    return;
                }
                match reply {
                    GameReply::Status(doc) => {
                        let json = doc.to_string();
                        let mut body = Vec::new();
                        put_varint(&mut body, 0x00);
                        put_varint(&mut body, json.len() as i32);
                        body.extend_from_slice(json.as_bytes());
                        let mut framed = Vec::new();
                        put_varint(&mut framed, body.len() as i32);
                        framed.extend_from_slice(&body);
                        let _ = stream.write_all(&framed).await;
                    }
                    GameReply::Raw(bytes) => {
                        let _ = stream.write_all(&bytes).await;
                    }
                    GameReply::Silent => {
                        tokio::time::sleep(std::time::Duration::from_secs(5)).await;
                    }
                }
            });
        }
    });

    port
}

pub fn status_doc(max_players: i64) -> Value {
    json!({
        "version": { "name": "1.20.4", "protocol": 765 },
        "players": { "max": max_players, "online": 0 },
        "description": { "text": "A Minecraft Server" }
    })
}

/// A localhost port with nothing listening on it.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}
