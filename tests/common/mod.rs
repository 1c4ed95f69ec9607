//! Shared utilities for integration testing.
//!
//! Mock backends speak raw HTTP/1.1 over TCP so tests control every byte
//! of the response, including headers the proxy is expected to rewrite.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// Bind a backend listener on an ephemeral port.
///
/// Binding is split from serving so tests can embed the backend's own
/// address in the canned response (Location targets, cookie domains).
pub async fn bind_backend() -> (TcpListener, SocketAddr) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    (listener, addr)
}

/// Serve a fixed raw response for every connection, recording each raw
/// request (head plus body) as it arrives.
pub fn serve_canned(listener: TcpListener, response: Vec<u8>) -> Arc<Mutex<Vec<String>>> {
    let requests = Arc::new(Mutex::new(Vec::new()));
    let recorded = requests.clone();

    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((mut socket, _)) => {
                    let response = response.clone();
                    let recorded = recorded.clone();
                    tokio::spawn(async move {
                        if let Some(request) = read_request(&mut socket).await {
                            recorded.lock().unwrap().push(request);
                        }
                        let _ = socket.write_all(&response).await;
                        let _ = socket.shutdown().await;
                    });
                }
                Err(_) => break,
            }
        }
    });

    requests
}

/// Convenience wrapper: bind and serve in one step.
#[allow(dead_code)]
pub async fn start_canned_backend(response: Vec<u8>) -> (SocketAddr, Arc<Mutex<Vec<String>>>) {
    let (listener, addr) = bind_backend().await;
    let requests = serve_canned(listener, response);
    (addr, requests)
}

/// A backend that accepts connections but never responds.
#[allow(dead_code)]
pub async fn start_stalling_backend() -> SocketAddr {
    let (listener, addr) = bind_backend().await;
    tokio::spawn(async move {
        let mut held = Vec::new();
        loop {
            match listener.accept().await {
                Ok((socket, _)) => held.push(socket),
                Err(_) => break,
            }
        }
    });
    addr
}

/// Build a raw HTTP/1.1 response with Content-Length and Connection: close.
pub fn http_response(status_line: &str, headers: &[(&str, &str)], body: &[u8]) -> Vec<u8> {
    let mut response = format!("HTTP/1.1 {status_line}\r\n");
    for (name, value) in headers {
        response.push_str(&format!("{name}: {value}\r\n"));
    }
    response.push_str(&format!(
        "Content-Length: {}\r\nConnection: close\r\n\r\n",
        body.len()
    ));
    let mut bytes = response.into_bytes();
    bytes.extend_from_slice(body);
    bytes
}

/// Read one request: the head, then Content-Length bytes of body.
async fn read_request(socket: &mut tokio::net::TcpStream) -> Option<String> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 4096];
    let head_end = loop {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        buffer.extend_from_slice(&chunk[..n]);
        if let Some(pos) = find_head_end(&buffer) {
            break pos;
        }
        if buffer.len() > 1 << 20 {
            return None;
        }
    };

    let head = String::from_utf8_lossy(&buffer[..head_end]).to_string();
    let content_length = head
        .lines()
        .find_map(|line| {
            let (name, value) = line.split_once(':')?;
            name.eq_ignore_ascii_case("content-length")
                .then(|| value.trim().parse::<usize>().ok())?
        })
        .unwrap_or(0);

    let mut body = buffer[head_end + 4..].to_vec();
    while body.len() < content_length {
        let n = socket.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }

    Some(format!("{head}\r\n\r\n{}", String::from_utf8_lossy(&body)))
}

fn find_head_end(buffer: &[u8]) -> Option<usize> {
    buffer.windows(4).position(|w| w == b"\r\n\r\n")
}
