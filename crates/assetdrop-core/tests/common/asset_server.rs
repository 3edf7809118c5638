//! Minimal HTTP/1.1 server for integration tests.
//!
//! Serves a fixed set of bodies by request path. Unknown paths get 404.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct Asset {
    pub body: Vec<u8>,
    pub content_type: Option<&'static str>,
    /// Announce this Content-Length instead of the real one (short-body tests).
    pub announced_len: Option<usize>,
}

impl Asset {
    pub fn new(body: Vec<u8>, content_type: Option<&'static str>) -> Self {
        Self {
            body,
            content_type,
            announced_len: None,
        }
    }
}

/// Starts a server in a background thread. Returns the base URL without a
/// trailing slash (e.g. "http://127.0.0.1:12345"). Runs until the process exits.
pub fn start(assets: Vec<(&'static str, Asset)>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind");
    let port = listener.local_addr().unwrap().port();
    let assets: Arc<HashMap<&'static str, Asset>> = Arc::new(assets.into_iter().collect());
    thread::spawn(move || {
        for stream in listener.incoming().flatten() {
            let assets = Arc::clone(&assets);
            thread::spawn(move || handle(stream, &assets));
        }
    });
    format!("http://127.0.0.1:{}", port)
}

fn handle(mut stream: TcpStream, assets: &HashMap<&'static str, Asset>) {
    let _ = stream.set_read_timeout(Some(Duration::from_secs(2)));
    let _ = stream.set_write_timeout(Some(Duration::from_secs(2)));
    let mut buf = [0u8; 8192];
    let n = match stream.read(&mut buf) {
        Ok(0) | Err(_) => return,
        Ok(n) => n,
    };
    let Ok(request) = std::str::from_utf8(&buf[..n]) else {
        return;
    };
    let mut parts = request.lines().next().unwrap_or("").split_whitespace();
    let method = parts.next().unwrap_or("");
    let path = parts.next().unwrap_or("/");
    let path = path.split('?').next().unwrap_or(path);

    if !method.eq_ignore_ascii_case("GET") {
        let _ = stream.write_all(b"HTTP/1.1 405 Method Not Allowed\r\nContent-Length: 0\r\n\r\n");
        return;
    }
    let Some(asset) = assets.get(path) else {
        let _ = stream.write_all(b"HTTP/1.1 404 Not Found\r\nContent-Length: 9\r\n\r\nnot found");
        return;
    };
    let content_type = asset
        .content_type
        .map(|ct| format!("Content-Type: {}\r\n", ct))
        .unwrap_or_default();
    let response = format!(
        "HTTP/1.1 200 OK\r\nContent-Length: {}\r\n{}Connection: close\r\n\r\n",
        asset.announced_len.unwrap_or(asset.body.len()),
        content_type
    );
    let _ = stream.write_all(response.as_bytes());
    let _ = stream.write_all(&asset.body);
}
