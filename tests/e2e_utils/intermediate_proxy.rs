#![allow(dead_code)]

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// How the proxy answers a CONNECT request.
#[derive(Clone, Debug)]
pub enum Behaviour {
    /// Connect to the requested target, answer 200 and relay bytes.
    Relay,
    /// Answer with a fixed response and hang up.
    Answer(&'static str),
}

/// Scripted HTTP CONNECT proxy listening on an ephemeral local port.
pub struct IntermediateProxy {
    addr: SocketAddr,
    requests: Arc<Mutex<Vec<Vec<String>>>>,
    handle: JoinHandle<()>,
}

impl IntermediateProxy {
    pub async fn start(behaviour: Behaviour) -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let requests = Arc::new(Mutex::new(Vec::new()));

        let recorded = requests.clone();
        let handle = tokio::spawn(async move {
            while let Ok((socket, _)) = listener.accept().await {
                tokio::spawn(serve_connect(socket, behaviour.clone(), recorded.clone()));
            }
        });

        Ok(Self { addr, requests, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    /// Header lines of every request received so far, one entry per connection.
    pub fn requests(&self) -> Vec<Vec<String>> {
        self.requests.lock().unwrap().clone()
    }
}

/// Reads one CONNECT request from `socket` and acts out `behaviour`.
pub async fn serve_connect<S>(socket: S, behaviour: Behaviour, requests: Arc<Mutex<Vec<Vec<String>>>>)
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(socket);
    let mut lines = Vec::new();
    loop {
        let mut line = String::new();
        match reader.read_line(&mut line).await {
            Ok(0) | Err(_) => return,
            Ok(_) if line == "\r\n" => break,
            Ok(_) => lines.push(line.trim_end().to_string()),
        }
    }
    let target = lines
        .first()
        .and_then(|line| line.split_whitespace().nth(1))
        .map(str::to_string);
    requests.lock().unwrap().push(lines);

    let mut socket = reader.into_inner();
    match (behaviour, target) {
        (Behaviour::Relay, Some(target)) => match TcpStream::connect(&target).await {
            Ok(mut upstream) => {
                let answered = socket
                    .write_all(b"HTTP/1.1 200 Connection Established\r\n\r\n")
                    .await;
                if answered.is_ok() && socket.flush().await.is_ok() {
                    let _ = tokio::io::copy_bidirectional(&mut socket, &mut upstream).await;
                }
            }
            Err(_) => {
                let _ = socket.write_all(b"HTTP/1.1 502 Bad Gateway\r\nContent-Length: 0\r\n\r\n").await;
            }
        },
        (Behaviour::Answer(response), _) => {
            let _ = socket.write_all(response.as_bytes()).await;
            let _ = socket.shutdown().await;
        }
        (Behaviour::Relay, None) => {
            let _ = socket.write_all(b"HTTP/1.1 400 Bad Request\r\nContent-Length: 0\r\n\r\n").await;
        }
    }
}

impl Drop for IntermediateProxy {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

/// Echoes every byte it receives on each accepted connection.
pub struct EchoServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
}

impl EchoServer {
    pub async fn start() -> std::io::Result<Self> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                tokio::spawn(async move {
                    let mut buf = [0u8; 4096];
                    loop {
                        match socket.read(&mut buf).await {
                            Ok(0) | Err(_) => break,
                            Ok(n) => {
                                if socket.write_all(&buf[..n]).await.is_err() {
                                    break;
                                }
                            }
                        }
                    }
                });
            }
        });
        Ok(Self { addr, handle })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }
}

impl Drop for EchoServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}
