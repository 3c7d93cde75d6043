//! Just enough HTTP/1.1 to answer HEAD and serve a throttled GET body.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use edgeprobe_common::measurement::ProbeResult;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

#[derive(Debug, Clone)]
pub struct Behavior {
    pub status: u16,
    pub headers: Vec<(&'static str, &'static str)>,
    pub body_len: u64,
    pub bytes_per_sec: u64,
}

impl Behavior {
    pub fn ok() -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body_len: 0,
            bytes_per_sec: 0,
        }
    }

    pub fn status(status: u16) -> Self {
        Self { status, ..Self::ok() }
    }

    /// Looks like a Cloudflare edge answering with the given ray id.
    pub fn cloudflare(cf_ray: &'static str) -> Self {
        Self {
            headers: vec![("server", "cloudflare"), ("cf-ray", cf_ray)],
            ..Self::ok()
        }
    }

    /// Serves a large body at a fixed rate.
    pub fn throttled(bytes_per_sec: u64) -> Self {
        Self {
            body_len: 64 * 1024 * 1024,
            bytes_per_sec,
            ..Self::ok()
        }
    }

    pub fn with_body(mut self, body_len: u64, bytes_per_sec: u64) -> Self {
        self.body_len = body_len;
        self.bytes_per_sec = bytes_per_sec;
        self
    }
}

/// Requests seen by a fixture, counted before the response is written.
#[derive(Debug, Default)]
pub struct Counters {
    requests: AtomicUsize,
    closing_requests: AtomicUsize,
}

impl Counters {
    pub fn requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    /// Requests that asked for `Connection: close`.
    pub fn closing_requests(&self) -> usize {
        self.closing_requests.load(Ordering::SeqCst)
    }
}

pub struct HttpFixture {
    pub addr: SocketAddr,
    pub counters: Arc<Counters>,
    handle: JoinHandle<()>,
}

impl Drop for HttpFixture {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

pub fn loopback(last: u8) -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, last))
}

pub fn reachable(addr: IpAddr) -> ProbeResult {
    ProbeResult::new(addr, 4, 4, Duration::from_millis(40))
}

pub async fn serve(ip: IpAddr, port: u16, behavior: Behavior) -> std::io::Result<HttpFixture> {
    let listener: TcpListener = TcpListener::bind(SocketAddr::new(ip, port)).await?;
    let addr: SocketAddr = listener.local_addr()?;
    let behavior: Arc<Behavior> = Arc::new(behavior);
    let counters: Arc<Counters> = Arc::new(Counters::default());
    let shared: Arc<Counters> = counters.clone();

    let handle: JoinHandle<()> = tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let behavior: Arc<Behavior> = behavior.clone();
            let counters: Arc<Counters> = shared.clone();
            tokio::spawn(async move {
                let _ = handle_connection(stream, &behavior, &counters).await;
            });
        }
    });

    Ok(HttpFixture { addr, counters, handle })
}

/// One server per address, all on the same port.
pub async fn serve_many(servers: Vec<(IpAddr, Behavior)>) -> std::io::Result<Vec<HttpFixture>> {
    let mut fixtures: Vec<HttpFixture> = Vec::new();
    let mut port: u16 = 0;

    for (ip, behavior) in servers {
        let fixture: HttpFixture = serve(ip, port, behavior).await?;
        port = fixture.addr.port();
        fixtures.push(fixture);
    }

    Ok(fixtures)
}

/// A port on 127.0.0.1 with nothing listening.
pub async fn closed_port() -> u16 {
    let listener: TcpListener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap().port()
}

async fn handle_connection(
    mut stream: TcpStream,
    behavior: &Behavior,
    counters: &Counters,
) -> std::io::Result<()> {
    let mut buffer: Vec<u8> = Vec::new();
    let mut chunk: [u8; 1024] = [0; 1024];

    loop {
        let Some(end) = buffer.windows(4).position(|window| window == b"\r\n\r\n") else {
            let n: usize = stream.read(&mut chunk).await?;
            if n == 0 {
                return Ok(());
            }
            buffer.extend_from_slice(&chunk[..n]);
            continue;
        };

        let request: String = String::from_utf8_lossy(&buffer[..end]).to_ascii_lowercase();
        buffer.drain(..end + 4);

        let head_only: bool = request.starts_with("head ");
        let closing: bool = request.contains("connection: close");
        counters.requests.fetch_add(1, Ordering::SeqCst);
        if closing {
            counters.closing_requests.fetch_add(1, Ordering::SeqCst);
        }
        write_response(&mut stream, behavior, head_only).await?;

        if !head_only || closing {
            return Ok(());
        }
    }
}

async fn write_response(stream: &mut TcpStream, behavior: &Behavior, head_only: bool) -> std::io::Result<()> {
    let reason: &str = if behavior.status == 200 { "OK" } else { "Status" };
    let mut head: String = format!(
        "HTTP/1.1 {} {}\r\ncontent-length: {}\r\n",
        behavior.status, reason, behavior.body_len
    );
    for (name, value) in &behavior.headers {
        head.push_str(&format!("{name}: {value}\r\n"));
    }
    head.push_str("\r\n");
    stream.write_all(head.as_bytes()).await?;

    if head_only || behavior.body_len == 0 {
        return stream.flush().await;
    }

    let per_tick: usize = (behavior.bytes_per_sec / 100).max(1) as usize;
    let payload: Vec<u8> = vec![0; per_tick];
    let mut ticker = tokio::time::interval(Duration::from_millis(10));
    let mut sent: u64 = 0;

    while sent < behavior.body_len {
        ticker.tick().await;
        let n: usize = per_tick.min((behavior.body_len - sent) as usize);
        stream.write_all(&payload[..n]).await?;
        sent += n as u64;
    }

    stream.flush().await
}
