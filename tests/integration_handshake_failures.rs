use anyhow::Result;
use std::io::{self, Write};
use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use tls_bench::{
    progress::CountingProgress, BenchConfig, BenchmarkRunner, Quantity, RustlsHandshaker,
    TlsSettings,
};
use tokio::io::AsyncReadExt;
use tokio::net::TcpListener;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }
    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl SharedBuffer {
    fn text(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }
}

fn single_target(address: &str, timeout: &str) -> Result<BenchConfig> {
    let doc = serde_json::json!({
        "targets": [{"name": "local", "address": address}],
        "sni": "localhost",
        "version": "tls13",
        "insecure_skip_verify": true,
        "timeout": timeout,
        "repeats": 1,
        "parallel": 1,
    });
    Ok(BenchConfig::from_reader(doc.to_string().as_bytes())?)
}

async fn run_once(config: BenchConfig) -> Result<(tls_bench::Collector, u64, String)> {
    let handshaker = Arc::new(RustlsHandshaker::new(&TlsSettings::from(&config))?);
    let progress = CountingProgress::new(config.total_jobs() as u64);
    let counter = progress.counter();
    let output = SharedBuffer::default();

    let runner = BenchmarkRunner::new(config, handshaker);
    let collector = runner
        .run(Box::new(progress), Box::new(output.clone()))
        .await?;
    Ok((collector, counter.load(Ordering::Acquire), output.text()))
}

/// A server that accepts and then never answers: the handshake hits the
/// deadline, producing one failure line, no samples and one progress step.
#[tokio::test]
async fn silent_server_hits_deadline() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut sink = Vec::new();
            let _ = socket.read_to_end(&mut sink).await;
        }
    });

    let started = Instant::now();
    let (collector, completed, output) = run_once(single_target(&address, "300ms")?).await?;

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(completed, 1);
    assert_eq!(collector.failures(), 1);
    assert_eq!(collector.successes(), 0);
    for quantity in Quantity::ALL {
        assert!(collector.histogram(quantity).is_empty());
    }
    assert_eq!(output.matches("handshake deadline exceeded").count(), 1);
    assert!(output.contains("local"));
    Ok(())
}

/// A server that hangs up on the ClientHello fails the handshake outright.
#[tokio::test]
async fn server_hang_up_fails_handshake() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut hello = [0u8; 5];
            let _ = socket.read_exact(&mut hello).await;
        }
    });

    let (collector, completed, output) = run_once(single_target(&address, "5s")?).await?;

    assert_eq!(completed, 1);
    assert_eq!(collector.failures(), 1);
    assert!(output.contains("handshake failed"));
    Ok(())
}

/// Nothing listening: the dial itself fails and is reported the same way.
#[tokio::test]
async fn refused_connection_is_a_dial_failure() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();
    drop(listener);

    let (collector, completed, output) = run_once(single_target(&address, "2s")?).await?;

    assert_eq!(completed, 1);
    assert_eq!(collector.failures(), 1);
    assert!(output.contains(&format!("dial {}", address)));
    Ok(())
}

/// Without an SNI the handshaker starts anyway and names each IP target by
/// its address, so the run reaches the server instead of failing at startup.
#[tokio::test]
async fn missing_sni_still_runs_against_ip_target() -> Result<()> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let address = listener.local_addr()?.to_string();
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut hello = [0u8; 5];
            let _ = socket.read_exact(&mut hello).await;
        }
    });

    let doc = serde_json::json!({
        "Targets": [{"Name": "local", "Address": address}],
        "Version": "tls13",
        "InsecureSkipVerify": true,
        "Timeout": "5s",
    });
    let config = BenchConfig::from_reader(doc.to_string().as_bytes())?;
    assert!(config.sni.is_empty());

    let (collector, completed, output) = run_once(config).await?;
    assert_eq!(completed, 1);
    assert_eq!(collector.failures(), 1);
    assert!(output.contains("handshake failed"));
    Ok(())
}
