use crate::collector::SharedCollector;
use crate::config::Target;
use crate::conn::{BoxedIoStream, FirstByteSlot, FirstByteStream, InFlightStream, InFlightTimer};
use crate::error::JobError;
use crate::tls::{target_host, Handshaker};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::time::{timeout, timeout_at, Instant};
use tracing::{debug, trace};

/// One benchmark attempt against one target
#[derive(Clone)]
pub struct Job {
    pub name: String,
    pub address: String,
    /// Bounds the dial, and the whole attempt measured from its start
    pub timeout: Duration,
    pub collector: SharedCollector,
    pub handshaker: Arc<dyn Handshaker>,
}

impl std::fmt::Debug for Job {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Job")
            .field("name", &self.name)
            .field("address", &self.address)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

/// Timings taken from one successful handshake
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HandshakeSample {
    /// Handshake start until the session is established
    pub handshake: Duration,
    /// Handshake start until the first byte from the server
    pub server_hello: Duration,
    /// Sum of write-to-next-read gaps during the handshake
    pub in_flight: Duration,
}

/// Open a TCP connection to `address`, giving up after `limit`.
pub async fn dial(address: &str, limit: Duration) -> Result<TcpStream, JobError> {
    let stream = match timeout(limit, TcpStream::connect(address)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(source)) => {
            return Err(JobError::Dial {
                address: address.to_string(),
                source,
            })
        }
        Err(_) => {
            return Err(JobError::DialTimeout {
                address: address.to_string(),
                timeout: limit,
            })
        }
    };

    if let Err(e) = stream.set_nodelay(true) {
        debug!("Failed to set TCP_NODELAY on {}: {}", address, e);
    }
    Ok(stream)
}

/// Execute one job to completion and record its outcome.
///
/// Failures never escape: they become a failure line in the collector.
/// Either way the progress sink advances exactly once.
pub async fn run_job(job: Job) {
    let start = Instant::now();
    let outcome = attempt(&job, start).await;

    let session = {
        let mut collector = job.collector.lock().await;
        collector.advance();
        match outcome {
            Ok((sample, session)) => {
                collector.record_success(&sample);
                Some(session)
            }
            Err(e) => {
                collector.record_failure(&job.name, &e, start.elapsed());
                None
            }
        }
    };

    if let Some(mut session) = session {
        match timeout_at(start + job.timeout, session.shutdown()).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => trace!("Closing session with {} failed: {}", job.name, e),
            Err(_) => trace!("Closing session with {} timed out", job.name),
        }
    }
}

async fn attempt(job: &Job, start: Instant) -> Result<(HandshakeSample, BoxedIoStream), JobError> {
    let conn = dial(&job.address, job.timeout).await?;

    let first_read = FirstByteSlot::default();
    let timer = InFlightTimer::new();
    let stream = BoxedIoStream::new(InFlightStream::new(
        FirstByteStream::new(conn, first_read.clone()),
        timer.clone(),
    ));

    let handshake_start = Instant::now();
    let host = target_host(&job.address);
    let session = timeout_at(start + job.timeout, job.handshaker.handshake(host, stream))
        .await
        .map_err(|_| JobError::DeadlineExceeded)?
        .map_err(JobError::Handshake)?;
    let handshake = handshake_start.elapsed();

    let first_byte = first_read.get().copied().ok_or(JobError::NoServerResponse)?;
    let sample = HandshakeSample {
        handshake,
        server_hello: first_byte.saturating_duration_since(handshake_start),
        in_flight: timer.in_flight(),
    };
    trace!("{}: {:?}", job.name, sample);
    Ok((sample, session))
}

/// Jobs for a run: every target once per repeat, in target order.
pub fn schedule<'a>(
    targets: &'a [Target],
    repeats: usize,
    timeout: Duration,
    collector: SharedCollector,
    handshaker: Arc<dyn Handshaker>,
) -> impl Iterator<Item = Job> + 'a {
    (0..repeats).flat_map(move |_| {
        let collector = collector.clone();
        let handshaker = handshaker.clone();
        targets.iter().map(move |target| Job {
            name: target.name.clone(),
            address: target.address.clone(),
            timeout,
            collector: collector.clone(),
            handshaker: handshaker.clone(),
        })
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collector::{Collector, Quantity};
    use crate::progress::CountingProgress;
    use async_trait::async_trait;
    use std::io::{self, Write};
    use std::sync::Mutex;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;

    /// Completes without exchanging a byte
    struct MuteHandshaker;

    #[async_trait]
    impl Handshaker for MuteHandshaker {
        async fn handshake(&self, _host: &str, stream: BoxedIoStream) -> io::Result<BoxedIoStream> {
            Ok(stream)
        }
    }

    /// Sends a greeting and waits for the peer's first byte
    struct GreetingHandshaker;

    #[async_trait]
    impl Handshaker for GreetingHandshaker {
        async fn handshake(
            &self,
            _host: &str,
            mut stream: BoxedIoStream,
        ) -> io::Result<BoxedIoStream> {
            stream.write_all(b"hello").await?;
            let mut reply = [0u8; 1];
            stream.read_exact(&mut reply).await?;
            Ok(stream)
        }
    }

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

    fn collector(total: u64) -> SharedCollector {
        Collector::new(Box::new(CountingProgress::new(total)), Box::new(io::sink())).into_shared()
    }

    fn job(address: String, collector: &SharedCollector, handshaker: Arc<dyn Handshaker>) -> Job {
        Job {
            name: "local".to_string(),
            address,
            timeout: Duration::from_secs(5),
            collector: collector.clone(),
            handshaker,
        }
    }

    #[tokio::test]
    async fn test_dial_refused_is_dial_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = dial(&address, Duration::from_secs(2)).await;
        assert!(matches!(result, Err(JobError::Dial { .. })));
    }

    #[tokio::test]
    async fn test_greeting_handshake_records_all_quantities() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut greeting = [0u8; 5];
            socket.read_exact(&mut greeting).await.unwrap();
            socket.write_all(b"!").await.unwrap();
            let mut rest = Vec::new();
            let _ = socket.read_to_end(&mut rest).await;
        });

        let shared = collector(1);
        run_job(job(address, &shared, Arc::new(GreetingHandshaker))).await;

        let collector = shared.lock().await;
        assert_eq!(collector.successes(), 1);
        assert_eq!(collector.completed(), 1);
        let handshake = collector.histogram(Quantity::Handshake).slowest();
        let server_hello = collector.histogram(Quantity::ServerHello).slowest();
        let in_flight = collector.histogram(Quantity::InFlight).slowest();
        assert!(server_hello <= handshake);
        assert!(in_flight <= handshake);
    }

    #[tokio::test]
    async fn test_handshake_without_server_bytes_is_a_failure() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        tokio::spawn(async move {
            let _conn = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(5)).await;
        });

        let output = SharedBuffer::default();
        let shared = Collector::new(
            Box::new(CountingProgress::new(1)),
            Box::new(output.clone()),
        )
        .into_shared();
        run_job(job(address, &shared, Arc::new(MuteHandshaker))).await;

        let collector = shared.lock().await;
        assert_eq!(collector.failures(), 1);
        assert_eq!(collector.completed(), 1);
        for quantity in Quantity::ALL {
            assert!(collector.histogram(quantity).is_empty());
        }

        let text = String::from_utf8_lossy(&output.0.lock().unwrap()).into_owned();
        assert!(text.contains("local"));
        assert_eq!(text.matches("handshake completed without a server response").count(), 1);
    }

    #[test]
    fn test_schedule_is_repeat_major() {
        let targets = vec![
            Target {
                name: "a".to_string(),
                address: "a:443".to_string(),
            },
            Target {
                name: "b".to_string(),
                address: "b:443".to_string(),
            },
        ];
        let shared = collector(6);
        let handshaker: Arc<dyn Handshaker> = Arc::new(MuteHandshaker);
        let names: Vec<_> = schedule(&targets, 3, Duration::from_secs(1), shared, handshaker)
            .map(|job| job.name)
            .collect();
        assert_eq!(names, ["a", "b", "a", "b", "a", "b"]);
    }

    #[test]
    fn test_schedule_empty_inputs() {
        let shared = collector(0);
        let handshaker: Arc<dyn Handshaker> = Arc::new(MuteHandshaker);
        let limit = Duration::from_secs(1);
        assert_eq!(schedule(&[], 5, limit, shared.clone(), handshaker.clone()).count(), 0);
        let targets = vec![Target {
            name: "a".to_string(),
            address: "a:443".to_string(),
        }];
        assert_eq!(schedule(&targets, 0, limit, shared, handshaker).count(), 0);
    }
}
