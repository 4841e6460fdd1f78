// src/network/pool.rs

//! Mining pool client implementation
//!
//! Handles communication with mining pools using a Stratum-style JSON protocol
//! over WebSocket. The connection loop runs on the tokio runtime while worker
//! threads talk to it through [`PoolWork`]:
//! - new job notifications replace the current job template
//! - workers carve disjoint nonce ranges out of the current template
//! - found shares are queued back to the connection loop for submission
use crate::miner::cancel::CancelToken;
use crate::network::{JobSource, ShareSubmitter};
use crate::types::{HASH_SIZE, MiningJob, MiningResult};
use crate::utils::error::MinerError;
use arc_swap::ArcSwap;
use futures::stream::{SplitSink, SplitStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::net::TcpStream;
use tokio::sync::{Mutex, mpsc};
use tokio::time;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};
use tungstenite::protocol::Message;
use url::Url;

type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
type WsSink = SplitSink<WsStream, Message>;
type WsSource = SplitStream<WsStream>;

/// Interval between keepalive messages
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// How often the connection loop checks for cancellation
const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// How long a worker waits for the first job before asking again
const JOB_WAIT: Duration = Duration::from_millis(100);

/// Configuration for connecting to a mining pool
#[derive(Debug, Clone)]
pub struct PoolConfig {
    /// Pool connection URL (e.g., "ws://pool.example.com:3333")
    pub url: String,
    /// Worker name reported at login
    pub worker_name: String,
    /// Worker password (often "x" if not required)
    pub password: String,
    /// Consecutive failed sessions before giving up
    pub max_reconnect_attempts: u32,
    /// Pause between reconnect attempts
    pub reconnect_delay: Duration,
}

/// Work template announced by the pool
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobTemplate {
    /// Pool-assigned job identifier
    pub job_id: String,
    /// Header hash to search over
    pub header_hash: [u8; HASH_SIZE],
    /// Share target
    pub target: [u8; HASH_SIZE],
}

/// Template currently served, with its own nonce cursor
///
/// Swapped as one unit so a range is always carved from the template it
/// is handed out with.
struct ActiveTemplate {
    template: JobTemplate,
    next_nonce: AtomicU64,
}

/// A share waiting to be sent to the pool
#[derive(Debug, Clone)]
pub struct Submission {
    /// Payout address the share is credited to
    pub address: String,
    /// Job ID this share belongs to
    pub job_id: String,
    /// Little-endian nonce bytes
    pub nonce: [u8; 8],
    /// Resulting hash that meets the target
    pub hash: [u8; HASH_SIZE],
}

/// State shared between the pool connection and worker threads
pub struct PoolWork {
    /// Current job template and its nonce cursor (atomically swappable)
    current: ArcSwap<Option<ActiveTemplate>>,
    /// Number of nonces per worker job
    batch_size: u64,
    /// Templates received since startup
    templates: AtomicU64,
    /// Queue of shares for the connection loop
    share_sender: mpsc::UnboundedSender<Submission>,
}

impl PoolWork {
    /// Creates an empty work store
    ///
    /// # Arguments
    /// * `batch_size` - Number of nonces handed to a worker per job
    /// * `share_sender` - Queue read by the connection loop
    pub fn new(batch_size: u64, share_sender: mpsc::UnboundedSender<Submission>) -> Self {
        PoolWork {
            current: ArcSwap::from_pointee(None),
            batch_size: batch_size.max(1),
            templates: AtomicU64::new(0),
            share_sender,
        }
    }

    /// Replaces the current job template
    ///
    /// Nonce distribution restarts from zero for the new template.
    pub fn update_job(&self, template: JobTemplate) {
        self.current.store(Arc::new(Some(ActiveTemplate {
            template,
            next_nonce: AtomicU64::new(0),
        })));
        self.templates.fetch_add(1, Ordering::Relaxed);
    }

    /// ID of the template workers are currently served
    pub fn current_job_id(&self) -> Option<String> {
        let current = self.current.load();
        (**current).as_ref().map(|active| active.template.job_id.clone())
    }

    /// Number of templates received so far
    pub fn templates_received(&self) -> u64 {
        self.templates.load(Ordering::Relaxed)
    }
}

impl JobSource for PoolWork {
    fn next_job(&self, cancel: &CancelToken) -> Result<Option<MiningJob>, MinerError> {
        let current = self.current.load();
        let Some(active) = &**current else {
            cancel.wait_timeout(JOB_WAIT);
            return Ok(None);
        };
        let template = &active.template;

        let start = active.next_nonce.fetch_add(self.batch_size, Ordering::SeqCst);
        let Some(end) = start.checked_add(self.batch_size) else {
            // Template exhausted; wait for the pool to announce a new one
            cancel.wait_timeout(JOB_WAIT);
            return Ok(None);
        };

        Ok(Some(MiningJob {
            job_id: template.job_id.clone(),
            header_hash: template.header_hash,
            target: template.target,
            nonce_start: start,
            nonce_end: end,
        }))
    }
}

impl ShareSubmitter for PoolWork {
    fn submit(
        &self,
        address: &str,
        result: &MiningResult,
        job: &MiningJob,
    ) -> Result<(), MinerError> {
        self.share_sender.send(Submission {
            address: address.to_string(),
            job_id: job.job_id.clone(),
            nonce: result.nonce,
            hash: result.hash,
        })?;
        Ok(())
    }
}

/// Client for communicating with a mining pool
///
/// Handles all pool protocol interactions including:
/// - Connection management and reconnects
/// - Job distribution to miners
/// - Share submission
/// - Keepalive messages
pub struct PoolClient {
    /// Pool connection configuration
    config: PoolConfig,
    /// Work store shared with the worker threads
    work: Arc<PoolWork>,
    /// Shares queued by workers
    share_receiver: Mutex<mpsc::UnboundedReceiver<Submission>>,
    /// JSON-RPC request id counter
    request_id: AtomicU64,
}

impl PoolClient {
    /// Creates a new PoolClient instance
    ///
    /// # Arguments
    /// * `config` - Pool connection configuration
    /// * `batch_size` - Nonces handed to a worker per job
    pub fn new(config: PoolConfig, batch_size: u64) -> Self {
        let (share_sender, share_receiver) = mpsc::unbounded_channel();
        PoolClient {
            config,
            work: Arc::new(PoolWork::new(batch_size, share_sender)),
            share_receiver: Mutex::new(share_receiver),
            request_id: AtomicU64::new(1),
        }
    }

    /// Work store to hand to the miner as job source and share submitter
    pub fn work(&self) -> Arc<PoolWork> {
        Arc::clone(&self.work)
    }

    /// Runs pool sessions until cancelled or out of reconnect attempts
    ///
    /// A session that received at least one job resets the failure count.
    ///
    /// # Errors
    /// Returns the last session error once `max_reconnect_attempts`
    /// consecutive sessions have failed
    pub async fn run(&self, cancel: CancelToken) -> Result<(), MinerError> {
        let mut failures = 0u32;

        loop {
            let templates_before = self.work.templates_received();

            match self.session(&cancel).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    if self.work.templates_received() > templates_before {
                        failures = 0;
                    }
                    failures += 1;

                    if failures >= self.config.max_reconnect_attempts {
                        log::error!("Giving up on pool after {} failed attempts: {}", failures, e);
                        return Err(e);
                    }

                    log::warn!(
                        "Pool session failed: {}. Reconnecting in {:?} ({}/{})",
                        e,
                        self.config.reconnect_delay,
                        failures,
                        self.config.max_reconnect_attempts
                    );
                    if sleep_unless_cancelled(self.config.reconnect_delay, &cancel).await {
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Establishes connection to the mining pool
    ///
    /// # Errors
    /// Returns `MinerError` if:
    /// - URL is invalid
    /// - DNS resolution fails
    /// - WebSocket handshake fails
    async fn connect(&self) -> Result<WsStream, MinerError> {
        let url_str = self.config.url.as_str();
        let url = Url::parse(url_str)?;

        if url.scheme() != "ws" && url.scheme() != "wss" {
            log::warn!(
                "Pool URL '{}' uses non-WebSocket scheme. Consider using 'ws://' or 'wss://'",
                url_str
            );
        }

        match tokio_tungstenite::connect_async(url_str).await {
            Ok((ws_stream, _)) => {
                log::info!("Connected to pool {}", url_str);
                Ok(ws_stream)
            }
            Err(e) => {
                if e.to_string().contains("dns error") {
                    Err(MinerError::ConnectionError(format!(
                        "DNS resolution failed. Check pool URL: {}",
                        url_str
                    )))
                } else {
                    Err(e.into())
                }
            }
        }
    }

    /// One connection lifetime: login, then pump messages until error or cancel
    async fn session(&self, cancel: &CancelToken) -> Result<(), MinerError> {
        let (mut sink, mut source): (WsSink, WsSource) = self.connect().await?.split();

        self.login(&mut sink).await?;
        self.subscribe(&mut sink).await?;

        let mut keepalive = time::interval(KEEPALIVE_INTERVAL);
        keepalive.tick().await;
        let mut cancel_check = time::interval(CANCEL_POLL_INTERVAL);
        let mut shares = self.share_receiver.lock().await;

        loop {
            tokio::select! {
                msg = source.next() => {
                    match msg {
                        Some(Ok(Message::Text(text))) => {
                            if let Err(e) = self.handle_message(text.as_str()) {
                                log::warn!("Ignoring pool message: {}", e);
                            }
                        }
                        Some(Ok(Message::Close(_))) | None => {
                            return Err(MinerError::ConnectionError("Pool closed the connection".into()));
                        }
                        Some(Err(e)) => return Err(e.into()),
                        _ => {}
                    }
                }
                _ = keepalive.tick() => {
                    self.keep_alive(&mut sink).await?;
                }
                share = shares.recv() => {
                    match share {
                        Some(share) => {
                            if let Err(e) = self.submit_share(&mut sink, &share).await {
                                self.requeue(share);
                                return Err(e);
                            }
                        }
                        None => return Ok(()),
                    }
                }
                _ = cancel_check.tick() => {
                    if cancel.is_cancelled() {
                        let _ = sink.close().await;
                        return Ok(());
                    }
                }
            }
        }
    }

    /// Handles incoming WebSocket messages from the pool
    ///
    /// Accepts job notifications (`method: "job"`), login responses that
    /// carry a first job (`result.job`), and submission acknowledgements.
    ///
    /// # Errors
    /// Returns `MinerError` if the message is not JSON or a job is malformed
    fn handle_message(&self, message: &str) -> Result<(), MinerError> {
        let json: Value = serde_json::from_str(message)?;

        if let Some(method) = json.get("method").and_then(|m| m.as_str()) {
            match method {
                "job" => self.handle_job(&json["params"])?,
                _ => log::warn!("Unknown method received: {}", method),
            }
            return Ok(());
        }

        if let Some(job) = json.get("result").and_then(|r| r.get("job")) {
            return self.handle_job(job);
        }

        match json.get("error") {
            Some(err) if !err.is_null() => log::warn!("Pool rejected request {}: {}", json["id"], err),
            _ => log::debug!("Pool acknowledged request {}", json["id"]),
        }
        Ok(())
    }

    /// Processes a job object
    ///
    /// # Errors
    /// Returns `MinerError` if required fields are missing or hex decoding fails
    fn handle_job(&self, params: &Value) -> Result<(), MinerError> {
        let job_id = params["job_id"]
            .as_str()
            .ok_or_else(|| MinerError::ProtocolError("Missing job_id".to_string()))?
            .to_string();

        let template = JobTemplate {
            header_hash: decode_hash(params, "header_hash")?,
            target: decode_hash(params, "target")?,
            job_id,
        };

        log::info!("New job {} from pool", template.job_id);
        self.work.update_job(template);
        Ok(())
    }

    /// Sends login request to the mining pool
    async fn login(&self, sink: &mut WsSink) -> Result<(), MinerError> {
        let message = json!({
            "method": "login",
            "params": {
                "login": self.config.worker_name,
                "pass": self.config.password,
                "agent": format!("split_miner-rs/{}", env!("CARGO_PKG_VERSION"))
            },
            "id": self.next_id()
        });

        send(sink, message).await
    }

    /// Sends subscription request to the mining pool
    async fn subscribe(&self, sink: &mut WsSink) -> Result<(), MinerError> {
        let message = json!({
            "method": "subscribe",
            "params": {
                "worker_id": self.config.worker_name
            },
            "id": self.next_id()
        });

        send(sink, message).await
    }

    /// Submits a found share, credited to the share's payout address
    async fn submit_share(&self, sink: &mut WsSink, share: &Submission) -> Result<(), MinerError> {
        let message = submit_message(&self.config.worker_name, share, self.next_id());
        log::debug!("Submitting share for {} (job {})", share.address, share.job_id);
        send(sink, message).await
    }

    /// Puts an unsent share back on the queue for the next session
    fn requeue(&self, share: Submission) {
        log::debug!("Requeueing share for job {}", share.job_id);
        if self.work.share_sender.send(share).is_err() {
            log::warn!("Share queue closed, dropping unsent share");
        }
    }

    /// Sends keepalive message to maintain connection
    async fn keep_alive(&self, sink: &mut WsSink) -> Result<(), MinerError> {
        send(sink, json!({"method": "keepalived"})).await
    }

    fn next_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed)
    }
}

/// Sleeps for `delay`, returning early with `true` once `cancel` fires
async fn sleep_unless_cancelled(delay: Duration, cancel: &CancelToken) -> bool {
    let sleep = time::sleep(delay);
    tokio::pin!(sleep);
    let mut cancel_check = time::interval(CANCEL_POLL_INTERVAL);

    loop {
        tokio::select! {
            _ = &mut sleep => return cancel.is_cancelled(),
            _ = cancel_check.tick() => {
                if cancel.is_cancelled() {
                    return true;
                }
            }
        }
    }
}

/// Builds the JSON body of a share submission
fn submit_message(worker_name: &str, share: &Submission, id: u64) -> Value {
    json!({
        "method": "submit",
        "params": {
            "id": worker_name,
            "login": share.address,
            "job_id": share.job_id,
            "nonce": hex::encode(share.nonce),
            "result": hex::encode(share.hash)
        },
        "id": id
    })
}

/// Internal helper for sending JSON messages over WebSocket
async fn send(sink: &mut WsSink, value: Value) -> Result<(), MinerError> {
    sink.send(Message::Text(value.to_string().into())).await?;
    Ok(())
}

/// Decodes a 32-byte hex field from a job object
fn decode_hash(params: &Value, field: &str) -> Result<[u8; HASH_SIZE], MinerError> {
    let hex_str = params[field]
        .as_str()
        .ok_or_else(|| MinerError::ProtocolError(format!("Missing {}", field)))?;

    let mut out = [0u8; HASH_SIZE];
    hex::decode_to_slice(hex_str, &mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    const HEADER: &str = "0101010101010101010101010101010101010101010101010101010101010101";
    const TARGET: &str = "0000ffffffffffffffffffffffffffffffffffffffffffffffffffffffffffff";

    fn pool_config(url: &str) -> PoolConfig {
        PoolConfig {
            url: url.into(),
            worker_name: "rig-1".into(),
            password: "x".into(),
            max_reconnect_attempts: 3,
            reconnect_delay: Duration::from_millis(10),
        }
    }

    fn client(batch: u64) -> PoolClient {
        PoolClient::new(pool_config("ws://127.0.0.1:3333"), batch)
    }

    fn template(id: String) -> JobTemplate {
        JobTemplate {
            job_id: id,
            header_hash: [1u8; HASH_SIZE],
            target: [0xFFu8; HASH_SIZE],
        }
    }

    fn job_message(id: &str) -> String {
        json!({
            "method": "job",
            "params": { "job_id": id, "header_hash": HEADER, "target": TARGET }
        })
        .to_string()
    }

    #[test]
    fn no_job_before_first_template() {
        let client = client(100);
        let cancel = CancelToken::new();
        cancel.cancel();
        assert_eq!(client.work().next_job(&cancel).unwrap(), None);
    }

    #[test]
    fn job_notification_feeds_workers() {
        let client = client(100);
        client.handle_message(&job_message("abc")).unwrap();

        let work = client.work();
        let cancel = CancelToken::new();
        let first = work.next_job(&cancel).unwrap().unwrap();
        let second = work.next_job(&cancel).unwrap().unwrap();

        assert_eq!(first.job_id, "abc");
        assert_eq!(first.header_hash, [1u8; HASH_SIZE]);
        assert_eq!(&first.target[..3], &[0x00, 0x00, 0xFF]);
        assert_eq!((first.nonce_start, first.nonce_end), (0, 100));
        assert_eq!((second.nonce_start, second.nonce_end), (100, 200));
    }

    #[test]
    fn new_template_restarts_nonce_distribution() {
        let client = client(50);
        let cancel = CancelToken::new();
        client.handle_message(&job_message("one")).unwrap();
        client.work().next_job(&cancel).unwrap();

        client.handle_message(&job_message("two")).unwrap();
        let job = client.work().next_job(&cancel).unwrap().unwrap();

        assert_eq!(job.job_id, "two");
        assert_eq!(job.nonce_start, 0);
        assert_eq!(client.work().templates_received(), 2);
    }

    #[test]
    fn login_response_may_carry_first_job() {
        let client = client(10);
        let response = json!({
            "id": 1,
            "result": {
                "status": "OK",
                "job": { "job_id": "login-job", "header_hash": HEADER, "target": TARGET }
            }
        });
        client.handle_message(&response.to_string()).unwrap();
        assert_eq!(client.work().current_job_id().as_deref(), Some("login-job"));
    }

    #[test]
    fn malformed_jobs_are_rejected() {
        let client = client(10);
        let missing_target = json!({
            "method": "job",
            "params": { "job_id": "x", "header_hash": HEADER }
        });
        assert!(matches!(
            client.handle_message(&missing_target.to_string()),
            Err(MinerError::ProtocolError(_))
        ));

        let short_header = json!({
            "method": "job",
            "params": { "job_id": "x", "header_hash": "abcd", "target": TARGET }
        });
        assert!(matches!(
            client.handle_message(&short_header.to_string()),
            Err(MinerError::InputError(_))
        ));

        assert!(client.handle_message("not json").is_err());
        assert_eq!(client.work().current_job_id(), None);
    }

    #[test]
    fn acknowledgements_and_rejections_are_not_errors() {
        let client = client(10);
        assert!(client.handle_message(r#"{"id":3,"result":{"status":"OK"},"error":null}"#).is_ok());
        assert!(client.handle_message(r#"{"id":4,"error":{"code":-1,"message":"Low difficulty"}}"#).is_ok());
    }

    #[test]
    fn submitted_shares_are_queued_for_the_connection() {
        let client = client(10);
        let job = MiningJob {
            job_id: "abc".into(),
            header_hash: [0u8; HASH_SIZE],
            target: [0xFFu8; HASH_SIZE],
            nonce_start: 0,
            nonce_end: 10,
        };
        let result = MiningResult::new(7, [9u8; HASH_SIZE]);
        client.work().submit("primary-addr", &result, &job).unwrap();

        let mut rx = client.share_receiver.try_lock().unwrap();
        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.address, "primary-addr");
        assert_eq!(queued.job_id, "abc");
        assert_eq!(queued.nonce, 7u64.to_le_bytes());

        let body = submit_message("rig-1", &queued, 5);
        assert_eq!(body["params"]["login"], "primary-addr");
        assert_eq!(body["params"]["nonce"], "0700000000000000");
        assert_eq!(body["id"], 5);
    }

    #[test]
    fn submit_fails_once_connection_loop_is_gone() {
        let client = client(10);
        let work = client.work();
        drop(client);

        let job = MiningJob {
            job_id: "abc".into(),
            header_hash: [0u8; HASH_SIZE],
            target: [0xFFu8; HASH_SIZE],
            nonce_start: 0,
            nonce_end: 10,
        };
        let result = MiningResult::new(1, [0u8; HASH_SIZE]);
        assert!(matches!(
            work.submit("a", &result, &job),
            Err(MinerError::SubmitError(_))
        ));
    }

    #[test]
    fn ranges_stay_contiguous_per_template_under_concurrent_updates() {
        use std::collections::HashMap;
        use std::sync::atomic::AtomicBool;

        const BATCH: u64 = 16;
        let client = client(BATCH);
        let work = client.work();
        work.update_job(template("job-0".into()));
        let done = Arc::new(AtomicBool::new(false));

        let fetchers: Vec<_> = (0..4)
            .map(|_| {
                let work = client.work();
                let done = done.clone();
                std::thread::spawn(move || {
                    let cancel = CancelToken::new();
                    let mut seen = Vec::new();
                    while !done.load(Ordering::SeqCst) {
                        if let Some(job) = work.next_job(&cancel).unwrap() {
                            seen.push((job.job_id, job.nonce_start));
                        }
                    }
                    seen
                })
            })
            .collect();

        for i in 1..200 {
            work.update_job(template(format!("job-{}", i)));
            std::thread::yield_now();
        }
        done.store(true, Ordering::SeqCst);

        let mut per_template: HashMap<String, Vec<u64>> = HashMap::new();
        for (job_id, start) in fetchers.into_iter().flat_map(|h| h.join().unwrap()) {
            per_template.entry(job_id).or_default().push(start);
        }
        // Every template's ranges start at zero with no gaps or repeats
        for (job_id, mut starts) in per_template {
            starts.sort_unstable();
            let expected: Vec<u64> = (0..starts.len() as u64).map(|i| i * BATCH).collect();
            assert_eq!(starts, expected, "ranges of {}", job_id);
        }
    }

    #[test]
    fn requeued_share_is_sent_by_the_next_session() {
        let client = client(10);
        client.requeue(Submission {
            address: "secondary-addr".into(),
            job_id: "abc".into(),
            nonce: 3u64.to_le_bytes(),
            hash: [0u8; HASH_SIZE],
        });

        let mut rx = client.share_receiver.try_lock().unwrap();
        let queued = rx.try_recv().unwrap();
        assert_eq!(queued.address, "secondary-addr");
        assert_eq!(queued.nonce, 3u64.to_le_bytes());
    }

    #[tokio::test]
    async fn invalid_url_is_a_url_error() {
        let mut config = pool_config("not a url");
        config.max_reconnect_attempts = 1;
        let client = PoolClient::new(config, 10);

        let result = client.run(CancelToken::new()).await;
        assert!(matches!(result, Err(MinerError::UrlError(_))));
    }

    #[tokio::test]
    async fn cancel_cuts_the_reconnect_delay_short() {
        let mut config = pool_config("ws://127.0.0.1:1");
        config.max_reconnect_attempts = 5;
        config.reconnect_delay = Duration::from_secs(60);
        let client = PoolClient::new(config, 10);

        let cancel = CancelToken::new();
        let canceller = {
            let cancel = cancel.clone();
            tokio::spawn(async move {
                time::sleep(Duration::from_millis(100)).await;
                cancel.cancel();
            })
        };

        let result = time::timeout(Duration::from_secs(10), client.run(cancel)).await;
        assert!(matches!(result, Ok(Ok(()))));
        canceller.await.unwrap();
    }

    #[tokio::test]
    async fn uncancelled_sleep_runs_to_completion() {
        let cancel = CancelToken::new();
        assert!(!sleep_unless_cancelled(Duration::from_millis(20), &cancel).await);
        cancel.cancel();
        assert!(sleep_unless_cancelled(Duration::from_secs(60), &cancel).await);
    }
}
