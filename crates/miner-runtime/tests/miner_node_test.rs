//! # Miner Node Integration Tests
//!
//! Two peers on one `InMemoryNetwork`: a requester ("node-a") that publishes
//! to the miner's inbox and listens on its own, and a running miner
//! ("node-b").
//!
//! Timing-sensitive tests use real time with generous margins.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use miner_runtime::{MinerRuntime, NodeConfig, RuntimeTasks};
use miner_storage::{ContentApi, ContentService, FetchError, InMemoryContentStore};
use rand::Rng;
use shared_bus::{
    InMemoryNetwork, InMemoryPubSub, InboundMessage, PubSub, Subscription, SubscriptionError,
    TopicHandle,
};
use shared_types::{
    decode_envelope, encode_envelope, heartbeat_topic, inbox_topic, BusError, CodecError,
    ContentId, Envelope, FetchRequest, FetchResponse, FetchStatus, HeartBeat, MessageKind, NodeId,
    NodeRole, Payload, SampleRequest, SampleRequestItem, SampleResponse, SampleResponseItem,
    SampleStatus, MAX_ENVELOPE_SIZE, MAX_SAMPLE_REQUEST_SIZE,
};
use tokio::time::{timeout, Instant};

const RESPONSE_TIMEOUT: Duration = Duration::from_secs(3);

fn config() -> NodeConfig {
    let mut config = NodeConfig::default();
    config.identity.wallet_address = "0xminer".into();
    config.runtime.heartbeat_interval = Duration::from_secs(60);
    config.runtime.retry_delay = Duration::from_millis(10);
    config.runtime.max_inflight_handlers = 8;
    config
}

fn miner_id() -> NodeId {
    NodeId::new("node-b")
}

/// The requesting peer.
struct Requester {
    bus: InMemoryPubSub,
    _inbox_handle: TopicHandle,
    inbox: Box<dyn Subscription>,
}

impl Requester {
    async fn connect(network: &InMemoryNetwork) -> Self {
        let bus = network.connect(NodeId::new("node-a"));
        let handle = bus.join(&inbox_topic(bus.local_id())).await.unwrap();
        let inbox = bus.subscribe(&handle).await.unwrap();
        Self {
            bus,
            _inbox_handle: handle,
            inbox,
        }
    }

    async fn send_raw(&self, to: &NodeId, bytes: Vec<u8>) {
        let handle = self.bus.join(&inbox_topic(to)).await.unwrap();
        self.bus.publish(&handle, bytes).await.unwrap();
        self.bus.close(handle).await;
    }

    async fn send(&self, to: &NodeId, envelope: &Envelope) {
        self.send_raw(to, encode_envelope(envelope).unwrap()).await;
    }

    async fn recv(&mut self) -> (NodeId, Envelope) {
        self.recv_within(RESPONSE_TIMEOUT).await
    }

    async fn recv_within(&mut self, limit: Duration) -> (NodeId, Envelope) {
        let message = timeout(limit, self.inbox.next())
            .await
            .expect("Should receive within timeout")
            .expect("Should have message");
        (message.sender, decode_envelope(&message.data).unwrap())
    }
}

fn start_miner(
    network: &InMemoryNetwork,
    config: &NodeConfig,
    content: Arc<dyn ContentApi>,
) -> MinerRuntime {
    MinerRuntime::new(config, Arc::new(network.connect(miner_id())), content)
}

async fn stop(runtime: &MinerRuntime, tasks: RuntimeTasks) {
    runtime.shutdown();
    timeout(Duration::from_secs(1), tasks.join())
        .await
        .expect("Loops should stop promptly")
        .unwrap();
}

fn fetch(content_id: &ContentId, nonce: &str) -> Envelope {
    Envelope::with_nonce(
        Payload::FetchRequest(FetchRequest {
            content_id: content_id.clone(),
        }),
        nonce,
    )
}

fn fetch_status(envelope: &Envelope) -> FetchStatus {
    match &envelope.payload {
        Payload::FetchResponse(response) => response.status,
        other => panic!("Expected FetchResponse, got {:?}", other),
    }
}

/// Content API that delays every call and tracks concurrency.
struct SlowContent {
    inner: ContentService,
    delay: Duration,
    running: AtomicUsize,
    peak: AtomicUsize,
}

impl SlowContent {
    fn new(inner: ContentService, delay: Duration) -> Self {
        Self {
            inner,
            delay,
            running: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        }
    }

    async fn delayed<T>(&self, work: impl std::future::Future<Output = T>) -> T {
        let now = self.running.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        let result = work.await;
        self.running.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

#[async_trait]
impl ContentApi for SlowContent {
    async fn fetch(&self, content_id: &ContentId) -> Result<(), FetchError> {
        self.delayed(self.inner.fetch(content_id)).await
    }

    async fn sample(&self, items: &[SampleRequestItem]) -> Vec<SampleResponseItem> {
        self.delayed(self.inner.sample(items)).await
    }
}

/// Content API that panics when asked to fetch "boom".
struct PanickyContent {
    inner: ContentService,
}

#[async_trait]
impl ContentApi for PanickyContent {
    async fn fetch(&self, content_id: &ContentId) -> Result<(), FetchError> {
        if content_id.as_str() == "boom" {
            panic!("store driver crashed");
        }
        self.inner.fetch(content_id).await
    }

    async fn sample(&self, items: &[SampleRequestItem]) -> Vec<SampleResponseItem> {
        self.inner.sample(items).await
    }
}

/// Transport whose subscriptions fail a few times before delivering.
struct FlakyBus {
    inner: InMemoryPubSub,
    failures: usize,
}

struct FlakySubscription {
    inner: Box<dyn Subscription>,
    failures_left: usize,
}

#[async_trait]
impl Subscription for FlakySubscription {
    async fn next(&mut self) -> Result<InboundMessage, SubscriptionError> {
        if self.failures_left > 0 {
            self.failures_left -= 1;
            return Err(SubscriptionError::Transport("connection reset".into()));
        }
        self.inner.next().await
    }

    fn topic(&self) -> &str {
        self.inner.topic()
    }
}

#[async_trait]
impl PubSub for FlakyBus {
    fn local_id(&self) -> &NodeId {
        self.inner.local_id()
    }

    async fn join(&self, topic: &str) -> Result<TopicHandle, BusError> {
        self.inner.join(topic).await
    }

    async fn subscribe(&self, handle: &TopicHandle) -> Result<Box<dyn Subscription>, BusError> {
        Ok(Box::new(FlakySubscription {
            inner: self.inner.subscribe(handle).await?,
            failures_left: self.failures,
        }))
    }

    async fn publish(&self, handle: &TopicHandle, data: Vec<u8>) -> Result<(), BusError> {
        self.inner.publish(handle, data).await
    }

    async fn close(&self, handle: TopicHandle) {
        self.inner.close(handle).await
    }
}

/// A sample request for a retained object is answered with the bytes at the
/// requested offsets, in order, echoing the nonce.
#[tokio::test]
async fn test_sample_request_round_trip() {
    // Arrange: miner holds a 1000-byte object
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let mut data = vec![0u8; 1000];
    rand::thread_rng().fill(&mut data[..]);
    let cid = store.insert_retained(data.clone());

    let runtime = start_miner(&network, &config(), Arc::new(ContentService::new(store)));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    // Act
    let request = Envelope::with_nonce(
        Payload::SampleRequest(SampleRequest {
            items: vec![SampleRequestItem {
                content_id: cid.clone(),
                positions: vec![10, 555],
            }],
        }),
        "n1",
    );
    requester.send(&miner_id(), &request).await;

    // Assert
    let (sender, response) = requester.recv().await;
    assert_eq!(sender, miner_id());
    assert_eq!(response.nonce.as_deref(), Some("n1"));
    assert_eq!(
        response.payload,
        Payload::SampleResponse(SampleResponse {
            items: vec![SampleResponseItem {
                content_id: cid,
                positions: vec![10, 555],
                sampled_bytes: vec![data[10], data[555]],
                status: SampleStatus::Ok,
            }],
        })
    );

    stop(&runtime, tasks).await;
}

/// The largest sample request the codec accepts is still answered in full;
/// one position more is refused before it reaches the wire.
#[tokio::test]
async fn test_largest_sample_request_is_answered() {
    // Arrange: a request filled with single-byte positions up to the bound
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_retained(vec![1, 2, 3, 4]);

    let runtime = start_miner(&network, &config(), Arc::new(ContentService::new(store)));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    let mut item = SampleRequestItem {
        content_id: cid.clone(),
        positions: Vec::new(),
    };
    let empty = Envelope::with_nonce(
        Payload::SampleRequest(SampleRequest {
            items: vec![item.clone()],
        }),
        "big",
    );
    let overhead = encode_envelope(&empty).unwrap().len() as u64 + 8;
    item.positions = vec![2; (MAX_SAMPLE_REQUEST_SIZE - overhead) as usize];
    let count = item.positions.len();

    let request = Envelope::with_nonce(
        Payload::SampleRequest(SampleRequest {
            items: vec![item.clone()],
        }),
        "big",
    );
    let bytes = encode_envelope(&request).unwrap();
    assert!(bytes.len() as u64 <= MAX_SAMPLE_REQUEST_SIZE);

    let mut oversized = item.clone();
    oversized.positions.resize(MAX_SAMPLE_REQUEST_SIZE as usize, 2);
    assert!(matches!(
        encode_envelope(&Envelope::new(Payload::SampleRequest(SampleRequest {
            items: vec![oversized],
        }))),
        Err(CodecError::TooLarge { .. })
    ));

    // Act
    requester.send_raw(&miner_id(), bytes).await;

    // Assert
    let (_, response) = requester.recv_within(Duration::from_secs(60)).await;
    assert_eq!(response.nonce.as_deref(), Some("big"));
    let Payload::SampleResponse(SampleResponse { items }) = response.payload else {
        panic!("Expected SampleResponse");
    };
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].status, SampleStatus::Ok);
    assert_eq!(items[0].positions.len(), count);
    assert_eq!(items[0].sampled_bytes, vec![3; count]);
    assert!(encode_envelope(&Envelope::new(Payload::SampleResponse(SampleResponse {
        items,
    })))
    .is_ok_and(|encoded| encoded.len() as u64 <= MAX_ENVELOPE_SIZE));

    stop(&runtime, tasks).await;
}

/// An unreachable object yields `FetchStatus::Error`, and the miner keeps
/// serving afterwards.
#[tokio::test]
async fn test_unreachable_fetch_reports_error() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let unreachable = store.insert_remote(b"far away".to_vec());
    store.mark_unreachable(unreachable.clone());
    let reachable = store.insert_remote(b"close by".to_vec());

    let runtime = start_miner(
        &network,
        &config(),
        Arc::new(ContentService::new(store.clone())),
    );
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    requester.send(&miner_id(), &fetch(&unreachable, "y")).await;
    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("y"));
    assert_eq!(
        response.payload,
        Payload::FetchResponse(FetchResponse {
            content_id: unreachable,
            status: FetchStatus::Error,
        })
    );

    requester.send(&miner_id(), &fetch(&reachable, "z")).await;
    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("z"));
    assert_eq!(fetch_status(&response), FetchStatus::Ok);

    stop(&runtime, tasks).await;
}

/// A fetched object can be sampled by a later request.
#[tokio::test]
async fn test_fetch_then_sample() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"abcdefgh".to_vec());

    let runtime = start_miner(&network, &config(), Arc::new(ContentService::new(store)));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    requester.send(&miner_id(), &fetch(&cid, "f")).await;
    let (_, response) = requester.recv().await;
    assert_eq!(fetch_status(&response), FetchStatus::Ok);

    let request = Envelope::new(Payload::SampleRequest(SampleRequest {
        items: vec![SampleRequestItem {
            content_id: cid,
            positions: vec![7, 0, 8],
        }],
    }));
    requester.send(&miner_id(), &request).await;
    let (_, response) = requester.recv().await;

    assert_eq!(response.nonce, None);
    let Payload::SampleResponse(sampled) = response.payload else {
        panic!("Expected SampleResponse");
    };
    assert_eq!(sampled.items[0].sampled_bytes, b"ha".to_vec());
    assert_eq!(
        sampled.items[0].status,
        SampleStatus::OutOfRange { position: 8 }
    );

    stop(&runtime, tasks).await;
}

/// Kinds without a handler produce no response.
#[tokio::test]
async fn test_unregistered_kind_gets_no_response() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"x".to_vec());

    let runtime = start_miner(&network, &config(), Arc::new(ContentService::new(store)));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    let stray = Envelope::with_nonce(
        Payload::FetchResponse(FetchResponse {
            content_id: cid.clone(),
            status: FetchStatus::Ok,
        }),
        "stray",
    );
    requester.send(&miner_id(), &stray).await;
    let heartbeat = Envelope::with_nonce(
        Payload::HeartBeat(HeartBeat {
            wallet_address: "0xother".into(),
            role: NodeRole::Miner,
        }),
        "beat",
    );
    requester.send(&miner_id(), &heartbeat).await;
    requester.send(&miner_id(), &fetch(&cid, "after")).await;

    // The first and only response answers the fetch.
    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("after"));
    assert_eq!(response.kind(), MessageKind::FetchFileResponse);
    assert!(timeout(Duration::from_millis(200), requester.inbox.next())
        .await
        .is_err());

    stop(&runtime, tasks).await;
}

/// Bytes that are not an envelope are dropped without a response.
#[tokio::test]
async fn test_undecodable_message_is_dropped() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"x".to_vec());

    let runtime = start_miner(&network, &config(), Arc::new(ContentService::new(store)));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    requester.send_raw(&miner_id(), vec![0xff, 0x13, 0x37]).await;
    requester.send_raw(&miner_id(), Vec::new()).await;
    requester.send(&miner_id(), &fetch(&cid, "valid")).await;

    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("valid"));

    stop(&runtime, tasks).await;
}

/// A panicking handler does not stop the next message from being served.
#[tokio::test]
async fn test_handler_panic_is_contained() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"survivor".to_vec());
    let content = PanickyContent {
        inner: ContentService::new(store),
    };

    let runtime = start_miner(&network, &config(), Arc::new(content));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    let boom = ContentId::new("boom").unwrap();
    requester.send(&miner_id(), &fetch(&boom, "crash")).await;
    requester.send(&miner_id(), &fetch(&cid, "next")).await;

    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("next"));
    assert_eq!(fetch_status(&response), FetchStatus::Ok);

    stop(&runtime, tasks).await;
}

/// Heartbeats start immediately and keep their period while a slow handler
/// is running.
#[tokio::test]
async fn test_heartbeat_during_slow_handler() {
    let network = InMemoryNetwork::new();
    let observer = network.connect(NodeId::new("observer"));
    let beat_handle = observer.join(&heartbeat_topic()).await.unwrap();
    let mut beats = observer.subscribe(&beat_handle).await.unwrap();

    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"slow".to_vec());
    let content = SlowContent::new(ContentService::new(store), Duration::from_millis(800));

    let mut config = config();
    config.runtime.heartbeat_interval = Duration::from_millis(100);
    let runtime = start_miner(&network, &config, Arc::new(content));
    let tasks = runtime.start().await.unwrap();

    // First heartbeat arrives right away.
    let first = timeout(Duration::from_millis(500), beats.next())
        .await
        .expect("First heartbeat within one period")
        .unwrap();
    assert_eq!(first.sender, miner_id());
    assert_eq!(
        decode_envelope(&first.data).unwrap().payload,
        Payload::HeartBeat(HeartBeat {
            wallet_address: "0xminer".into(),
            role: NodeRole::Miner,
        })
    );

    let mut requester = Requester::connect(&network).await;
    requester.send(&miner_id(), &fetch(&cid, "slow")).await;

    // While the fetch sleeps, heartbeats continue.
    let deadline = Instant::now() + Duration::from_millis(500);
    let mut during = 0;
    while let Ok(Ok(_)) = tokio::time::timeout_at(deadline, beats.next()).await {
        during += 1;
    }
    assert!(during >= 3, "only {} heartbeats while handler ran", during);

    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("slow"));

    stop(&runtime, tasks).await;
}

/// No more than `max_inflight_handlers` handlers run at once, and every
/// request is still answered.
#[tokio::test]
async fn test_inflight_handlers_are_bounded() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cids: Vec<ContentId> = (0..6u8)
        .map(|i| store.insert_remote(vec![i; 16]))
        .collect();
    let content = Arc::new(SlowContent::new(
        ContentService::new(store),
        Duration::from_millis(100),
    ));

    let mut config = config();
    config.runtime.max_inflight_handlers = 2;
    let runtime = start_miner(&network, &config, content.clone());
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    for (i, cid) in cids.iter().enumerate() {
        requester.send(&miner_id(), &fetch(cid, &format!("n{}", i))).await;
    }

    let mut statuses = HashMap::new();
    for _ in 0..cids.len() {
        let (_, response) = requester.recv().await;
        statuses.insert(response.nonce.clone().unwrap(), fetch_status(&response));
    }

    assert_eq!(statuses.len(), 6);
    assert!(statuses.values().all(|s| *s == FetchStatus::Ok));
    assert!(content.peak.load(Ordering::SeqCst) <= 2);

    stop(&runtime, tasks).await;
}

/// Transient receive errors are retried until messages flow again.
#[tokio::test]
async fn test_receive_errors_are_retried() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"eventually".to_vec());
    let bus = FlakyBus {
        inner: network.connect(miner_id()),
        failures: 3,
    };

    let runtime = MinerRuntime::new(
        &config(),
        Arc::new(bus),
        Arc::new(ContentService::new(store)),
    );
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    requester.send(&miner_id(), &fetch(&cid, "retry")).await;

    let (_, response) = requester.recv().await;
    assert_eq!(response.nonce.as_deref(), Some("retry"));
    assert_eq!(fetch_status(&response), FetchStatus::Ok);

    stop(&runtime, tasks).await;
}

/// Shutdown ends both loops promptly even with a handler still running,
/// and releases the inbox subscription.
#[tokio::test]
async fn test_shutdown_is_prompt() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let cid = store.insert_remote(b"x".to_vec());
    let content = SlowContent::new(ContentService::new(store), Duration::from_secs(5));

    let runtime = start_miner(&network, &config(), Arc::new(content));
    let tasks = runtime.start().await.unwrap();
    let requester = Requester::connect(&network).await;
    requester.send(&miner_id(), &fetch(&cid, "pending")).await;
    tokio::time::sleep(Duration::from_millis(50)).await;

    let started = Instant::now();
    stop(&runtime, tasks).await;

    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(network.subscriber_count(&inbox_topic(&miner_id())), 0);
}

/// Responses to concurrent requests are correlated purely by nonce.
#[tokio::test]
async fn test_concurrent_requests_correlate_by_nonce() {
    let network = InMemoryNetwork::new();
    let store = Arc::new(InMemoryContentStore::new());
    let retained = store.insert_retained((0..=255u8).collect());
    let remote = store.insert_remote(b"remote".to_vec());

    let runtime = start_miner(&network, &config(), Arc::new(ContentService::new(store)));
    let tasks = runtime.start().await.unwrap();
    let mut requester = Requester::connect(&network).await;

    requester.send(&miner_id(), &fetch(&remote, "fetch-1")).await;
    let sample = Envelope::with_nonce(
        Payload::SampleRequest(SampleRequest {
            items: vec![SampleRequestItem {
                content_id: retained,
                positions: vec![42],
            }],
        }),
        "sample-1",
    );
    requester.send(&miner_id(), &sample).await;

    let mut nonces = HashSet::new();
    for _ in 0..2 {
        let (_, response) = requester.recv().await;
        match (response.nonce.as_deref(), &response.payload) {
            (Some("fetch-1"), Payload::FetchResponse(r)) => assert_eq!(r.status, FetchStatus::Ok),
            (Some("sample-1"), Payload::SampleResponse(r)) => {
                assert_eq!(r.items[0].sampled_bytes, vec![42])
            }
            other => panic!("Unexpected response {:?}", other),
        }
        nonces.insert(response.nonce.unwrap());
    }
    assert_eq!(nonces.len(), 2);

    stop(&runtime, tasks).await;
}
