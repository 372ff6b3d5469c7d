#![allow(dead_code)]

//! Shared test harness: a capture device scripted from the test body.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use micrec::{
    AudioChunk, CaptureDevice, CaptureFormat, CaptureStream, DeviceUnavailable, FaultSlot, Phase,
    RecordingSession, StopSignal,
};
use tokio::sync::{mpsc, oneshot};

pub const TEST_FORMAT: CaptureFormat = CaptureFormat {
    sample_rate: 16000,
    channels: 1,
};

/// Capture device driven entirely by the test: grants streams the test
/// feeds by hand through a `StreamTap`, denies access when told to, and
/// counts how often granted streams get released.
#[derive(Clone, Default)]
pub struct ScriptedDevice {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    denials: Mutex<VecDeque<String>>,
    gate: Mutex<Option<oneshot::Receiver<()>>>,
    taps: Mutex<Vec<StreamTap>>,
    releases: Arc<AtomicUsize>,
}

impl ScriptedDevice {
    pub fn new() -> Self {
        Self::default()
    }

    /// Refuse the next access request with this reason
    pub fn deny_next(&self, reason: &str) {
        self.inner
            .denials
            .lock()
            .unwrap()
            .push_back(reason.to_string());
    }

    /// Hold the next access request until the returned sender fires
    pub fn gate_next(&self) -> oneshot::Sender<()> {
        let (open, gate) = oneshot::channel();
        *self.inner.gate.lock().unwrap() = Some(gate);
        open
    }

    /// Tap into the nth granted stream
    pub fn tap(&self, index: usize) -> StreamTap {
        self.inner.taps.lock().unwrap()[index].clone()
    }

    /// How many streams have been granted
    pub fn grants(&self) -> usize {
        self.inner.taps.lock().unwrap().len()
    }

    /// How many granted streams have been released
    pub fn releases(&self) -> usize {
        self.inner.releases.load(Ordering::SeqCst)
    }
}

#[async_trait::async_trait]
impl CaptureDevice for ScriptedDevice {
    async fn request_access(&self) -> Result<CaptureStream, DeviceUnavailable> {
        let gate = self.inner.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            let _ = gate.await;
        }
        if let Some(reason) = self.inner.denials.lock().unwrap().pop_front() {
            return Err(DeviceUnavailable::new(reason));
        }

        let (tx, rx) = mpsc::channel(64);
        let feed = Arc::new(Mutex::new(Some(tx)));
        let fault = FaultSlot::new();
        let tap = StreamTap {
            feed: Arc::clone(&feed),
            fault: fault.clone(),
            releases: Arc::clone(&self.inner.releases),
            pushed: Arc::new(AtomicU64::new(0)),
        };
        self.inner.taps.lock().unwrap().push(tap);

        let releases = Arc::clone(&self.inner.releases);
        let stop = StopSignal::new(move || {
            // Closing the feed is the release; count it once no matter
            // which side ends the stream first
            if feed.lock().unwrap().take().is_some() {
                releases.fetch_add(1, Ordering::SeqCst);
            }
        });

        Ok(CaptureStream {
            format: TEST_FORMAT,
            chunks: rx,
            fault,
            stop,
        })
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// Test-side handle to one granted stream
#[derive(Clone)]
pub struct StreamTap {
    feed: Arc<Mutex<Option<mpsc::Sender<AudioChunk>>>>,
    fault: FaultSlot,
    releases: Arc<AtomicUsize>,
    pushed: Arc<AtomicU64>,
}

impl StreamTap {
    /// Feed one chunk into the live stream
    pub async fn push(&self, pcm: &[u8]) {
        let sender = { self.feed.lock().unwrap().clone() };
        let sender = sender.expect("stream already closed");
        let sequence = self.pushed.fetch_add(1, Ordering::SeqCst);
        sender
            .send(AudioChunk {
                pcm: pcm.to_vec(),
                timestamp_ms: sequence * 100,
            })
            .await
            .expect("session dropped the live stream");
    }

    /// End the stream abnormally with a fault message
    pub fn fail(&self, message: &str) {
        self.fault.set(message);
        self.close();
    }

    /// Close the stream from the device side
    pub fn close(&self) {
        if self.feed.lock().unwrap().take().is_some() {
            self.releases.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Session wired to a fresh scripted device
pub fn scripted_session() -> (RecordingSession, ScriptedDevice) {
    let device = ScriptedDevice::new();
    let session = RecordingSession::new(Box::new(device.clone()));
    (session, device)
}

/// Poll until the session reaches the given phase, for takes that end on
/// their own
pub async fn wait_for_phase(session: &RecordingSession, phase: Phase) {
    for _ in 0..200 {
        if session.status().await.phase == phase {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Session never reached {:?}", phase);
}

/// Poll until the session has appended at least `count` chunks
pub async fn wait_for_chunks(session: &RecordingSession, count: usize) {
    for _ in 0..200 {
        if session.status().await.chunks_received >= count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("Session never saw {} chunks", count);
}
