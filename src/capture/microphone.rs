use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, error, info, warn};

use super::device::{
    AudioChunk, CaptureConfig, CaptureDevice, CaptureFormat, CaptureStream, DeviceUnavailable,
    FaultSlot, StopSignal,
};

/// Buffered chunks between the audio callback and the session
const CHUNK_QUEUE_DEPTH: usize = 100;

/// How often the capture thread drains batched samples
const DRAIN_INTERVAL: Duration = Duration::from_millis(20);

/// Microphone capture via cpal.
///
/// Each granted stream is serviced by a dedicated OS thread because cpal
/// streams are not `Send`. The thread owns the stream, drains batched
/// samples into the chunk channel, and drops the stream exactly once when
/// the stop signal fires or the stream faults.
pub struct MicrophoneDevice {
    config: CaptureConfig,
}

impl MicrophoneDevice {
    pub fn new(config: CaptureConfig) -> Self {
        Self { config }
    }

    /// Resolve the requested input device against the default host
    fn open_input(preferred: Option<&str>) -> Result<cpal::Device, DeviceUnavailable> {
        let host = cpal::default_host();
        match preferred {
            Some(name) => {
                let mut devices = host.input_devices().map_err(|e| {
                    DeviceUnavailable::new(format!("Cannot enumerate input devices: {}", e))
                })?;
                devices
                    .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                    .ok_or_else(|| {
                        DeviceUnavailable::new(format!("Input device '{}' not found", name))
                    })
            }
            None => host
                .default_input_device()
                .ok_or_else(|| DeviceUnavailable::new("No input device available")),
        }
    }

    /// Pick a stream config for the device.
    ///
    /// Prefers an i16 or f32 config matching the requested rate and channel
    /// count, falling back to the device default when nothing matches.
    fn pick_config(
        device: &cpal::Device,
        want: &CaptureConfig,
    ) -> Result<(cpal::StreamConfig, cpal::SampleFormat, CaptureFormat), DeviceUnavailable> {
        let supported = device.supported_input_configs().map_err(|e| {
            DeviceUnavailable::new(format!("Cannot query supported stream configs: {}", e))
        })?;

        let wanted_rate = cpal::SampleRate(want.sample_rate);
        let matching = supported
            .filter(|range| {
                matches!(
                    range.sample_format(),
                    cpal::SampleFormat::I16 | cpal::SampleFormat::F32
                )
            })
            .find(|range| {
                range.channels() == want.channels
                    && range.min_sample_rate() <= wanted_rate
                    && range.max_sample_rate() >= wanted_rate
            });

        let config = match matching {
            Some(range) => range.with_sample_rate(wanted_rate),
            None => {
                let default = device.default_input_config().map_err(|e| {
                    DeviceUnavailable::new(format!("No usable input config: {}", e))
                })?;
                warn!(
                    "Requested format {}Hz/{}ch not supported, using device default {}Hz/{}ch",
                    want.sample_rate,
                    want.channels,
                    default.sample_rate().0,
                    default.channels()
                );
                default
            }
        };

        let sample_format = config.sample_format();
        if !matches!(
            sample_format,
            cpal::SampleFormat::I16 | cpal::SampleFormat::F32
        ) {
            return Err(DeviceUnavailable::new(format!(
                "Unsupported sample format: {:?}",
                sample_format
            )));
        }

        let format = CaptureFormat {
            sample_rate: config.sample_rate().0,
            channels: config.channels(),
        };
        Ok((config.config(), sample_format, format))
    }
}

#[async_trait::async_trait]
impl CaptureDevice for MicrophoneDevice {
    async fn request_access(&self) -> Result<CaptureStream, DeviceUnavailable> {
        let config = self.config.clone();
        let stop_flag = Arc::new(AtomicBool::new(false));
        let thread_stop = Arc::clone(&stop_flag);
        let (ready_tx, ready_rx) = oneshot::channel();

        std::thread::Builder::new()
            .name("capture".to_string())
            .spawn(move || capture_thread(config, thread_stop, ready_tx))
            .map_err(|e| DeviceUnavailable::new(format!("Cannot spawn capture thread: {}", e)))?;

        // The thread reports back once the stream is actually playing
        let (format, chunks, fault) = ready_rx
            .await
            .map_err(|_| DeviceUnavailable::new("Capture thread exited before opening device"))??;

        let stop = StopSignal::new(move || {
            stop_flag.store(true, Ordering::SeqCst);
        });

        info!(
            "Capture stream open at {}Hz, {} channel(s)",
            format.sample_rate, format.channels
        );

        Ok(CaptureStream {
            format,
            chunks,
            fault,
            stop,
        })
    }

    fn name(&self) -> &str {
        "microphone"
    }
}

type ReadyPayload = (CaptureFormat, mpsc::Receiver<AudioChunk>, FaultSlot);

/// Body of the dedicated capture thread.
///
/// Opens the device, reports readiness (or the failure) through `ready`,
/// then drains the sample batcher until asked to stop or the stream faults.
/// The cpal stream lives and dies entirely on this thread.
fn capture_thread(
    config: CaptureConfig,
    stop: Arc<AtomicBool>,
    ready: oneshot::Sender<Result<ReadyPayload, DeviceUnavailable>>,
) {
    let opened = MicrophoneDevice::open_input(config.device.as_deref()).and_then(|device| {
        MicrophoneDevice::pick_config(&device, &config)
            .map(|(stream_config, sample_format, format)| {
                (device, stream_config, sample_format, format)
            })
    });

    let (device, stream_config, sample_format, format) = match opened {
        Ok(parts) => parts,
        Err(e) => {
            let _ = ready.send(Err(e));
            return;
        }
    };

    let batcher = Arc::new(Mutex::new(ChunkBatcher::new(format, config.chunk_duration_ms)));
    let fault = FaultSlot::new();
    let failed = Arc::new(AtomicBool::new(false));

    let error_fault = fault.clone();
    let error_failed = Arc::clone(&failed);
    let on_error = move |err: cpal::StreamError| {
        error!("Capture stream error: {}", err);
        error_fault.set(format!("Capture stream error: {}", err));
        error_failed.store(true, Ordering::SeqCst);
    };

    let stream = match sample_format {
        cpal::SampleFormat::I16 => {
            let cb_batcher = Arc::clone(&batcher);
            device.build_input_stream(
                &stream_config,
                move |data: &[i16], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut batch) = cb_batcher.lock() {
                        batch.extend_i16(data);
                    }
                },
                on_error,
                None,
            )
        }
        cpal::SampleFormat::F32 => {
            let cb_batcher = Arc::clone(&batcher);
            device.build_input_stream(
                &stream_config,
                move |data: &[f32], _: &cpal::InputCallbackInfo| {
                    if let Ok(mut batch) = cb_batcher.lock() {
                        batch.extend_f32(data);
                    }
                },
                on_error,
                None,
            )
        }
        other => {
            let _ = ready.send(Err(DeviceUnavailable::new(format!(
                "Unsupported sample format: {:?}",
                other
            ))));
            return;
        }
    };

    let stream = match stream {
        Ok(stream) => stream,
        Err(e) => {
            let _ = ready.send(Err(DeviceUnavailable::new(format!(
                "Cannot open input stream: {}",
                e
            ))));
            return;
        }
    };

    if let Err(e) = stream.play() {
        let _ = ready.send(Err(DeviceUnavailable::new(format!(
            "Cannot start input stream: {}",
            e
        ))));
        return;
    }

    let (tx, rx) = mpsc::channel(CHUNK_QUEUE_DEPTH);
    if ready.send(Ok((format, rx, fault))).is_err() {
        // Caller went away before the stream came up
        return;
    }

    debug!("Capture thread running");
    while !stop.load(Ordering::SeqCst) && !failed.load(Ordering::SeqCst) {
        if !drain_ready(&batcher, &tx) {
            return;
        }
        std::thread::sleep(DRAIN_INTERVAL);
    }

    // Release the device first so no more samples arrive, then flush
    // everything captured up to that point.
    drop(stream);
    if drain_ready(&batcher, &tx) {
        if let Ok(mut batch) = batcher.lock() {
            if let Some(tail) = batch.flush() {
                let _ = tx.blocking_send(tail);
            }
        }
    }
    debug!("Capture thread finished");
}

/// Send every complete chunk in the batcher. Returns false once the
/// receiver is gone.
fn drain_ready(batcher: &Arc<Mutex<ChunkBatcher>>, tx: &mpsc::Sender<AudioChunk>) -> bool {
    loop {
        let chunk = match batcher.lock() {
            Ok(mut batch) => batch.take_ready(),
            Err(_) => return false,
        };
        match chunk {
            Some(chunk) => {
                if tx.blocking_send(chunk).is_err() {
                    return false;
                }
            }
            None => return true,
        }
    }
}

/// Accumulates PCM bytes from the audio callback and cuts them into
/// fixed-duration chunks. Timestamps are derived from the byte position so
/// they stay consistent for replayed streams too.
struct ChunkBatcher {
    pending: Vec<u8>,
    chunk_bytes: usize,
    bytes_per_second: usize,
    emitted_bytes: usize,
}

impl ChunkBatcher {
    fn new(format: CaptureFormat, chunk_duration_ms: u64) -> Self {
        let bytes_per_second = format.bytes_per_second();
        let chunk_bytes = (bytes_per_second * chunk_duration_ms as usize / 1000).max(2);
        Self {
            pending: Vec::new(),
            chunk_bytes,
            bytes_per_second,
            emitted_bytes: 0,
        }
    }

    fn extend_i16(&mut self, samples: &[i16]) {
        self.pending.reserve(samples.len() * 2);
        for &sample in samples {
            self.pending.extend_from_slice(&sample.to_le_bytes());
        }
    }

    fn extend_f32(&mut self, samples: &[f32]) {
        self.pending.reserve(samples.len() * 2);
        for &sample in samples {
            let value = (sample * 32767.0).clamp(-32768.0, 32767.0) as i16;
            self.pending.extend_from_slice(&value.to_le_bytes());
        }
    }

    /// Pop the next complete chunk, if one has accumulated
    fn take_ready(&mut self) -> Option<AudioChunk> {
        if self.pending.len() < self.chunk_bytes {
            return None;
        }
        let rest = self.pending.split_off(self.chunk_bytes);
        let pcm = std::mem::replace(&mut self.pending, rest);
        Some(self.emit(pcm))
    }

    /// Emit whatever is left as a final short chunk
    fn flush(&mut self) -> Option<AudioChunk> {
        if self.pending.is_empty() {
            return None;
        }
        let pcm = std::mem::take(&mut self.pending);
        Some(self.emit(pcm))
    }

    fn emit(&mut self, pcm: Vec<u8>) -> AudioChunk {
        let timestamp_ms = (self.emitted_bytes * 1000 / self.bytes_per_second) as u64;
        self.emitted_bytes += pcm.len();
        AudioChunk { pcm, timestamp_ms }
    }
}
