use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::debug;

use super::device::{
    AudioChunk, CaptureConfig, CaptureDevice, CaptureFormat, CaptureStream, DeviceUnavailable,
    FaultSlot, StopSignal,
};

/// Replays a 16-bit PCM WAV file as a live capture stream.
///
/// The stream self-terminates when the file runs out, which mirrors a
/// device ending capture on its own. Rate and channel count come from the
/// file header; only the chunk duration is taken from the config.
pub struct WavFileDevice {
    path: PathBuf,
    config: CaptureConfig,
}

impl WavFileDevice {
    pub fn new(path: impl Into<PathBuf>, config: CaptureConfig) -> Self {
        Self {
            path: path.into(),
            config,
        }
    }
}

#[async_trait::async_trait]
impl CaptureDevice for WavFileDevice {
    async fn request_access(&self) -> Result<CaptureStream, DeviceUnavailable> {
        let reader = hound::WavReader::open(&self.path).map_err(|e| {
            DeviceUnavailable::new(format!("Cannot open WAV file {}: {}", self.path.display(), e))
        })?;
        let spec = reader.spec();
        if spec.sample_format != hound::SampleFormat::Int || spec.bits_per_sample != 16 {
            return Err(DeviceUnavailable::new(format!(
                "WAV file {} must be 16-bit PCM",
                self.path.display()
            )));
        }

        let samples: Vec<i16> = reader
            .into_samples::<i16>()
            .collect::<Result<_, _>>()
            .map_err(|e| {
                DeviceUnavailable::new(format!(
                    "Cannot read samples from {}: {}",
                    self.path.display(),
                    e
                ))
            })?;

        let format = CaptureFormat {
            sample_rate: spec.sample_rate,
            channels: spec.channels,
        };
        let pcm: Vec<u8> = samples.iter().flat_map(|s| s.to_le_bytes()).collect();
        debug!(
            "Replaying {} ({} bytes at {}Hz/{}ch)",
            self.path.display(),
            pcm.len(),
            format.sample_rate,
            format.channels
        );

        let chunk_bytes =
            (format.bytes_per_second() * self.config.chunk_duration_ms as usize / 1000).max(2);
        let bytes_per_second = format.bytes_per_second();

        let stopped = Arc::new(AtomicBool::new(false));
        let replay_stopped = Arc::clone(&stopped);
        let (tx, rx) = mpsc::channel(32);

        tokio::spawn(async move {
            let mut offset = 0usize;
            for piece in pcm.chunks(chunk_bytes) {
                if replay_stopped.load(Ordering::SeqCst) {
                    break;
                }
                let chunk = AudioChunk {
                    pcm: piece.to_vec(),
                    timestamp_ms: (offset * 1000 / bytes_per_second) as u64,
                };
                offset += piece.len();
                if tx.send(chunk).await.is_err() {
                    break;
                }
            }
            // Sender drops here, closing the stream
        });

        let stop = StopSignal::new(move || {
            stopped.store(true, Ordering::SeqCst);
        });

        Ok(CaptureStream {
            format,
            chunks: rx,
            fault: FaultSlot::new(),
            stop,
        })
    }

    fn name(&self) -> &str {
        "wav file"
    }
}
