//! Audio capture devices
//!
//! Everything that can feed a recording session implements `CaptureDevice`:
//! request access, get back a `CaptureStream` of PCM chunks plus a stop
//! signal that releases the device.

pub mod device;
pub mod fixture;
pub mod microphone;

pub use device::{
    AudioChunk, CaptureConfig, CaptureDevice, CaptureFormat, CaptureStream, DeviceUnavailable,
    FaultSlot, StopSignal,
};
pub use fixture::WavFileDevice;
pub use microphone::MicrophoneDevice;
