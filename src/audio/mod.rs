//! Audio playout subsystem

pub mod buffer;
pub mod capture_debug;
pub mod device;
pub mod frame;
pub mod mix;
pub mod negotiate;
pub mod normalize;
pub mod playback;
pub mod resample;
pub mod stats;

pub use buffer::JitterBuffer;
pub use device::{CpalOutput, OutputDevice};
pub use frame::{AudioFrame, DeviceProfile, FrameShape, RawFrame, SampleData};
pub use normalize::FrameNormalizer;
pub use playback::{PlaybackWorker, WorkerState};
pub use stats::{StatsCollector, StatsSnapshot};
