//! Audio sources: the CPAL input device and a mock for tests.

mod device;
mod mock;

pub use device::{list_input_devices, AudioDevice, CaptureStream};
pub use mock::MockSource;
