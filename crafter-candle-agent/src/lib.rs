//! Value-based agents implemented with [candle](https://crates.io/crates/candle-core).
//!
//! * [`dqn::Dqn`]: scalar TD learner with Double DQN targets, a dueling head
//!   and optional Munchausen regularization.
//! * [`qrdqn::QrDqn`]: quantile regression learner with a dueling quantile head.
//!
//! Both implement [`crafter_core::Agent`] on top of the same replay buffer,
//! n-step processor, [`explorer::DqnExplorer`] and [`model::QNetwork`].
pub mod checkpoint;
pub mod dqn;
pub mod explorer;
pub mod model;
pub mod net;
pub mod opt;
pub mod qrdqn;
mod tensor_batch;
pub mod util;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, Copy, Deserialize, Serialize, PartialEq, Eq)]
/// Device for using candle.
///
/// This enum is added because [`candle_core::Device`] does not support serialization.
pub enum Device {
    /// The main CPU device.
    Cpu,

    /// A CUDA device with the given ordinal.
    Cuda(usize),

    /// A Metal device with the given ordinal.
    Metal(usize),
}

impl From<&candle_core::Device> for Device {
    fn from(device: &candle_core::Device) -> Self {
        match device.location() {
            candle_core::DeviceLocation::Cpu => Self::Cpu,
            candle_core::DeviceLocation::Cuda { gpu_id } => Self::Cuda(gpu_id),
            candle_core::DeviceLocation::Metal { gpu_id } => Self::Metal(gpu_id),
        }
    }
}

impl TryFrom<Device> for candle_core::Device {
    type Error = candle_core::Error;

    fn try_from(device: Device) -> Result<Self, Self::Error> {
        match device {
            Device::Cpu => Ok(candle_core::Device::Cpu),
            Device::Cuda(n) => candle_core::Device::new_cuda(n),
            Device::Metal(n) => candle_core::Device::new_metal(n),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Device;

    #[test]
    fn test_cpu_round_trip() {
        let device = candle_core::Device::try_from(Device::Cpu).unwrap();
        assert_eq!(Device::from(&device), Device::Cpu);
        assert_eq!(serde_yaml::from_str::<Device>("Cpu").unwrap(), Device::Cpu);
    }
}
