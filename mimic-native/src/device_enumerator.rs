//! Audio device enumeration via the default cpal host.
//!
//! Lists capture and playback devices with their default rate and channel
//! count, and resolves devices by name for the backend and sink.

use cpal::traits::{DeviceTrait, HostTrait};
use serde::Serialize;

use mimic_core::models::error::CaptureError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceDirection {
    Input,
    Output,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AudioDeviceInfo {
    pub name: String,
    pub direction: DeviceDirection,
    pub is_default: bool,
    pub default_sample_rate: Option<u32>,
    pub default_channels: Option<u16>,
}

pub struct DeviceEnumerator {
    host: cpal::Host,
}

impl DeviceEnumerator {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
        }
    }

    /// List input (microphone) devices.
    pub fn list_capture_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        let default_name = self.host.default_input_device().and_then(|d| d.name().ok());
        let devices = self
            .host
            .input_devices()
            .map_err(|e| CaptureError::Unknown(format!("input device enumeration failed: {}", e)))?;

        Ok(devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                let config = device.default_input_config().ok();
                Some(AudioDeviceInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    direction: DeviceDirection::Input,
                    default_sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                    default_channels: config.as_ref().map(|c| c.channels()),
                })
            })
            .collect())
    }

    /// List output (speaker/headphone) devices.
    pub fn list_render_devices(&self) -> Result<Vec<AudioDeviceInfo>, CaptureError> {
        let default_name = self.host.default_output_device().and_then(|d| d.name().ok());
        let devices = self
            .host
            .output_devices()
            .map_err(|e| CaptureError::Unknown(format!("output device enumeration failed: {}", e)))?;

        Ok(devices
            .filter_map(|device| {
                let name = device.name().ok()?;
                let config = device.default_output_config().ok();
                Some(AudioDeviceInfo {
                    is_default: default_name.as_deref() == Some(name.as_str()),
                    name,
                    direction: DeviceDirection::Output,
                    default_sample_rate: config.as_ref().map(|c| c.sample_rate().0),
                    default_channels: config.as_ref().map(|c| c.channels()),
                })
            })
            .collect())
    }

    /// Find an input device by name, or the default input when `name` is
    /// `None`.
    pub fn input_device(&self, name: Option<&str>) -> Result<cpal::Device, CaptureError> {
        match name {
            Some(name) => self
                .host
                .input_devices()
                .map_err(|e| CaptureError::Unknown(format!("input device enumeration failed: {}", e)))?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false))
                .ok_or(CaptureError::DeviceNotAvailable),
            None => self
                .host
                .default_input_device()
                .ok_or(CaptureError::DeviceNotAvailable),
        }
    }

    /// Find an output device by name, or the default output.
    pub fn output_device(&self, name: Option<&str>) -> Option<cpal::Device> {
        match name {
            Some(name) => self
                .host
                .output_devices()
                .ok()?
                .find(|d| d.name().map(|n| n == name).unwrap_or(false)),
            None => self.host.default_output_device(),
        }
    }
}

impl Default for DeviceEnumerator {
    fn default() -> Self {
        Self::new()
    }
}
