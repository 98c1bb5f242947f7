//! Microphone permission detection.
//!
//! Desktop hosts do not expose a permission API. A denied grant shows up as
//! a backend-specific error when the input device is opened, so it is told
//! apart from other device faults by its description.

use cpal::traits::{DeviceTrait, HostTrait};

use mimic_core::models::error::CaptureError;

const DENIAL_MARKERS: [&str; 4] = ["permission", "denied", "not authorized", "unauthorized"];

/// Map a host error description to a capture error.
pub fn classify_backend_error(description: &str) -> CaptureError {
    let lower = description.to_lowercase();
    if DENIAL_MARKERS.iter().any(|m| lower.contains(m)) {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Unknown(description.to_string())
    }
}

pub fn map_build_error(err: cpal::BuildStreamError) -> CaptureError {
    match err {
        cpal::BuildStreamError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
        cpal::BuildStreamError::StreamConfigNotSupported => {
            CaptureError::ConfigurationFailed("stream config not supported".into())
        }
        cpal::BuildStreamError::InvalidArgument => {
            CaptureError::ConfigurationFailed("invalid stream argument".into())
        }
        cpal::BuildStreamError::BackendSpecific { err } => classify_backend_error(&err.description),
        other => CaptureError::Unknown(other.to_string()),
    }
}

pub fn map_config_error(err: cpal::DefaultStreamConfigError) -> CaptureError {
    match err {
        cpal::DefaultStreamConfigError::DeviceNotAvailable => CaptureError::DeviceNotAvailable,
        cpal::DefaultStreamConfigError::StreamTypeNotSupported => {
            CaptureError::ConfigurationFailed("device has no input stream".into())
        }
        cpal::DefaultStreamConfigError::BackendSpecific { err } => {
            classify_backend_error(&err.description)
        }
    }
}

/// Check whether the default input device can be opened.
///
/// Returns `Ok(false)` when there is no input device or access is denied.
pub fn check_microphone_permission() -> Result<bool, CaptureError> {
    let host = cpal::default_host();
    let device = match host.default_input_device() {
        Some(d) => d,
        None => return Ok(false),
    };

    match device.default_input_config() {
        Ok(_) => Ok(true),
        Err(e) => match map_config_error(e) {
            CaptureError::PermissionDenied | CaptureError::DeviceNotAvailable => Ok(false),
            other => {
                log::warn!("Unexpected error checking mic permission: {}", other);
                Ok(true)
            }
        },
    }
}
