use std::time::Duration;

use thiserror::Error;

use super::view::LatLng;

/// Outcome categories of a location request. None of them is retried.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LocationError {
    #[error("Geolocation is not supported on this device.")]
    Unavailable,
    #[error("Location access denied. Please enable location services.")]
    PermissionDenied,
    #[error("Location information is unavailable.")]
    PositionUnavailable,
    #[error("Location request timed out.")]
    Timeout,
    #[error("An unknown error occurred while fetching location.")]
    Unknown,
}

impl LocationError {
    /// Map a W3C `GeolocationPositionError.code` to its category.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => LocationError::PermissionDenied,
            2 => LocationError::PositionUnavailable,
            3 => LocationError::Timeout,
            _ => LocationError::Unknown,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PositionOptions {
    pub high_accuracy: bool,
    pub timeout: Duration,
    pub maximum_age: Duration,
}

impl Default for PositionOptions {
    fn default() -> Self {
        Self {
            high_accuracy: true,
            timeout: Duration::from_secs(10),
            maximum_age: Duration::ZERO,
        }
    }
}

pub type PositionCallback = Box<dyn FnOnce(Result<LatLng, LocationError>)>;

/// Single-shot position source. The callback may fire synchronously or at any
/// later point on the same thread, and at most once.
pub trait GeolocationProvider {
    fn get_current_position(&self, options: &PositionOptions, callback: PositionCallback);
}

/// Provider answering every request with the same configured coordinate.
pub struct FixedGeolocation {
    pub position: LatLng,
}

impl GeolocationProvider for FixedGeolocation {
    fn get_current_position(&self, _options: &PositionOptions, callback: PositionCallback) {
        callback(Ok(self.position))
    }
}

/// Provider for devices without positioning. Every request fails with
/// [`LocationError::Unavailable`].
pub struct UnsupportedGeolocation;

impl GeolocationProvider for UnsupportedGeolocation {
    fn get_current_position(&self, _options: &PositionOptions, callback: PositionCallback) {
        callback(Err(LocationError::Unavailable))
    }
}
