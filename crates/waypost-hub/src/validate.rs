//! Structural validation of inbound location frames.
//!
//! Checks run in a fixed order and the first failure wins:
//!
//! 1. identity present and at most [`MAX_IDENTITY_LEN`] characters
//! 2. latitude finite and within [`COORDINATE_BOUND`]
//! 3. longitude finite and within [`COORDINATE_BOUND`]
//! 4. device type defaulted when empty, rejected above [`MAX_DEVICE_TYPE_LEN`]
//!
//! Latitude is checked against the same +/-180 bound as longitude, not
//! the geographic +/-90. This matches the deployed client contract and is
//! tracked as an open discrepancy.

use chrono::{DateTime, Utc};
use waypost_types::{DEFAULT_DEVICE_TYPE, InboundLocation, LocationUpdate};

use crate::error::ValidationError;

/// Maximum identity length in characters.
pub const MAX_IDENTITY_LEN: usize = 100;

/// Maximum device type length in characters.
pub const MAX_DEVICE_TYPE_LEN: usize = 50;

/// Symmetric bound applied to both latitude and longitude.
pub const COORDINATE_BOUND: f64 = 180.0;

/// Validate a raw frame and stamp it with the current server time.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate(raw: InboundLocation) -> Result<LocationUpdate, ValidationError> {
    validate_at(raw, Utc::now())
}

/// Validate a raw frame, stamping it with `received_at` on success.
///
/// Any timestamp the client may have sent is discarded; the receive time
/// is always server-assigned.
///
/// # Errors
///
/// Returns the first [`ValidationError`] encountered.
pub fn validate_at(
    raw: InboundLocation,
    received_at: DateTime<Utc>,
) -> Result<LocationUpdate, ValidationError> {
    let InboundLocation {
        id,
        lat,
        lng,
        mut device_type,
    } = raw;

    if id.is_empty() {
        return Err(ValidationError::MissingIdentity);
    }
    let id_len = id.chars().count();
    if id_len > MAX_IDENTITY_LEN {
        return Err(ValidationError::IdentityTooLong {
            len: id_len,
            max: MAX_IDENTITY_LEN,
        });
    }

    if !is_valid_coordinate(lat) {
        return Err(ValidationError::InvalidLatitude(lat));
    }
    if !is_valid_coordinate(lng) {
        return Err(ValidationError::InvalidLongitude(lng));
    }

    if device_type.is_empty() {
        device_type = DEFAULT_DEVICE_TYPE.to_owned();
    }
    let device_len = device_type.chars().count();
    if device_len > MAX_DEVICE_TYPE_LEN {
        return Err(ValidationError::DeviceTypeTooLong {
            len: device_len,
            max: MAX_DEVICE_TYPE_LEN,
        });
    }

    Ok(LocationUpdate {
        id,
        lat,
        lng,
        device_type,
        received_at,
    })
}

/// A coordinate is valid when finite and within +/-[`COORDINATE_BOUND`].
pub fn is_valid_coordinate(value: f64) -> bool {
    value.is_finite() && (-COORDINATE_BOUND..=COORDINATE_BOUND).contains(&value)
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]

    use super::*;

    fn frame(id: &str, lat: f64, lng: f64, device_type: &str) -> InboundLocation {
        InboundLocation {
            id: id.to_owned(),
            lat,
            lng,
            device_type: device_type.to_owned(),
        }
    }

    #[test]
    fn identity_length_boundaries() {
        let cases = [(0_usize, false), (1, true), (100, true), (101, false)];
        for (len, accepted) in cases {
            let id = "x".repeat(len);
            let result = validate(frame(&id, 0.0, 0.0, "Mobile"));
            assert_eq!(result.is_ok(), accepted, "identity length {len}");
        }
    }

    #[test]
    fn identity_length_counts_characters() {
        let id = "\u{e9}".repeat(100);
        assert!(validate(frame(&id, 0.0, 0.0, "")).is_ok());
    }

    #[test]
    fn coordinate_boundaries() {
        let cases = [
            (-180.0, true),
            (180.0, true),
            (180.0001, false),
            (-180.0001, false),
            (f64::NAN, false),
            (f64::INFINITY, false),
            (f64::NEG_INFINITY, false),
        ];
        for (value, accepted) in cases {
            assert_eq!(
                validate(frame("a", value, 0.0, "")).is_ok(),
                accepted,
                "latitude {value}"
            );
            assert_eq!(
                validate(frame("a", 0.0, value, "")).is_ok(),
                accepted,
                "longitude {value}"
            );
        }
    }

    #[test]
    fn latitude_shares_longitude_bound() {
        // Beyond the geographic +/-90 but inside +/-180: accepted.
        assert!(validate(frame("a", 120.0, 0.0, "")).is_ok());
        assert!(validate(frame("a", -135.5, 0.0, "")).is_ok());
    }

    #[test]
    fn checks_run_in_order() {
        let err = validate(frame("", f64::NAN, f64::NAN, &"d".repeat(60))).unwrap_err();
        assert_eq!(err, ValidationError::MissingIdentity);

        let err = validate(frame("a", f64::NAN, f64::NAN, "")).unwrap_err();
        assert!(matches!(err, ValidationError::InvalidLatitude(_)));

        let err = validate(frame("a", 0.0, 200.0, &"d".repeat(60))).unwrap_err();
        assert_eq!(err, ValidationError::InvalidLongitude(200.0));
    }

    #[test]
    fn empty_device_type_defaults_to_unknown() {
        let update = validate(frame("a", 1.0, 2.0, "")).unwrap();
        assert_eq!(update.device_type, DEFAULT_DEVICE_TYPE);
    }

    #[test]
    fn device_type_length_boundaries() {
        assert!(validate(frame("a", 0.0, 0.0, &"d".repeat(50))).is_ok());
        let err = validate(frame("a", 0.0, 0.0, &"d".repeat(51))).unwrap_err();
        assert_eq!(err, ValidationError::DeviceTypeTooLong { len: 51, max: 50 });
    }

    #[test]
    fn stamps_server_time() {
        let at = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let update = validate_at(frame("a", 1.0, 2.0, "Tablet"), at).unwrap();
        assert_eq!(update.received_at, at);
        assert_eq!(update.id, "a");
        assert_eq!(update.device_type, "Tablet");
    }
}
