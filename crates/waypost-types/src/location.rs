//! Location frames exchanged with clients.
//!
//! Clients send [`InboundLocation`] frames. Once validated and stamped
//! with the server's clock they become [`LocationUpdate`]s, which are
//! cached per identity and broadcast to every connected client.
//!
//! # Wire format
//!
//! ```json
//! // inbound
//! {"id": "alice", "lat": 51.5, "lng": -0.09, "deviceType": "Mobile"}
//! // outbound
//! {"id": "alice", "lat": 51.5, "lng": -0.09, "deviceType": "Mobile",
//!  "timestamp": "2024-05-01T12:00:00Z"}
//! ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Device type substituted when a client leaves `deviceType` empty.
pub const DEFAULT_DEVICE_TYPE: &str = "Unknown";

/// A raw location frame as decoded from a client.
///
/// Missing fields take their zero value, mirroring a lenient decoder:
/// an absent `id` becomes empty and is rejected later by validation.
/// Unknown fields, including any client-supplied `timestamp`, are ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct InboundLocation {
    /// Client-chosen identity; the cache key.
    #[serde(default)]
    pub id: String,
    /// Latitude in degrees.
    #[serde(default)]
    pub lat: f64,
    /// Longitude in degrees.
    #[serde(default)]
    pub lng: f64,
    /// Free-form device description.
    #[serde(default, rename = "deviceType")]
    pub device_type: String,
}

/// A validated location update, stamped with the server receive time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LocationUpdate {
    /// Identity of the reporting client (natural key).
    pub id: String,
    /// Latitude in degrees.
    pub lat: f64,
    /// Longitude in degrees.
    pub lng: f64,
    /// Device description, never empty.
    #[serde(rename = "deviceType")]
    pub device_type: String,
    /// Server-assigned receive time. Client timestamps are never trusted.
    #[serde(rename = "timestamp")]
    pub received_at: DateTime<Utc>,
}
