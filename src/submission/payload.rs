//! # Submission Payload
//!
//! JSON body posted to the collector:
//!
//! ```json
//! {
//!   "token": "<api key>",
//!   "data": {
//!     "device_id": "A1B2C3D4E5F6",
//!     "created_at": "2024-06-01T12:30:00.000Z",
//!     "Temperature [C]": 21.4,
//!     "AQI": 17
//!   }
//! }
//! ```
//!
//! `data` carries every observation field keyed by its label, in schema order.

use bytes::Bytes;
use serde::ser::SerializeMap;
use serde::{Serialize, Serializer};

use crate::error::Result;
use crate::observation::Observation;

/// Content type sent with every delivery.
pub const CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Serialize)]
struct Payload<'a> {
    token: &'a str,
    data: Data<'a>,
}

struct Data<'a>(&'a Observation);

impl Serialize for Data<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let obs = self.0;
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("device_id", obs.device_id())?;
        map.serialize_entry("created_at", &obs.created_at())?;
        for (spec, value) in obs.fields() {
            map.serialize_entry(spec.label, &value)?;
        }
        map.end()
    }
}

/// Serializes `obs` with the API `token` into a request body.
pub fn encode(obs: &Observation, token: &str) -> Result<Bytes> {
    let payload = Payload {
        token,
        data: Data(obs),
    };
    Ok(Bytes::from(serde_json::to_vec(&payload)?))
}
