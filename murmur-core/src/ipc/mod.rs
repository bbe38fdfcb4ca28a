//! Protocol types crossing the bridge ↔ worker boundary.
//!
//! Events derive `serde::Serialize` + `serde::Deserialize` so a host can
//! forward them verbatim to a UI or another process.

pub mod events;
