//! Request/response wire format.
//!
//! Both directions carry a stream of self-delimiting JSON values over one
//! persistent connection:
//! - Request: a JSON array of key names, e.g. `["answer", "keys"]`.
//! - Response: a JSON object holding only the requested keys that produced a
//!   representable, non-null value, e.g. `{"answer": 42}`.
//!
//! Parsing is panic-free: malformed input is reported as `GmxError` and the
//! caller decides whether to drop the connection.

use std::collections::BTreeMap;

use crate::value::Value;

pub mod codec;

/// Bumped on incompatible wire-format changes. Encoded in endpoint names.
pub const PROTOCOL_VERSION: u32 = 0;

/// Reserved key listing every registered key, itself included.
pub const KEYS_KEY: &str = "keys";

/// Reserved key holding the process argument vector. Used for discovery.
pub const ARGS_KEY: &str = "os.args";

/// Ordered list of requested keys.
pub type Request = Vec<String>;

/// Requested keys mapped to their current values.
pub type Response = BTreeMap<String, Value>;
