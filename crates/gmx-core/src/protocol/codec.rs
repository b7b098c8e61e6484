//! Streaming JSON codec (panic-free).
//!
//! Messages are self-delimiting JSON values written back to back. The encoder
//! terminates each value with `\n`; the decoder tolerates any whitespace
//! between values and never relies on the newline.
//!
//! Decoding rules:
//! - An incomplete value leaves the buffer untouched and yields `Ok(None)`.
//! - A complete value is removed from the buffer, along with leading whitespace.
//! - Anything else (syntax error, wrong shape, oversized) is `GmxError::Malformed`.
//!
//! [`Decoder`] remembers how far it has scanned an incomplete array, object or
//! string, so a value arriving in many small reads is scanned once and parsed
//! once it closes.

use bytes::{Buf, BufMut, BytesMut};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{GmxError, Result};

/// Upper bound on a single buffered message. A request is a list of key
/// names, so this is generous.
pub const MAX_MESSAGE_BYTES: usize = 1024 * 1024;

/// Append `msg` as one JSON value followed by a newline.
pub fn encode<T: Serialize + ?Sized>(msg: &T, out: &mut BytesMut) -> Result<()> {
    let json = serde_json::to_vec(msg).map_err(|e| GmxError::Encode(e.to_string()))?;
    out.reserve(json.len() + 1);
    out.put_slice(&json);
    out.put_u8(b'\n');
    Ok(())
}

/// Try to decode one value from the front of `buf` with a fresh [`Decoder`].
pub fn decode<T: DeserializeOwned>(buf: &mut BytesMut) -> Result<Option<T>> {
    Decoder::new().decode(buf)
}

/// Incremental decoder for one stream.
///
/// Between calls the caller may only append to `buf`.
#[derive(Debug, Default)]
pub struct Decoder {
    /// Bytes of the pending value already scanned.
    scanned: usize,
    depth: usize,
    in_string: bool,
    escaped: bool,
}

impl Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to decode one value from the front of `buf`.
    pub fn decode<T: DeserializeOwned>(&mut self, buf: &mut BytesMut) -> Result<Option<T>> {
        if self.scanned == 0 {
            let leading = buf
                .iter()
                .take_while(|b| b.is_ascii_whitespace())
                .count();
            buf.advance(leading);
            if buf.is_empty() {
                return Ok(None);
            }
            match buf[0] {
                b'[' | b'{' => self.depth = 1,
                b'"' => self.in_string = true,
                // bare scalars are short; let the parser decide
                _ => return self.parse(buf),
            }
            self.scanned = 1;
        }

        if self.scan(&buf[..]) {
            return self.parse(buf);
        }
        if buf.len() > MAX_MESSAGE_BYTES {
            self.reset();
            return Err(GmxError::Malformed(format!(
                "message exceeds {MAX_MESSAGE_BYTES} bytes"
            )));
        }
        Ok(None)
    }

    /// Scan bytes not seen yet. Returns `true` once the top-level value closes.
    fn scan(&mut self, buf: &[u8]) -> bool {
        while let Some(&b) = buf.get(self.scanned) {
            self.scanned += 1;
            if self.in_string {
                if self.escaped {
                    self.escaped = false;
                } else if b == b'\\' {
                    self.escaped = true;
                } else if b == b'"' {
                    self.in_string = false;
                    if self.depth == 0 {
                        return true;
                    }
                }
                continue;
            }
            match b {
                b'"' => self.in_string = true,
                b'[' | b'{' => self.depth += 1,
                b']' | b'}' => {
                    self.depth = self.depth.saturating_sub(1);
                    if self.depth == 0 {
                        return true;
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn parse<T: DeserializeOwned>(&mut self, buf: &mut BytesMut) -> Result<Option<T>> {
        let mut stream = serde_json::Deserializer::from_slice(&buf[..]).into_iter::<T>();
        let res = match stream.next() {
            Some(Ok(msg)) => {
                let used = stream.byte_offset();
                buf.advance(used);
                Ok(Some(msg))
            }
            Some(Err(e)) if e.is_eof() => {
                if buf.len() > MAX_MESSAGE_BYTES {
                    Err(GmxError::Malformed(format!(
                        "message exceeds {MAX_MESSAGE_BYTES} bytes"
                    )))
                } else {
                    Ok(None)
                }
            }
            Some(Err(e)) => Err(GmxError::Malformed(e.to_string())),
            None => Ok(None),
        };
        self.reset();
        res
    }

    fn reset(&mut self) {
        *self = Self::default();
    }
}

/// Whether `buf` holds only whitespace, i.e. a peer closing here closed cleanly.
pub fn is_drained(buf: &BytesMut) -> bool {
    buf.iter().all(|b| b.is_ascii_whitespace())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::protocol::{Request, Response};
    use crate::value::Value;

    #[test]
    fn encode_appends_newline() {
        let mut out = BytesMut::new();
        encode(&vec!["answer", "missing"], &mut out).unwrap();
        assert_eq!(&out[..], b"[\"answer\",\"missing\"]\n");
    }

    #[test]
    fn decodes_values_back_to_back() {
        let mut buf = BytesMut::from(&b"[\"a\"] [\"b\",\"c\"]\n\n[]"[..]);
        let first: Request = decode(&mut buf).unwrap().unwrap();
        let second: Request = decode(&mut buf).unwrap().unwrap();
        let third: Request = decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, vec!["a"]);
        assert_eq!(second, vec!["b", "c"]);
        assert!(third.is_empty());
        assert!(decode::<Request>(&mut buf).unwrap().is_none());
        assert!(is_drained(&buf));
    }

    #[test]
    fn partial_value_waits_for_more_bytes() {
        let mut buf = BytesMut::from(&b"{\"answer\": 4"[..]);
        assert!(decode::<Response>(&mut buf).unwrap().is_none());
        assert!(!is_drained(&buf));

        buf.extend_from_slice(b"2}\n");
        let resp: Response = decode(&mut buf).unwrap().unwrap();
        assert_eq!(resp.get("answer"), Some(&Value::Int(42)));
    }

    #[test]
    fn malformed_input_is_an_error() {
        let mut buf = BytesMut::from(&b"[\"a\", }"[..]);
        let err = decode::<Request>(&mut buf).unwrap_err();
        assert_eq!(err.kind().as_str(), "PROTOCOL");

        // syntactically valid, wrong shape
        let mut buf = BytesMut::from(&b"{\"a\": 1}"[..]);
        assert!(decode::<Request>(&mut buf).is_err());

        let mut buf = BytesMut::from(&b"[1, 2]"[..]);
        assert!(decode::<Request>(&mut buf).is_err());
    }

    #[test]
    fn large_request_trickled_in_small_reads() {
        let keys: Vec<String> = (0..20_000).map(|i| format!("svc.\\\"k\\\"{i}")).collect();
        let wire = serde_json::to_vec(&keys).unwrap();

        let mut dec = Decoder::new();
        let mut buf = BytesMut::new();
        let mut decoded = None;
        for chunk in wire.chunks(7) {
            assert!(decoded.is_none(), "decoded before the last chunk");
            buf.extend_from_slice(chunk);
            decoded = dec.decode::<Request>(&mut buf).unwrap();
        }
        assert_eq!(decoded.unwrap(), keys);
        assert!(is_drained(&buf));
    }

    #[test]
    fn brackets_inside_strings_do_not_close_the_value() {
        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&br#"["a]", "\"}"#[..]);
        assert!(dec.decode::<Request>(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"\"] [\"next\"]");
        let first: Request = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(first, vec!["a]", "\"}"]);
        let second: Request = dec.decode(&mut buf).unwrap().unwrap();
        assert_eq!(second, vec!["next"]);
    }

    #[test]
    fn unterminated_value_over_the_cap_is_rejected() {
        let mut dec = Decoder::new();
        let mut buf = BytesMut::from(&b"[\""[..]);
        buf.extend_from_slice(&vec![b'x'; MAX_MESSAGE_BYTES]);
        let err = dec.decode::<Request>(&mut buf).unwrap_err();
        assert_eq!(err.kind().as_str(), "PROTOCOL");
    }
}
