//! Request decoding vector tests.

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]
#![allow(clippy::panic)]

use bytes::BytesMut;

use gmx_core::protocol::{codec, Request};

use vector_loader::load;

#[test]
fn request_vectors() {
    let files = [
        "request_basic.json",
        "request_whitespace.json",
        "request_empty.json",
        "request_not_array.json",
        "request_non_string.json",
        "request_garbage.json",
        "request_truncated.json",
    ];

    for f in files {
        let v = load(f);
        let mut buf = BytesMut::from(v.input.as_bytes());
        let res = codec::decode::<Request>(&mut buf);

        if let Some(err) = v.expect_error {
            let e = res.expect_err("expected error");
            assert_eq!(e.kind().as_str(), err.kind, "vector={}", v.description);
            continue;
        }

        let decoded = res.expect("expected ok decode");
        if v.incomplete {
            assert!(decoded.is_none(), "vector={}", v.description);
            assert_eq!(&buf[..], v.input.as_bytes(), "vector={}", v.description);
            continue;
        }

        let req = decoded.expect("expected a complete request");
        let ex = v.expect.expect("missing expect block");
        assert_eq!(req, ex, "vector={}", v.description);
        assert!(codec::is_drained(&buf), "vector={}", v.description);
    }
}
