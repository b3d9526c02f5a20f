//! Wire codec for curve updates.
//!
//! A wire message is a raw-deflate stream (no zlib or gzip framing) of UTF-8
//! JSON text shaped like `{"timestamp": 1, "points": [{"x": 0, "y": 0, "z": 0}]}`.
//!
//! [`decode`] is pure: it never touches shared state, so a bad frame can only
//! ever cost that one frame.

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};

use crate::error::DecodeError;
use crate::types::CurveUpdate;

/// Upper bound on the inflated size of one message.
pub const MAX_DECOMPRESSED_BYTES: usize = 64 * 1024 * 1024;

const INFLATE_CHUNK: usize = 16 * 1024;

/// Decode one binary frame into a [`CurveUpdate`].
///
/// # Errors
///
/// - [`DecodeError::Decompression`] when the buffer is corrupt, truncated,
///   inflates past [`MAX_DECOMPRESSED_BYTES`], or inflates to non-UTF-8 bytes
/// - [`DecodeError::Schema`] when the text is not a `{timestamp, points}` record
pub fn decode(raw: &[u8]) -> Result<CurveUpdate, DecodeError> {
    let inflated = inflate(raw)?;
    let text = std::str::from_utf8(&inflated)
        .map_err(|e| DecodeError::decompression(format!("payload is not UTF-8: {e}")))?;
    serde_json::from_str(text).map_err(|e| DecodeError::schema(e.to_string()))
}

/// Encode a [`CurveUpdate`] the way producers put it on the wire.
pub fn encode(update: &CurveUpdate) -> Result<Vec<u8>, DecodeError> {
    let json = serde_json::to_vec(update).map_err(|e| DecodeError::schema(e.to_string()))?;
    compress(&json)
}

/// Raw-deflate arbitrary bytes. Useful for crafting payloads by hand.
pub fn compress(bytes: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(bytes).map_err(|e| DecodeError::decompression(e.to_string()))?;
    encoder.finish().map_err(|e| DecodeError::decompression(e.to_string()))
}

fn inflate(raw: &[u8]) -> Result<Vec<u8>, DecodeError> {
    let mut inflater = Decompress::new(false);
    let mut out = Vec::with_capacity(raw.len().saturating_mul(4).clamp(INFLATE_CHUNK, MAX_DECOMPRESSED_BYTES));

    loop {
        if out.len() == out.capacity() {
            if out.len() >= MAX_DECOMPRESSED_BYTES {
                return Err(DecodeError::decompression(format!(
                    "payload inflates past {} bytes",
                    MAX_DECOMPRESSED_BYTES
                )));
            }
            out.reserve(INFLATE_CHUNK);
        }

        let in_before = inflater.total_in();
        let out_before = inflater.total_out();
        let consumed = in_before as usize;

        let status = inflater
            .decompress_vec(&raw[consumed..], &mut out, FlushDecompress::None)
            .map_err(|e| DecodeError::decompression(e.to_string()))?;

        if status == Status::StreamEnd {
            return Ok(out);
        }

        // Output space is available, so no progress means the input ran out
        // before the final block.
        if inflater.total_in() == in_before && inflater.total_out() == out_before {
            return Err(DecodeError::decompression(format!(
                "truncated deflate stream after {} of {} bytes",
                consumed,
                raw.len()
            )));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Point3;
    use proptest::prelude::*;

    fn sample_update() -> CurveUpdate {
        CurveUpdate::new(
            1_700_000_000_000,
            (1..20).map(|i| Point3::new(i as f64, i as f64 * 0.5, -(i as f64))).collect(),
        )
    }

    #[test]
    fn decodes_producer_payload() {
        let update = sample_update();
        let raw = encode(&update).unwrap();
        assert_eq!(decode(&raw).unwrap(), update);
    }

    #[test]
    fn accepts_empty_points() {
        let raw = compress(br#"{"timestamp": 5, "points": []}"#).unwrap();
        let update = decode(&raw).unwrap();
        assert_eq!(update.timestamp, 5);
        assert!(update.points.is_empty());
    }

    #[test]
    fn ignores_unknown_fields() {
        let raw = compress(br#"{"timestamp": 5, "points": [{"x":1,"y":2,"z":3,"w":4}], "extra": true}"#)
            .unwrap();
        assert_eq!(decode(&raw).unwrap().points, vec![Point3::new(1.0, 2.0, 3.0)]);
    }

    #[test]
    fn reserved_block_type_is_decompression_error() {
        let mut raw = encode(&sample_update()).unwrap();
        // BTYPE bits set to 0b11, which deflate reserves as invalid
        raw[0] |= 0b0000_0110;
        assert!(matches!(decode(&raw), Err(DecodeError::Decompression { .. })));
    }

    #[test]
    fn truncated_payload_is_decompression_error() {
        let raw = encode(&sample_update()).unwrap();
        let cut = &raw[..raw.len() / 2];
        assert!(matches!(decode(cut), Err(DecodeError::Decompression { .. })));
        assert!(matches!(decode(&[]), Err(DecodeError::Decompression { .. })));
    }

    #[test]
    fn zlib_framing_is_rejected() {
        let mut zlib = flate2::write::ZlibEncoder::new(Vec::new(), Compression::default());
        zlib.write_all(br#"{"timestamp":1,"points":[]}"#).unwrap();
        let raw = zlib.finish().unwrap();
        assert!(decode(&raw).is_err());
    }

    #[test]
    fn non_utf8_payload_is_decompression_error() {
        let raw = compress(&[0xff, 0xfe, 0xfd]).unwrap();
        assert!(matches!(decode(&raw), Err(DecodeError::Decompression { .. })));
    }

    #[test]
    fn schema_errors() {
        let cases: [&[u8]; 5] = [
            br#"{"points": []}"#,
            br#"{"timestamp": 1}"#,
            br#"{"timestamp": "soon", "points": []}"#,
            br#"{"timestamp": 1, "points": [{"x": 1, "y": 2}]}"#,
            br#"[1, 2, 3]"#,
        ];
        for case in cases {
            let raw = compress(case).unwrap();
            assert!(
                matches!(decode(&raw), Err(DecodeError::Schema { .. })),
                "expected schema error for {}",
                String::from_utf8_lossy(case)
            );
        }
    }

    #[test]
    fn timestamp_must_be_unsigned_integer() {
        // Millisecond markers are whole and non-negative. Exponent, fractional
        // and negative forms are refused rather than rounded or wrapped.
        for timestamp in ["1.7e12", "12.5", "-1", "18446744073709551616"] {
            let json = format!(r#"{{"timestamp": {timestamp}, "points": []}}"#);
            let raw = compress(json.as_bytes()).unwrap();
            assert!(
                matches!(decode(&raw), Err(DecodeError::Schema { .. })),
                "expected schema error for timestamp {timestamp}"
            );
        }

        let raw = compress(br#"{"timestamp": 1700000000000, "points": []}"#).unwrap();
        assert_eq!(decode(&raw).unwrap().timestamp, 1_700_000_000_000);
        let raw = compress(br#"{"timestamp": 18446744073709551615, "points": []}"#).unwrap();
        assert_eq!(decode(&raw).unwrap().timestamp, u64::MAX);
    }

    fn finite() -> impl Strategy<Value = f64> {
        -1.0e9f64..1.0e9f64
    }

    proptest! {
        #[test]
        fn round_trip_recovers_exact_points(
            timestamp in any::<u64>(),
            coords in prop::collection::vec((finite(), finite(), finite()), 0..64)
        ) {
            let update = CurveUpdate::new(timestamp, coords.into_iter().map(Point3::from).collect());
            let decoded = decode(&encode(&update).unwrap()).unwrap();
            prop_assert_eq!(decoded, update);
        }

        #[test]
        fn arbitrary_bytes_never_panic(raw in prop::collection::vec(any::<u8>(), 0..512)) {
            let _ = decode(&raw);
        }
    }
}
