//! SQLite record format decoding.
//!
//! A record is a header followed by packed data. The header holds its own
//! byte length (as a varint) followed by one serial-type varint per column;
//! the body holds the column values back to back in declaration order.
//!
//! See: <https://www.sqlite.org/fileformat.html#record_format>

use litescan_error::{Result, ScanError};

use crate::serial_type::{classify_serial_type, read_varint, serial_type_len, SerialTypeClass};
use crate::value::Value;

/// A decoded record: the declared serial types and one value per type, in
/// column order. NULL columns keep their position.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub serial_types: Vec<u64>,
    pub values: Vec<Value>,
}

impl Record {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// The value at `idx`, or `None` past the end.
    pub fn value(&self, idx: usize) -> Option<&Value> {
        self.values.get(idx)
    }
}

/// Parse a complete record (header + body) from `payload`.
#[allow(clippy::cast_possible_truncation)]
pub fn parse_record(payload: &[u8]) -> Result<Record> {
    if payload.is_empty() {
        return Ok(Record {
            serial_types: Vec::new(),
            values: Vec::new(),
        });
    }

    let (header_size_u64, header_varint_len) = read_varint(payload, 0)?;
    let header_size = header_size_u64 as usize;
    if header_size > payload.len() || header_size < header_varint_len {
        return Err(ScanError::malformed(format!(
            "record header of {header_size} bytes does not fit a {}-byte payload",
            payload.len()
        )));
    }

    let mut serial_types = Vec::new();
    let mut offset = header_varint_len;
    while offset < header_size {
        let (serial_type, consumed) = read_varint(&payload[..header_size], offset)?;
        serial_types.push(serial_type);
        offset += consumed;
    }

    let mut values = Vec::with_capacity(serial_types.len());
    let mut body_offset = header_size;
    for &st in &serial_types {
        let value_len = serial_type_len(st)? as usize;
        let Some(bytes) = payload.get(body_offset..body_offset + value_len) else {
            return Err(ScanError::malformed(format!(
                "value of serial type {st} needs {} bytes, payload has {}",
                body_offset + value_len,
                payload.len()
            )));
        };
        values.push(decode_value(st, bytes)?);
        body_offset += value_len;
    }

    Ok(Record {
        serial_types,
        values,
    })
}

/// Decode one value from its serial type and exact-length byte slice.
fn decode_value(serial_type: u64, bytes: &[u8]) -> Result<Value> {
    match classify_serial_type(serial_type) {
        SerialTypeClass::Null => Ok(Value::Null),
        SerialTypeClass::Zero => Ok(Value::Zero),
        SerialTypeClass::One => Ok(Value::One),
        SerialTypeClass::Integer => Ok(Value::Integer(decode_be_signed(bytes))),
        SerialTypeClass::Float => {
            let arr: [u8; 8] = bytes
                .try_into()
                .map_err(|_| ScanError::malformed("float value is not 8 bytes"))?;
            let value = f64::from_bits(u64::from_be_bytes(arr));
            // SQLite normalizes NaN to NULL.
            if value.is_nan() {
                Ok(Value::Null)
            } else {
                Ok(Value::Float(value))
            }
        }
        SerialTypeClass::Text => match std::str::from_utf8(bytes) {
            Ok(s) => Ok(Value::Text(s.to_owned())),
            Err(e) => Err(ScanError::malformed(format!(
                "text value is not valid UTF-8: {e}"
            ))),
        },
        SerialTypeClass::Blob => Ok(Value::Blob(bytes.to_vec())),
        SerialTypeClass::Reserved => Err(ScanError::InvalidSerialType { serial_type }),
    }
}

/// Decode a big-endian signed integer of 1-8 bytes, sign-extending from the
/// top bit of the first byte. Widths 3 and 6 take this path too.
#[allow(clippy::cast_possible_wrap)]
fn decode_be_signed(bytes: &[u8]) -> i64 {
    if bytes.is_empty() {
        return 0;
    }
    let negative = bytes[0] & 0x80 != 0;
    let mut value: u64 = if negative { u64::MAX } else { 0 };
    for &b in bytes {
        value = (value << 8) | u64::from(b);
    }
    value as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_payload_yields_empty_record() {
        let record = parse_record(&[]).unwrap();
        assert!(record.is_empty());
    }

    #[test]
    fn single_null() {
        // header_size=2, serial_type=0
        let record = parse_record(&[0x02, 0x00]).unwrap();
        assert_eq!(record.serial_types, vec![0]);
        assert_eq!(record.values, vec![Value::Null]);
    }

    #[test]
    fn zero_and_one_constants_consume_no_data() {
        let record = parse_record(&[0x03, 0x08, 0x09]).unwrap();
        assert_eq!(record.values, vec![Value::Zero, Value::One]);
    }

    #[test]
    fn int8_decoding() {
        let record = parse_record(&[0x02, 0x01, 0x2A]).unwrap();
        assert_eq!(record.values, vec![Value::Integer(42)]);

        let record = parse_record(&[0x02, 0x01, 0xFF]).unwrap();
        assert_eq!(record.values, vec![Value::Integer(-1)]);
    }

    #[test]
    fn int24_sign_extension() {
        // 0x800000 is the most negative 24-bit value.
        let record = parse_record(&[0x02, 0x03, 0x80, 0x00, 0x00]).unwrap();
        assert_eq!(record.values, vec![Value::Integer(-8_388_608)]);

        let record = parse_record(&[0x02, 0x03, 0x7F, 0xFF, 0xFF]).unwrap();
        assert_eq!(record.values, vec![Value::Integer(8_388_607)]);
    }

    #[test]
    fn int48_sign_extension() {
        let record =
            parse_record(&[0x02, 0x05, 0x80, 0x00, 0x00, 0x00, 0x00, 0x00]).unwrap();
        assert_eq!(record.values, vec![Value::Integer(-140_737_488_355_328)]);

        let record =
            parse_record(&[0x02, 0x05, 0x7F, 0xFF, 0xFF, 0xFF, 0xFF, 0xFF]).unwrap();
        assert_eq!(record.values, vec![Value::Integer(140_737_488_355_327)]);
    }

    #[test]
    fn int64_decoding() {
        let mut payload = vec![0x02, 0x06];
        payload.extend_from_slice(&0x0102_0304_0506_0708_i64.to_be_bytes());
        let record = parse_record(&payload).unwrap();
        assert_eq!(record.values, vec![Value::Integer(0x0102_0304_0506_0708)]);
    }

    #[test]
    fn float_decoding() {
        let mut payload = vec![0x02, 0x07];
        payload.extend_from_slice(&3.5f64.to_bits().to_be_bytes());
        let record = parse_record(&payload).unwrap();
        assert_eq!(record.values, vec![Value::Float(3.5)]);
    }

    #[test]
    fn float_nan_becomes_null() {
        let mut payload = vec![0x02, 0x07];
        payload.extend_from_slice(&f64::NAN.to_bits().to_be_bytes());
        let record = parse_record(&payload).unwrap();
        assert_eq!(record.values, vec![Value::Null]);
    }

    #[test]
    fn text_and_blob_decoding() {
        // "hello" = 5 bytes, serial type 5*2+13 = 23 = 0x17
        let record = parse_record(&[0x02, 0x17, b'h', b'e', b'l', b'l', b'o']).unwrap();
        assert_eq!(record.values, vec![Value::Text("hello".to_owned())]);

        // 2-byte blob, serial type 2*2+12 = 16 = 0x10
        let record = parse_record(&[0x02, 0x10, 0xCA, 0xFE]).unwrap();
        assert_eq!(record.values, vec![Value::Blob(vec![0xCA, 0xFE])]);
    }

    #[test]
    fn mixed_record_preserves_positions() {
        // (42, "hi", NULL, 1): header 0x05, types [0x01, 0x17-4=0x11(2 chars), 0x00, 0x09]
        let payload = vec![0x05, 0x01, 0x11, 0x00, 0x09, 0x2A, b'h', b'i'];
        let record = parse_record(&payload).unwrap();
        assert_eq!(record.len(), 4);
        assert_eq!(record.values[0], Value::Integer(42));
        assert_eq!(record.values[1], Value::Text("hi".to_owned()));
        assert_eq!(record.values[2], Value::Null);
        assert_eq!(record.values[3], Value::One);
    }

    #[test]
    fn exactly_one_value_per_serial_type() {
        let payload = vec![0x04, 0x00, 0x00, 0x00];
        let record = parse_record(&payload).unwrap();
        assert_eq!(record.serial_types.len(), 3);
        assert_eq!(record.values.len(), 3);
    }

    #[test]
    fn header_size_exceeding_payload_rejected() {
        let err = parse_record(&[10, 0]).unwrap_err();
        assert!(matches!(err, ScanError::MalformedRecord { .. }));
    }

    #[test]
    fn truncated_body_rejected() {
        // Header declares an 8-byte integer but no body follows.
        let err = parse_record(&[0x02, 0x06]).unwrap_err();
        assert!(matches!(err, ScanError::MalformedRecord { .. }));
    }

    #[test]
    fn reserved_serial_type_rejected() {
        let err = parse_record(&[0x02, 0x0A]).unwrap_err();
        assert!(matches!(
            err,
            ScanError::InvalidSerialType { serial_type: 10 }
        ));
    }

    #[test]
    fn invalid_utf8_text_rejected() {
        // 1-char text with an invalid byte.
        let err = parse_record(&[0x02, 0x0F, 0xFF]).unwrap_err();
        assert!(matches!(err, ScanError::MalformedRecord { .. }));
    }

    #[test]
    fn truncated_header_varint_rejected() {
        // Continuation bit set but buffer ends.
        let err = parse_record(&[0x81]).unwrap_err();
        assert!(matches!(err, ScanError::MalformedRecord { .. } | ScanError::InvalidVarint { .. }));
    }
}
