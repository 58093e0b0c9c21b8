use std::fmt;

/// A dynamically-typed column value decoded from a record.
///
/// The constants 0 and 1 (serial types 8 and 9) keep their own variants so a
/// decoded record mirrors the on-disk serial types exactly; they behave as
/// the integers 0 and 1 everywhere a value is rendered or promoted.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL.
    Null,
    /// A signed big-endian integer of 1-8 bytes.
    Integer(i64),
    /// A 64-bit IEEE 754 floating-point number.
    Float(f64),
    /// The integer constant 0 (serial type 8, zero data bytes).
    Zero,
    /// The integer constant 1 (serial type 9, zero data bytes).
    One,
    /// A UTF-8 text string.
    Text(String),
    /// A binary large object.
    Blob(Vec<u8>),
}

impl Value {
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// The value as an integer, when it is one.
    pub const fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Zero => Some(0),
            Self::One => Some(1),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_blob(&self) -> Option<&[u8]> {
        match self {
            Self::Blob(b) => Some(b),
            _ => None,
        }
    }

    /// Promote to an integer the way a trailing index rowid is read: real
    /// integers directly, floats truncated, decimal text parsed.
    pub fn promote_to_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(i) => Some(*i),
            Self::Zero => Some(0),
            Self::One => Some(1),
            #[allow(clippy::cast_possible_truncation)]
            Self::Float(f) => Some(*f as i64),
            Self::Text(s) => s.trim().parse().ok(),
            Self::Null | Self::Blob(_) => None,
        }
    }

    /// Render for output and string-wise comparison. NULL renders empty,
    /// text verbatim, blobs lossily.
    pub fn render(&self) -> String {
        match self {
            Self::Null => String::new(),
            Self::Integer(i) => i.to_string(),
            Self::Float(f) => f.to_string(),
            Self::Zero => "0".to_owned(),
            Self::One => "1".to_owned(),
            Self::Text(s) => s.clone(),
            Self::Blob(b) => String::from_utf8_lossy(b).into_owned(),
        }
    }

    /// Raw bytes used for byte-wise index key comparison: text and blobs
    /// compare by their stored bytes, everything else by its rendering.
    pub fn key_bytes(&self) -> Vec<u8> {
        match self {
            Self::Text(s) => s.as_bytes().to_vec(),
            Self::Blob(b) => b.clone(),
            other => other.render().into_bytes(),
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.render())
    }
}
