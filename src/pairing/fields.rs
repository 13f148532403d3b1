//! Named-field codec used by pairing payloads.
//!
//! A payload is a sequence of fields, each an ASCII name followed by a
//! big-endian u16 length and the value:
//! ```text
//! [ name (n) | length (2, BE) | value (length) ] ...
//! ```
//! Fields are read strictly in order; a pairing step knows exactly which
//! names it expects.

use crate::core::PairingError;

/// Device identifier.
pub const SP1: &str = "SP1=";
/// Link parameters.
pub const SP2: &str = "SP2=";
/// Public key and nonce.
pub const SPS1: &str = "SPS1=";
/// Confirmation value.
pub const SPS2: &str = "SPS2=";
/// Controller's final constant.
pub const SP0GP0: &str = "SP0GP0";
/// Device's final constant.
pub const P0: &str = "P0=";

/// Builds a field payload.
#[derive(Debug, Default)]
pub struct FieldWriter {
    buf: Vec<u8>,
    oversized: Option<PairingError>,
}

impl FieldWriter {
    /// Start an empty payload.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a field.
    ///
    /// A value longer than `u16::MAX` is not written; [`finish`](Self::finish)
    /// reports it.
    pub fn field(mut self, name: &'static str, value: &[u8]) -> Self {
        if self.oversized.is_some() {
            return self;
        }
        let Ok(len) = u16::try_from(value.len()) else {
            self.oversized = Some(PairingError::FieldTooLong {
                field: name,
                len: value.len(),
            });
            return self;
        };
        self.buf.extend_from_slice(name.as_bytes());
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value);
        self
    }

    /// Finish and return the payload bytes.
    pub fn finish(self) -> Result<Vec<u8>, PairingError> {
        match self.oversized {
            Some(e) => Err(e),
            None => Ok(self.buf),
        }
    }
}

/// Reads fields in order from a payload.
#[derive(Debug)]
pub struct FieldReader<'a> {
    data: &'a [u8],
}

impl<'a> FieldReader<'a> {
    /// Start reading a payload.
    pub fn new(data: &'a [u8]) -> Self {
        Self { data }
    }

    /// Read the next field, which must be called `name`.
    pub fn expect(&mut self, name: &'static str) -> Result<&'a [u8], PairingError> {
        let missing = PairingError::MissingField { expected: name };

        let rest = self.data.strip_prefix(name.as_bytes()).ok_or(missing)?;
        if rest.len() < 2 {
            return Err(PairingError::MissingField { expected: name });
        }
        let len = u16::from_be_bytes([rest[0], rest[1]]) as usize;
        let rest = &rest[2..];
        if rest.len() < len {
            return Err(PairingError::InvalidLength {
                field: name,
                expected: len,
                actual: rest.len(),
            });
        }

        let (value, remaining) = rest.split_at(len);
        self.data = remaining;
        Ok(value)
    }

    /// Read the next field and require an exact length.
    pub fn expect_array<const N: usize>(&mut self, name: &'static str) -> Result<[u8; N], PairingError> {
        let value = self.expect(name)?;
        value.try_into().map_err(|_| PairingError::InvalidLength {
            field: name,
            expected: N,
            actual: value.len(),
        })
    }

    /// Require that every byte has been consumed.
    pub fn finish(self) -> Result<(), PairingError> {
        if self.data.is_empty() {
            Ok(())
        } else {
            Err(PairingError::TrailingBytes(self.data.len()))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_layout() {
        let payload = FieldWriter::new().field(P0, &[0xA5]).finish().unwrap();
        assert_eq!(payload, b"P0=\x00\x01\xA5");
    }

    #[test]
    fn test_read_in_order() {
        let payload = FieldWriter::new()
            .field(SP1, &[1, 2, 3, 4])
            .field(SP2, b"link")
            .finish()
            .unwrap();

        let mut reader = FieldReader::new(&payload);
        assert_eq!(reader.expect_array::<4>(SP1).unwrap(), [1, 2, 3, 4]);
        assert_eq!(reader.expect(SP2).unwrap(), b"link");
        reader.finish().unwrap();
    }

    #[test]
    fn test_wrong_name() {
        let payload = FieldWriter::new().field(SP2, b"x").finish().unwrap();
        let mut reader = FieldReader::new(&payload);
        assert!(matches!(
            reader.expect(SP1),
            Err(PairingError::MissingField { expected: "SP1=" })
        ));
    }

    #[test]
    fn test_wrong_length() {
        let payload = FieldWriter::new().field(SP1, &[1, 2, 3]).finish().unwrap();
        let mut reader = FieldReader::new(&payload);
        assert!(matches!(
            reader.expect_array::<4>(SP1),
            Err(PairingError::InvalidLength { expected: 4, actual: 3, .. })
        ));
    }

    #[test]
    fn test_truncated_value() {
        let mut payload = FieldWriter::new().field(SPS2, &[0u8; 16]).finish().unwrap();
        payload.truncate(payload.len() - 4);
        let mut reader = FieldReader::new(&payload);
        assert!(matches!(
            reader.expect(SPS2),
            Err(PairingError::InvalidLength { expected: 16, actual: 12, .. })
        ));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut payload = FieldWriter::new().field(SP0GP0, &[]).finish().unwrap();
        payload.push(0xFF);
        let mut reader = FieldReader::new(&payload);
        reader.expect(SP0GP0).unwrap();
        assert!(matches!(reader.finish(), Err(PairingError::TrailingBytes(1))));
    }

    #[test]
    fn test_oversized_value_is_rejected() {
        let value = vec![0u8; usize::from(u16::MAX) + 1];
        let result = FieldWriter::new().field(SP1, &[1]).field(SP2, &value).finish();
        assert!(matches!(
            result,
            Err(PairingError::FieldTooLong { field: "SP2=", len: 65536 })
        ));

        let max = vec![0u8; usize::from(u16::MAX)];
        let payload = FieldWriter::new().field(SP2, &max).finish().unwrap();
        assert_eq!(&payload[4..6], &[0xFF, 0xFF]);
        assert_eq!(payload.len(), 4 + 2 + max.len());
    }
}
