//! Runtime parameter descriptors.
//!
//! A parameter is the external surface of the compiled program: the host
//! presents it to the user, stores its value, and feeds it back to the
//! runtime evaluator. Every parameter carries a stable identifier so saved
//! values survive recompilation and graph edits.

use crate::value::{Color, Matrix4, Projector, Real};

/// Stable external identifier for a parameter.
///
/// Authored as a canonical hex string (`8-4-4-4-12` groups, or 32 plain
/// hex digits). A zero uid means "not assigned"; the host falls back to
/// matching by name.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Default)]
pub struct ParamUid(pub u128);

impl ParamUid {
    /// Whether this uid was actually assigned.
    pub fn is_assigned(self) -> bool {
        self.0 != 0
    }

    /// Parse an authored identifier string.
    ///
    /// Accepts the hyphenated `8-4-4-4-12` form and the plain 32-digit
    /// form. The empty string parses to the unassigned uid.
    pub fn parse(text: &str) -> Result<ParamUid, UidParseError> {
        if text.is_empty() {
            return Ok(ParamUid(0));
        }

        let mut digits = 0u32;
        let mut value = 0u128;
        for (pos, ch) in text.char_indices() {
            if ch == '-' {
                continue;
            }
            let Some(digit) = ch.to_digit(16) else {
                return Err(UidParseError::InvalidCharacter { character: ch, position: pos });
            };
            if digits == 32 {
                return Err(UidParseError::WrongLength { digits: digits as usize + 1 });
            }
            value = (value << 4) | u128::from(digit);
            digits += 1;
        }

        if digits != 32 {
            return Err(UidParseError::WrongLength { digits: digits as usize });
        }
        Ok(ParamUid(value))
    }
}

/// Failure to parse an authored stable identifier.
#[derive(Clone, Copy, PartialEq, Eq, Debug, thiserror::Error)]
pub enum UidParseError {
    #[error("invalid character `{character}` at byte {position} in identifier")]
    InvalidCharacter { character: char, position: usize },
    #[error("identifier must contain exactly 32 hex digits, found {digits}")]
    WrongLength { digits: usize },
}

/// Default value of a parameter, typed by domain.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub enum ParamValue {
    Bool(bool),
    Scalar(Real),
    /// Enumeration parameters store the selected option value.
    Int(i32),
    Color(Color),
    String(String),
    Matrix(Matrix4),
    Projector(Projector),
    /// Image parameters default to an externally stored resource id.
    Image(u32),
}

/// One selectable value of an enumeration parameter.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct EnumOption {
    pub value: i32,
    pub name: String,
}

/// A runtime parameter declaration.
///
/// Declarations are created exactly once per source parameter node and
/// shared by every use site; a parameter's declaration never depends on
/// tags or states, only its uses do.
#[derive(Clone, PartialEq, Eq, Hash, Debug)]
pub struct Parameter {
    pub name: String,
    pub uid: ParamUid,
    pub default: ParamValue,
    /// Possible values, enumeration parameters only.
    pub options: Vec<EnumOption>,
}

impl Parameter {
    pub fn new(name: impl Into<String>, uid: ParamUid, default: ParamValue) -> Self {
        Parameter {
            name: name.into(),
            uid,
            default,
            options: Vec::new(),
        }
    }

    pub fn with_options(mut self, options: Vec<EnumOption>) -> Self {
        self.options = options;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn parses_hyphenated_uid() {
        let uid = ParamUid::parse("01234567-89ab-cdef-0123-456789abcdef");
        assert_eq!(uid, Ok(ParamUid(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef)));
    }

    #[test]
    fn parses_plain_uid() {
        let uid = ParamUid::parse("0123456789abcdef0123456789abcdef");
        assert_eq!(uid, Ok(ParamUid(0x0123_4567_89ab_cdef_0123_4567_89ab_cdef)));
    }

    #[test]
    fn empty_uid_is_unassigned() {
        assert_eq!(ParamUid::parse(""), Ok(ParamUid(0)));
        assert!(!ParamUid(0).is_assigned());
    }

    #[test]
    fn rejects_bad_identifiers() {
        assert!(matches!(
            ParamUid::parse("xyz"),
            Err(UidParseError::InvalidCharacter { .. })
        ));
        assert!(matches!(
            ParamUid::parse("0123"),
            Err(UidParseError::WrongLength { digits: 4 })
        ));
        assert!(matches!(
            ParamUid::parse("0123456789abcdef0123456789abcdef00"),
            Err(UidParseError::WrongLength { .. })
        ));
    }
}
