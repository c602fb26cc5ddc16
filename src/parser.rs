//! Line parsing for the comma-separated ASCII sample protocol
//!
//! One line of input is one sample: `v1,v2,...,vN\n` where every field is a
//! decimal floating-point number. Parsing is all-or-nothing — if any field
//! fails to decode the whole line is rejected and the caller must not
//! advance any buffer state.
//!
//! Channel-arity enforcement is deliberately *not* done here: the fixed
//! channel count is session state owned by the engine (see
//! [`crate::types::ChannelCount`]), which keeps this function pure.

/// Why a line was rejected
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRejection {
    /// Line was empty (or whitespace only)
    Empty,
    /// A field failed numeric decoding
    BadField {
        /// Zero-based field index
        index: usize,
        /// The offending token
        token: String,
    },
}

impl std::fmt::Display for LineRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LineRejection::Empty => write!(f, "empty line"),
            LineRejection::BadField { index, token } => {
                write!(f, "field {} is not a number: {:?}", index, token)
            }
        }
    }
}

/// Parse one line into per-channel values.
///
/// Splits on `,` and decodes every field as `f64`. Succeeds only if all
/// fields parse; trailing `\r` and surrounding whitespace are tolerated.
pub fn parse_line(line: &str) -> Result<Vec<f64>, LineRejection> {
    let line = line.trim();
    if line.is_empty() {
        return Err(LineRejection::Empty);
    }

    let mut values = Vec::with_capacity(4);
    for (index, field) in line.split(',').enumerate() {
        match field.trim().parse::<f64>() {
            Ok(v) => values.push(v),
            Err(_) => {
                return Err(LineRejection::BadField {
                    index,
                    token: field.trim().to_string(),
                })
            }
        }
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_valid_line() {
        assert_eq!(parse_line("1.0,2.5,-3"), Ok(vec![1.0, 2.5, -3.0]));
    }

    #[test]
    fn test_parse_single_channel() {
        assert_eq!(parse_line("42"), Ok(vec![42.0]));
    }

    #[test]
    fn test_parse_tolerates_crlf_and_spaces() {
        assert_eq!(parse_line(" 1.0, 2.0\r\n"), Ok(vec![1.0, 2.0]));
    }

    #[test]
    fn test_parse_empty_line() {
        assert_eq!(parse_line(""), Err(LineRejection::Empty));
        assert_eq!(parse_line("   \r\n"), Err(LineRejection::Empty));
    }

    #[test]
    fn test_parse_rejects_bad_field() {
        let err = parse_line("1.0,bad,3.0").unwrap_err();
        assert_eq!(
            err,
            LineRejection::BadField {
                index: 1,
                token: "bad".to_string()
            }
        );
    }

    #[test]
    fn test_parse_rejects_empty_field() {
        // "1.0,,3.0" has an empty middle field; the whole line is skipped
        assert!(matches!(
            parse_line("1.0,,3.0"),
            Err(LineRejection::BadField { index: 1, .. })
        ));
    }

    #[test]
    fn test_parse_scientific_notation() {
        assert_eq!(parse_line("1e3,-2.5e-2"), Ok(vec![1000.0, -0.025]));
    }
}
