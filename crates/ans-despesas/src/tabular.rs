//! Helpers for the `;`-delimited, decimal-comma tabular files exchanged with
//! the ANS open-data portal and with downstream spreadsheet users.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;

/// Byte-order mark emitted at the start of generated files so spreadsheet
/// tools pick UTF-8 instead of the platform default.
const BOM: &str = "\u{feff}";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextEncoding {
    Utf8,
    Latin1,
}

/// Two-attempt decode strategy: try `primary`, and on failure retry with
/// `fallback` when one is configured. The portal publishes most files as
/// UTF-8 (often with a BOM) but older registry reports are Latin-1.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecodePolicy {
    pub primary: TextEncoding,
    pub fallback: Option<TextEncoding>,
}

impl Default for DecodePolicy {
    fn default() -> Self {
        Self {
            primary: TextEncoding::Utf8,
            fallback: Some(TextEncoding::Latin1),
        }
    }
}

impl DecodePolicy {
    pub fn strict(encoding: TextEncoding) -> Self {
        Self {
            primary: encoding,
            fallback: None,
        }
    }
}

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("input could not be decoded as {encoding:?}")]
    InvalidText {
        encoding: TextEncoding,
        source: std::str::Utf8Error,
    },
}

/// Decodes raw file bytes according to the policy, stripping a leading BOM.
pub fn decode(bytes: &[u8], policy: &DecodePolicy) -> Result<String, DecodeError> {
    match decode_one(bytes, policy.primary) {
        Ok(text) => Ok(text),
        Err(source) => {
            let Some(fallback) = policy.fallback else {
                return Err(DecodeError::InvalidText {
                    encoding: policy.primary,
                    source,
                });
            };
            decode_one(bytes, fallback).map_err(|source| DecodeError::InvalidText {
                encoding: fallback,
                source,
            })
        }
    }
}

fn decode_one(bytes: &[u8], encoding: TextEncoding) -> Result<String, std::str::Utf8Error> {
    match encoding {
        TextEncoding::Utf8 => {
            let text = std::str::from_utf8(bytes)?;
            Ok(text.strip_prefix(BOM).unwrap_or(text).to_string())
        }
        TextEncoding::Latin1 => Ok(latin1_to_string(bytes)),
    }
}

// Latin-1 maps every byte to the code point of the same value, so this
// conversion cannot fail.
fn latin1_to_string(bytes: &[u8]) -> String {
    bytes.iter().map(|&byte| char::from(byte)).collect()
}

/// Parses a decimal-comma number, tolerating `.` thousands separators
/// (`1.234,56`) as well as plain dot-decimal input.
pub fn parse_decimal_comma(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    let normalized = if trimmed.contains(',') {
        trimmed.replace('.', "").replace(',', ".")
    } else {
        trimmed.to_string()
    };

    normalized.parse::<f64>().ok()
}

/// Formats a number with a comma decimal separator and a fixed precision.
pub fn format_decimal_comma(value: f64, decimals: usize) -> String {
    format!("{value:.decimals$}").replace('.', ",")
}

/// Opens a `;`-delimited CSV writer over a fresh file, emitting the BOM
/// before the header row.
pub fn delimited_writer(path: &Path) -> Result<csv::Writer<File>, std::io::Error> {
    let mut file = File::create(path)?;
    file.write_all(BOM.as_bytes())?;
    Ok(csv::WriterBuilder::new().delimiter(b';').from_writer(file))
}

/// Builds a `;`-delimited CSV reader over already-decoded text.
pub fn delimited_reader(text: &str) -> csv::Reader<&[u8]> {
    csv::ReaderBuilder::new()
        .delimiter(b';')
        .flexible(true)
        .from_reader(text.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_utf8_and_strips_bom() {
        let bytes = "\u{feff}RegistroANS;UF\n123;SP\n".as_bytes();
        let text = decode(bytes, &DecodePolicy::default()).expect("utf-8 decodes");
        assert!(text.starts_with("RegistroANS"));
    }

    #[test]
    fn falls_back_to_latin1_on_invalid_utf8() {
        // "Operaçao" encoded as Latin-1: 0xE7 is not valid UTF-8.
        let bytes = b"Opera\xe7ao";
        let text = decode(bytes, &DecodePolicy::default()).expect("latin-1 fallback");
        assert_eq!(text, "Opera\u{e7}ao");
    }

    #[test]
    fn strict_policy_rejects_invalid_utf8() {
        let bytes = b"Opera\xe7ao";
        let error = decode(bytes, &DecodePolicy::strict(TextEncoding::Utf8))
            .expect_err("strict utf-8 fails");
        assert!(matches!(error, DecodeError::InvalidText { .. }));
    }

    #[test]
    fn parses_decimal_comma_with_thousands() {
        assert_eq!(parse_decimal_comma("1.234,56"), Some(1234.56));
        assert_eq!(parse_decimal_comma("-10,5"), Some(-10.5));
        assert_eq!(parse_decimal_comma("0,00"), Some(0.0));
    }

    #[test]
    fn parses_plain_dot_decimal() {
        assert_eq!(parse_decimal_comma("230068808.69"), Some(230068808.69));
        assert_eq!(parse_decimal_comma("42"), Some(42.0));
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert_eq!(parse_decimal_comma(""), None);
        assert_eq!(parse_decimal_comma("   "), None);
        assert_eq!(parse_decimal_comma("n/a"), None);
    }

    #[test]
    fn formats_with_comma_separator() {
        assert_eq!(format_decimal_comma(1234.5, 2), "1234,50");
        assert_eq!(format_decimal_comma(-0.126, 2), "-0,13");
        assert_eq!(format_decimal_comma(600.0, 2), "600,00");
    }
}
