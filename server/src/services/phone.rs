// homeworks/src/services/phone.rs

//! Iranian mobile numbers: `09` followed by nine ASCII digits.

use crate::errors::AppError;

/// Maps Persian (U+06F0..U+06F9) and Arabic-Indic (U+0660..U+0669) digits to ASCII.
pub fn normalize_digits(raw: &str) -> String {
  raw
    .chars()
    .map(|c| match c {
      '\u{06F0}'..='\u{06F9}' => char::from(b'0' + (c as u32 - 0x06F0) as u8),
      '\u{0660}'..='\u{0669}' => char::from(b'0' + (c as u32 - 0x0660) as u8),
      other => other,
    })
    .collect()
}

/// Normalised form of a user-typed number: ASCII digits, separators removed,
/// international prefixes (`+98`, `0098`) rewritten to the leading `0`.
pub fn normalize_phone(raw: &str) -> String {
  let digits: String = normalize_digits(raw)
    .chars()
    .filter(|c| !matches!(c, ' ' | '-' | '(' | ')' | '\u{200C}'))
    .collect();

  if let Some(rest) = digits.strip_prefix("+98") {
    format!("0{}", rest)
  } else if let Some(rest) = digits.strip_prefix("0098") {
    format!("0{}", rest)
  } else if digits.len() == 12 && digits.starts_with("989") {
    format!("0{}", &digits[2..])
  } else {
    digits
  }
}

/// True for exactly `09` + nine ASCII digits. Non-ASCII digits are rejected; normalise first.
pub fn is_valid_phone(phone: &str) -> bool {
  phone.len() == 11 && phone.starts_with("09") && phone.bytes().all(|b| b.is_ascii_digit())
}

/// Normalises then validates.
pub fn parse_phone(raw: &str) -> Result<String, AppError> {
  let phone = normalize_phone(raw);
  if is_valid_phone(&phone) {
    Ok(phone)
  } else {
    Err(AppError::Validation(
      "Phone number must be 11 digits starting with 09.".to_string(),
    ))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn accepts_exactly_eleven_digits_starting_with_09() {
    assert!(is_valid_phone("09121234567"));
    assert!(!is_valid_phone("0912123456"));
    assert!(!is_valid_phone("091212345678"));
    assert!(!is_valid_phone("08121234567"));
    assert!(!is_valid_phone("9121234567"));
    assert!(!is_valid_phone("0912123456a"));
    assert!(!is_valid_phone(""));
  }

  #[test]
  fn persian_and_arabic_digits_need_normalisation() {
    let persian = "۰۹۱۲۱۲۳۴۵۶۷";
    let arabic = "٠٩١٢١٢٣٤٥٦٧";
    assert!(!is_valid_phone(persian));
    assert!(!is_valid_phone(arabic));
    assert_eq!(normalize_digits(persian), "09121234567");
    assert_eq!(normalize_digits(arabic), "09121234567");
    assert!(is_valid_phone(&normalize_phone(persian)));
  }

  #[test]
  fn international_prefixes_and_separators_are_folded() {
    assert_eq!(normalize_phone("+98 912 123 4567"), "09121234567");
    assert_eq!(normalize_phone("0098-912-123-4567"), "09121234567");
    assert_eq!(normalize_phone("989121234567"), "09121234567");
    assert_eq!(parse_phone("0912 123 4567").unwrap(), "09121234567");
  }

  #[test]
  fn parse_rejects_landlines() {
    assert!(matches!(parse_phone("02112345678"), Err(AppError::Validation(_))));
  }
}
