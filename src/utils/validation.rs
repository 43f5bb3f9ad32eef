// Input validation
// Phone numbers, amounts, URLs and course lists

use regex::Regex;
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use anyhow::Result;
use uuid::Uuid;

/// Largest single STK push M-Pesa accepts (KES)
pub const MAX_STK_AMOUNT: i64 = 250_000;

/// Kenyan mobile number, optionally prefixed with 254, +254 or 0
const KENYAN_PHONE_PATTERN: &str = r"^(?:254|\+254|0)?(7|1)\d{8}$";

/// Validate URL format
pub fn validate_url(url: &str) -> bool {
    Regex::new(r"^https?://[^\s/$.?#].[^\s]*$")
        .map(|re| re.is_match(url))
        .unwrap_or(false)
}

/// Validate a Kenyan mobile number as typed by the customer
pub fn validate_phone_number(phone: &str) -> Result<()> {
    if phone.trim().is_empty() {
        anyhow::bail!("Phone number is required");
    }

    let valid = Regex::new(KENYAN_PHONE_PATTERN)
        .map(|re| re.is_match(phone.trim()))
        .unwrap_or(false);

    if !valid {
        anyhow::bail!("Please enter a valid Kenyan phone number");
    }

    Ok(())
}

/// Normalize a phone number to 254XXXXXXXXX
pub fn format_phone_number(phone: &str) -> String {
    let digits: String = phone.chars().filter(|c| c.is_ascii_digit()).collect();

    if let Some(rest) = digits.strip_prefix('0') {
        format!("254{}", rest)
    } else if digits.starts_with('7') {
        format!("254{}", digits)
    } else if digits.starts_with("254") {
        digits
    } else {
        format!("254{}", digits)
    }
}

/// Round an amount up to whole shillings and check it is payable
pub fn normalize_amount(amount: Decimal) -> Result<i64> {
    if amount <= Decimal::ZERO {
        anyhow::bail!("Payment amount must be positive");
    }

    let shillings = amount
        .ceil()
        .to_i64()
        .ok_or_else(|| anyhow::anyhow!("Payment amount out of range"))?;

    if shillings > MAX_STK_AMOUNT {
        anyhow::bail!("Payment amount exceeds the M-Pesa limit of {}", MAX_STK_AMOUNT);
    }

    Ok(shillings)
}

/// A payment must cover at least one course, each listed once
pub fn validate_course_list(courses: &[Uuid]) -> Result<()> {
    if courses.is_empty() {
        anyhow::bail!("At least one course is required");
    }

    let mut seen = std::collections::HashSet::new();
    if !courses.iter().all(|c| seen.insert(*c)) {
        anyhow::bail!("Duplicate course in payment");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_phone_number() {
        assert_eq!(format_phone_number("0712345678"), "254712345678");
        assert_eq!(format_phone_number("712345678"), "254712345678");
        assert_eq!(format_phone_number("254712345678"), "254712345678");
        assert_eq!(format_phone_number("+254 712 345 678"), "254712345678");
        assert_eq!(format_phone_number("0112-345-678"), "254112345678");
        assert_eq!(format_phone_number("112345678"), "254112345678");
    }

    #[test]
    fn test_validate_phone_number() {
        assert!(validate_phone_number("0712345678").is_ok());
        assert!(validate_phone_number("+254712345678").is_ok());
        assert!(validate_phone_number("254112345678").is_ok());
        assert!(validate_phone_number("712345678").is_ok());

        assert!(validate_phone_number("").is_err());
        assert!(validate_phone_number("0812345678").is_err());
        assert!(validate_phone_number("07123456").is_err());
        assert!(validate_phone_number("not a phone").is_err());
    }

    #[test]
    fn test_normalize_amount() {
        assert_eq!(normalize_amount(Decimal::new(149950, 2)).unwrap(), 1500);
        assert_eq!(normalize_amount(Decimal::new(1, 2)).unwrap(), 1);
        assert_eq!(normalize_amount(Decimal::new(250_000, 0)).unwrap(), 250_000);

        assert!(normalize_amount(Decimal::ZERO).is_err());
        assert!(normalize_amount(Decimal::new(-5, 0)).is_err());
        assert!(normalize_amount(Decimal::new(250_001, 0)).is_err());
    }

    #[test]
    fn test_validate_course_list() {
        let course = Uuid::new_v4();
        assert!(validate_course_list(&[course]).is_ok());
        assert!(validate_course_list(&[]).is_err());
        assert!(validate_course_list(&[course, course]).is_err());
    }

    #[test]
    fn test_validate_url() {
        assert!(validate_url("https://example.com/callback"));
        assert!(validate_url("http://localhost:8000/api/v1/callback"));
        assert!(!validate_url("ftp://example.com"));
        assert!(!validate_url("not a url"));
    }
}
