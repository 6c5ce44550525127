use regex::Regex;

pub fn validate_email(email: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
    re.is_match(email)
}

/// UPI handles look like `name@bank`.
pub fn validate_upi_id(upi_id: &str) -> bool {
    let re = Regex::new(r"^[a-zA-Z0-9._-]{2,}@[a-zA-Z]{2,}$").unwrap();
    re.is_match(upi_id)
}

pub fn validate_coordinates(latitude: f64, longitude: f64) -> bool {
    (-90.0..=90.0).contains(&latitude) && (-180.0..=180.0).contains(&longitude)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert!(validate_email("ravi@example.com"));
        assert!(validate_email("a.b+c@sub.domain.in"));
        assert!(!validate_email("not-an-email"));
        assert!(!validate_email("missing@tld"));
    }

    #[test]
    fn test_validate_upi_id() {
        assert!(validate_upi_id("ravi.kumar@okhdfc"));
        assert!(validate_upi_id("user_01@ybl"));
        assert!(!validate_upi_id("@bank"));
        assert!(!validate_upi_id("no-at-sign"));
        assert!(!validate_upi_id("user@1"));
    }

    #[test]
    fn test_validate_coordinates() {
        assert!(validate_coordinates(21.17, 72.83));
        assert!(validate_coordinates(-90.0, 180.0));
        assert!(!validate_coordinates(91.0, 0.0));
        assert!(!validate_coordinates(0.0, -181.0));
    }
}
