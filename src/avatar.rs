//! Gravatar avatar URL resolver.
//!
//! The URL format is a fixed contract with the image service: an MD5 digest of
//! the lower-cased email, with `identicon` as the fallback image style.

/// Deterministic avatar URL for an email at the given pixel size. Pure
/// function; the email is lower-cased before hashing so differing case yields
/// the same URL.
pub fn gravatar_url(email: &str, size: u32) -> String {
    let digest = md5::compute(email.to_lowercase().as_bytes());
    format!(
        "https://www.gravatar.com/avatar/{:x}?d=identicon&s={}",
        digest, size
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn url_matches_gravatar_contract() {
        assert_eq!(
            gravatar_url("john@example.com", 128),
            "https://www.gravatar.com/avatar/d4c74594d841139328695756648b6bd6?d=identicon&s=128"
        );
    }

    #[test]
    fn case_insensitive_in_email() {
        assert_eq!(
            gravatar_url("JOHN@EXAMPLE.COM", 64),
            gravatar_url("john@example.com", 64)
        );
    }

    #[test]
    fn size_is_reflected_in_query() {
        let url = gravatar_url("kev@x.com", 32);
        assert!(url.ends_with("?d=identicon&s=32"));
        assert!(url.contains("cee848f9777bedee9ee8c2ef98df529c"));
    }
}
