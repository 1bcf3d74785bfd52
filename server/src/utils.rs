use rand::{Rng, distributions::Alphanumeric, thread_rng};
use regex::Regex;

/// Normalizes free-text input (names, search queries): underscores become
/// spaces, everything outside `[A-Za-z0-9- ]` is stripped, runs of spaces
/// collapse, the result is trimmed lowercase.
pub fn sanitize(input: &str) -> String {
    let replace = Regex::new(r"[_]").unwrap();
    let mut s = replace.replace_all(input, " ").into_owned();

    let clean_re = Regex::new(r"[^A-Za-z0-9- ]").unwrap();
    s = clean_re.replace_all(&s, "").into_owned();

    s = s.trim().to_string();

    let collapse = Regex::new(r" +").unwrap();
    collapse.replace_all(&s, " ").into_owned().to_lowercase()
}

/// Storage keys (and map names) must embed cleanly in URLs and logs.
pub fn valid_storage_key(key: &str) -> bool {
    let re = Regex::new(r"^[A-Za-z0-9_.:-]{1,64}$").unwrap();
    re.is_match(key)
}

/// Random alphanumeric password for webhook-provisioned accounts.
pub fn generate_password(length: usize) -> String {
    thread_rng()
        .sample_iter(&Alphanumeric)
        .take(length)
        .map(char::from)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::{generate_password, sanitize, valid_storage_key};

    #[test]
    fn test_basic() {
        assert_eq!(sanitize("hello_world"), "hello world");
        assert_eq!(sanitize("Levi-Cohen"), "levi-cohen");
        assert_eq!(sanitize("clean-this_text!"), "clean-this text");
    }

    #[test]
    fn test_leading_trailing_spaces() {
        assert_eq!(sanitize("   hello   "), "hello");
        assert_eq!(sanitize("  multiple   spaces  "), "multiple spaces");
    }

    #[test]
    fn test_special_characters() {
        assert_eq!(sanitize("!@#$%^&*()"), "");
        assert_eq!(sanitize("abc123!@#"), "abc123");
    }

    #[test]
    fn test_empty_string() {
        assert_eq!(sanitize(""), "");
        assert_eq!(sanitize("     "), "");
    }

    #[test]
    fn test_storage_keys() {
        assert!(valid_storage_key("map:main"));
        assert!(valid_storage_key("ui.settings-v2"));
        assert!(!valid_storage_key(""));
        assert!(!valid_storage_key("has space"));
        assert!(!valid_storage_key("path/traversal"));
        assert!(!valid_storage_key(&"x".repeat(65)));
    }

    #[test]
    fn test_generated_passwords() {
        let a = generate_password(12);
        let b = generate_password(12);
        assert_eq!(a.len(), 12);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }
}
