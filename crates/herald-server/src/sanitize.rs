//! Input sanitisation for notification fields.
//!
//! The transforms run as one ordered pass, repeated until the string stops
//! changing: removals can splice surrounding characters into a new match
//! (e.g. `.*./` becomes `../` once the asterisk is gone), and the fixpoint
//! guarantees sanitisation is idempotent.

use once_cell::sync::Lazy;
use regex::Regex;

/// Maximum accepted length of `title` and `message` after sanitisation.
pub const MAX_FIELD_LEN: usize = 500;

static HEADING_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?m)^#{1,6} ").expect("heading regex"));

fn sanitize_pass(input: &str) -> String {
    let mut s = input.replace("<script", "");
    s = s.replace("../", "");
    s.retain(|c| !matches!(c, ';' | '&' | '|' | '>' | '<' | '`' | '$' | '\\'));
    s = s.replace("**", "");
    s = s.replace('*', "");
    HEADING_RE.replace_all(&s, "").into_owned()
}

/// Strips injection vectors and markup, preserving inner text.
pub fn sanitize(input: &str) -> String {
    let mut s = input.to_string();
    loop {
        let next = sanitize_pass(&s);
        if next == s {
            break;
        }
        s = next;
    }
    s.trim().to_string()
}

/// Sanitises a field and enforces the 1..=500 length contract. The error
/// string is the client-facing message.
pub fn validate_field(label: &str, raw: &str) -> Result<String, String> {
    let cleaned = sanitize(raw);
    if cleaned.is_empty() {
        return Err(format!("Invalid {label}"));
    }
    if cleaned.chars().count() > MAX_FIELD_LEN {
        return Err(format!("{} too long", capitalize(label)));
    }
    Ok(cleaned)
}

fn capitalize(label: &str) -> String {
    let mut chars = label.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn strips_script_tags_and_shell_meta() {
        assert_eq!(
            sanitize("<script>alert(1)</script>; rm -rf /"),
            "alert(1)/script rm -rf /"
        );
    }

    #[test]
    fn strips_path_traversal() {
        assert_eq!(sanitize("see ../../etc/passwd"), "see etc/passwd");
    }

    #[test]
    fn spliced_traversal_does_not_survive() {
        // The asterisk removal would otherwise splice a fresh "../".
        assert!(!sanitize(".*./secret").contains("../"));
    }

    #[test]
    fn markup_markers_removed_inner_text_kept() {
        assert_eq!(sanitize("**bold** and *em* and `code`"), "bold and em and code");
        assert_eq!(sanitize("## Heading line"), "Heading line");
        assert_eq!(sanitize("###### Deep"), "Deep");
        // Seven hashes is not a heading marker.
        assert_eq!(sanitize("####### nope"), "####### nope");
    }

    #[test]
    fn sanitize_is_idempotent() {
        for input in [
            "<script>alert(1)</script>; rm -rf /",
            ".*./secret",
            "## **mixed** `markup` ../x",
            "plain text stays plain",
            "<scr<scriptipt>sneaky",
            "####### many hashes",
        ] {
            let once = sanitize(input);
            assert_eq!(sanitize(&once), once, "not idempotent for {input:?}");
        }
    }

    #[test]
    fn validate_rejects_empty_after_sanitisation() {
        assert_eq!(validate_field("message", "***"), Err("Invalid message".into()));
        assert_eq!(validate_field("title", "   "), Err("Invalid title".into()));
    }

    #[test]
    fn validate_length_boundaries() {
        let exactly = "a".repeat(MAX_FIELD_LEN);
        assert_eq!(validate_field("message", &exactly).unwrap(), exactly);

        let too_long = "a".repeat(MAX_FIELD_LEN + 1);
        assert_eq!(
            validate_field("message", &too_long),
            Err("Message too long".into())
        );

        // 501 raw characters that sanitise below the cap are accepted.
        let mut shrinking = "**".to_string();
        shrinking.push_str(&"a".repeat(MAX_FIELD_LEN - 1));
        assert_eq!(shrinking.chars().count(), MAX_FIELD_LEN + 1);
        assert_eq!(
            validate_field("message", &shrinking).unwrap().chars().count(),
            MAX_FIELD_LEN - 1
        );
    }
}
