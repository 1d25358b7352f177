//! Branch name derivation
//!
//! The version-control collaborator receives a deterministic branch name:
//! type prefix, record id, then a slug of the title. Slugging is
//! idempotent, so re-deriving from an already-derived name changes nothing.

use crate::record::RecordType;

/// Maximum length of the slug portion
const MAX_SLUG_LEN: usize = 40;

/// Derive the branch name for a record, e.g. `bugfix/42-login-fails`
pub fn branch_name(record_type: RecordType, id: u64, title: &str) -> String {
    let slug = slugify(title);
    if slug.is_empty() {
        format!("{}/{}", record_type.branch_prefix(), id)
    } else {
        format!("{}/{}-{}", record_type.branch_prefix(), id, slug)
    }
}

/// Lowercase, collapse non-alphanumeric runs to single dashes, truncate
pub fn slugify(title: &str) -> String {
    let slug: String = title
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-");

    if slug.len() > MAX_SLUG_LEN {
        // Truncate on a char boundary, then drop any dangling dash
        let mut cut = MAX_SLUG_LEN;
        while !slug.is_char_boundary(cut) {
            cut -= 1;
        }
        slug[..cut].trim_end_matches('-').to_string()
    } else {
        slug
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_branch_name_shape() {
        assert_eq!(
            branch_name(RecordType::Bug, 42, "Login fails"),
            "bugfix/42-login-fails"
        );
        assert_eq!(
            branch_name(RecordType::UserStory, 7, "Export invoices!"),
            "story/7-export-invoices"
        );
        assert_eq!(branch_name(RecordType::Task, 3, "!!!"), "task/3");
    }

    #[test]
    fn test_slugify_collapses_runs() {
        assert_eq!(slugify("Fix  --  the   THING"), "fix-the-thing");
    }

    #[test]
    fn test_slugify_is_idempotent() {
        let titles = [
            "Login fails",
            "Fix: the (weird) bug!!",
            "Ünïcode titles are fine",
            "a-very-long-title-that-keeps-going-and-going-and-going-forever",
        ];
        for title in titles {
            let once = slugify(title);
            assert_eq!(slugify(&once), once, "not idempotent for {:?}", title);
        }
    }

    #[test]
    fn test_slugify_truncates() {
        let slug = slugify("a".repeat(100).as_str());
        assert!(slug.len() <= MAX_SLUG_LEN);
    }
}
