//! Git output parsing helpers.

use super::types::Commit;

/// Extracts the most useful diagnostic line from git stderr.
///
/// Git writes progress chatter and hints alongside the actual failure; the
/// first line carrying a recognized prefix is the one worth surfacing.
pub fn find_error_message(stderr: &str) -> Option<String> {
    for line in stderr.lines() {
        if line.starts_with("fatal: ") || line.starts_with("ERROR fatal: ") {
            return Some(line.trim().to_string());
        }
        if let Some(rest) = line.strip_prefix("error:") {
            return Some(rest.trim().to_string());
        }
    }
    None
}

/// Splits newline-separated command output, dropping the trailing blank.
pub fn split_list(s: &str) -> Vec<String> {
    let trimmed = s.trim();
    if trimmed.is_empty() {
        return Vec::new();
    }
    trimmed.lines().map(|l| l.to_string()).collect()
}

/// Parses `git log --pretty=format:%GK|%H|%s` output into commits.
///
/// `%GK` is empty for unsigned commits, so a line always has three fields
/// even when the first is blank.
pub fn parse_oneline_log(s: &str) -> Vec<Commit> {
    split_list(s)
        .into_iter()
        .filter_map(|line| {
            let mut parts = line.splitn(3, '|');
            let signing_key = parts.next()?.to_string();
            let revision = parts.next()?.to_string();
            let message = parts.next()?.to_string();
            Some(Commit {
                signing_key,
                revision,
                message,
            })
        })
        .collect()
}

/// Parses `git notes list` output (`<note object> <annotated object>` per
/// line) into the set of annotated revisions.
pub fn parse_note_list(s: &str) -> std::collections::HashSet<String> {
    split_list(s)
        .into_iter()
        .filter_map(|line| line.split_whitespace().nth(1).map(|r| r.to_string()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_error_message_fatal() {
        let stderr = "Cloning into 'repo'...\nfatal: repository 'x' does not exist\n";
        assert_eq!(
            find_error_message(stderr),
            Some("fatal: repository 'x' does not exist".to_string())
        );
    }

    #[test]
    fn test_find_error_message_error_prefix() {
        let stderr = "error: failed to push some refs to 'origin'\n";
        assert_eq!(
            find_error_message(stderr),
            Some("failed to push some refs to 'origin'".to_string())
        );
    }

    #[test]
    fn test_find_error_message_none() {
        assert_eq!(find_error_message("Counting objects: 100% (3/3)\n"), None);
        assert_eq!(find_error_message(""), None);
    }

    #[test]
    fn test_split_list_empty() {
        assert!(split_list("").is_empty());
        assert!(split_list("  \n ").is_empty());
    }

    #[test]
    fn test_split_list_lines() {
        assert_eq!(split_list("a\nb\n"), vec!["a", "b"]);
    }

    #[test]
    fn test_parse_oneline_log() {
        let out = "|abc123|first commit\nDEADBEEF|def456|signed: update image\n";
        let commits = parse_oneline_log(out);
        assert_eq!(commits.len(), 2);
        assert_eq!(commits[0].signing_key, "");
        assert_eq!(commits[0].revision, "abc123");
        assert_eq!(commits[0].message, "first commit");
        assert_eq!(commits[1].signing_key, "DEADBEEF");
        assert_eq!(commits[1].message, "signed: update image");
    }

    #[test]
    fn test_parse_oneline_log_message_with_pipes() {
        let commits = parse_oneline_log("|abc|msg | with | pipes");
        assert_eq!(commits[0].message, "msg | with | pipes");
    }

    #[test]
    fn test_parse_note_list() {
        let out = "1111 aaaa\n2222 bbbb\n";
        let revs = parse_note_list(out);
        assert!(revs.contains("aaaa"));
        assert!(revs.contains("bbbb"));
        assert_eq!(revs.len(), 2);
    }
}
