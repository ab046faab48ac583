use thiserror::Error;

use crate::types::CloneRequest;

/// A clone request rejected before any workflow was started.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} cannot be empty")]
    Empty { field: &'static str },
    #[error("{field} cannot start with '-'")]
    LeadingDash { field: &'static str },
    #[error("{field} cannot contain whitespace or control characters")]
    ControlChars { field: &'static str },
    #[error("ref cannot contain '..'")]
    DotDot,
    #[error("repoUrl must be a URL (scheme://...) or user@host:path")]
    NotUrlLike,
}

impl CloneRequest {
    /// Check the request the way git would need it: no option injection,
    /// nothing that can escape a refspec, a URL-like remote.
    pub fn validate(&self) -> Result<(), ValidationError> {
        validate_ref(&self.git_ref)?;
        validate_repo_url(&self.repo_url)
    }
}

fn common_checks(value: &str, field: &'static str) -> Result<(), ValidationError> {
    if value.is_empty() {
        return Err(ValidationError::Empty { field });
    }
    if value.starts_with('-') {
        return Err(ValidationError::LeadingDash { field });
    }
    if value.chars().any(|c| c.is_control() || c.is_whitespace()) {
        return Err(ValidationError::ControlChars { field });
    }
    Ok(())
}

fn validate_ref(git_ref: &str) -> Result<(), ValidationError> {
    common_checks(git_ref, "ref")?;
    if git_ref.contains("..") {
        return Err(ValidationError::DotDot);
    }
    Ok(())
}

fn validate_repo_url(url: &str) -> Result<(), ValidationError> {
    common_checks(url, "repoUrl")?;
    if let Some((scheme, rest)) = url.split_once("://") {
        let scheme_ok = scheme
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic())
            && scheme
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if scheme_ok && !rest.is_empty() {
            return Ok(());
        }
        return Err(ValidationError::NotUrlLike);
    }
    // scp-like: user@host:path
    if let Some((user_host, path)) = url.split_once(':') {
        if let Some((user, host)) = user_host.split_once('@') {
            if !user.is_empty() && !host.is_empty() && !path.is_empty() && !host.contains('/') {
                return Ok(());
            }
        }
    }
    Err(ValidationError::NotUrlLike)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn req(url: &str, r: &str) -> CloneRequest {
        CloneRequest::new(url, r)
    }

    #[test]
    fn accepts_common_remotes() {
        for url in [
            "https://github.com/octocat/Hello-World.git",
            "http://localhost:8080/repo",
            "ssh://git@example.com/org/repo.git",
            "git@github.com:org/repo.git",
            "file:///tmp/repo.git",
        ] {
            assert!(req(url, "main").validate().is_ok(), "{url}");
        }
    }

    #[test]
    fn accepts_branch_tag_and_sha_refs() {
        for r in ["main", "feature/x", "v1.2.3", "refs/heads/main", "7fd1a60b01f91b314f59955a4e4d4e80d8edf11d"] {
            assert!(req("https://example/repo.git", r).validate().is_ok(), "{r}");
        }
    }

    #[test]
    fn rejects_empty_ref() {
        assert_eq!(
            req("https://example/repo.git", "").validate(),
            Err(ValidationError::Empty { field: "ref" })
        );
    }

    #[test]
    fn rejects_option_injection() {
        assert!(matches!(
            req("https://example/repo.git", "--upload-pack=evil").validate(),
            Err(ValidationError::LeadingDash { field: "ref" })
        ));
        assert!(matches!(
            req("--upload-pack=evil", "main").validate(),
            Err(ValidationError::LeadingDash { field: "repoUrl" })
        ));
    }

    #[test]
    fn rejects_dotdot_and_control_chars() {
        assert_eq!(
            req("https://example/repo.git", "a..b").validate(),
            Err(ValidationError::DotDot)
        );
        assert!(req("https://example/repo.git", "ma in").validate().is_err());
        assert!(req("https://example/repo.git", "main\n").validate().is_err());
    }

    #[test]
    fn rejects_plain_paths() {
        assert_eq!(
            req("/tmp/repo", "main").validate(),
            Err(ValidationError::NotUrlLike)
        );
        assert_eq!(
            req("not a url", "main").validate(),
            Err(ValidationError::ControlChars { field: "repoUrl" })
        );
        assert_eq!(
            req("://nohost", "main").validate(),
            Err(ValidationError::NotUrlLike)
        );
    }
}
