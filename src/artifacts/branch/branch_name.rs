use crate::artifacts::branch::{HEAD_REF_NAME, INVALID_BRANCH_NAME_REGEX, REF_PREFIX};
use crate::artifacts::core::repository_error::RepositoryError;
use anyhow::Context;
use std::path::PathBuf;

/// A validated branch name, e.g. `main` or `feature/login`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BranchName(String);

impl BranchName {
    pub fn try_parse(name: String) -> anyhow::Result<Self> {
        if name.is_empty() || name == HEAD_REF_NAME {
            return Err(RepositoryError::InvalidRefName(name).into());
        }

        let re = regex::Regex::new(INVALID_BRANCH_NAME_REGEX)
            .with_context(|| format!("invalid branch name regex: {INVALID_BRANCH_NAME_REGEX}"))?;

        if re.is_match(&name) {
            Err(RepositoryError::InvalidRefName(name).into())
        } else {
            Ok(Self(name))
        }
    }

    /// Parse the target of a symbolic ref such as `refs/heads/main`
    pub fn try_parse_ref_path(ref_path: &str) -> anyhow::Result<Self> {
        let name = ref_path
            .strip_prefix(REF_PREFIX)
            .with_context(|| format!("symbolic ref '{ref_path}' is outside {REF_PREFIX}"))?;

        Self::try_parse(name.to_string())
    }

    /// e.g. `refs/heads/main`
    pub fn to_ref_path(&self) -> String {
        format!("{REF_PREFIX}{}", self.0)
    }

    /// Path of the ref file relative to the repository directory
    pub fn to_path(&self) -> PathBuf {
        PathBuf::from(REF_PREFIX).join(&self.0)
    }
}

impl AsRef<str> for BranchName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BranchName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::proptest;
    use rstest::rstest;

    proptest! {
        #[test]
        fn accepts_plain_names(branch_name in "[a-zA-Z0-9_-]+") {
            proptest::prop_assume!(branch_name != "HEAD");
            assert!(BranchName::try_parse(branch_name).is_ok());
        }

        #[test]
        fn accepts_hierarchical_names(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            let branch_name = format!("{prefix}/{suffix}");
            assert!(BranchName::try_parse(branch_name).is_ok());
        }

        #[test]
        fn rejects_leading_dot(suffix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!(".{suffix}")).is_err());
        }

        #[test]
        fn rejects_lock_suffix(prefix in "[a-zA-Z0-9_-]+") {
            assert!(BranchName::try_parse(format!("{prefix}.lock")).is_err());
        }

        #[test]
        fn rejects_consecutive_dots(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+"
        ) {
            assert!(BranchName::try_parse(format!("{prefix}..{suffix}")).is_err());
        }

        #[test]
        fn rejects_special_chars(
            prefix in "[a-zA-Z0-9_-]+",
            suffix in "[a-zA-Z0-9_-]+",
            special_char in r"[\*:\?\[\\^~ ]"
        ) {
            let branch_name = format!("{prefix}{special_char}{suffix}");
            assert!(BranchName::try_parse(branch_name).is_err());
        }
    }

    #[rstest]
    #[case("")]
    #[case("HEAD")]
    #[case("/leading")]
    #[case("trailing/")]
    #[case("a/.hidden")]
    #[case("at@{brace}")]
    fn invalid_names_are_typed_errors(#[case] name: &str) {
        let err = BranchName::try_parse(name.to_string()).unwrap_err();

        assert!(matches!(
            err.downcast_ref::<RepositoryError>(),
            Some(RepositoryError::InvalidRefName(_))
        ));
    }

    #[test]
    fn ref_path_round_trips() {
        let name = BranchName::try_parse("feature/login".into()).unwrap();

        assert_eq!(name.to_ref_path(), "refs/heads/feature/login");
        assert_eq!(BranchName::try_parse_ref_path(&name.to_ref_path()).unwrap(), name);
        assert!(BranchName::try_parse_ref_path("refs/tags/v1").is_err());
    }
}
