//! Placeholder names.
//!
//! While a document is written, every distinct content is replaced by a
//! placeholder naming its archive entry: `"{index}"` for single content,
//! `"{index}/{sub_path}"` for the principal member of a multi-part group.

use std::fmt;

use crate::error::{CoreError, Result};

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Placeholder {
    pub index: usize,
    pub sub_path: Option<String>,
}

impl Placeholder {
    pub fn single(index: usize) -> Self {
        Self { index, sub_path: None }
    }

    pub fn member(index: usize, sub_path: impl Into<String>) -> Self {
        Self {
            index,
            sub_path: Some(sub_path.into()),
        }
    }

    /// The archive entry this placeholder stands for.
    pub fn entry_name(&self) -> String {
        self.to_string()
    }

    /// Directory prefix shared by every member of this placeholder's group.
    pub fn group_prefix(&self) -> String {
        format!("{}/", self.index)
    }

    pub fn parse(s: &str) -> Result<Self> {
        let (index, sub_path) = match s.split_once('/') {
            Some((index, rest)) => (index, Some(rest)),
            None => (s, None),
        };
        let index = index
            .parse::<usize>()
            .map_err(|_| CoreError::MalformedPlaceholder(s.to_string()))?;
        match sub_path {
            Some(rest) if rest.is_empty() => Err(CoreError::MalformedPlaceholder(s.to_string())),
            Some(rest) => Ok(Self::member(index, rest)),
            None => Ok(Self::single(index)),
        }
    }
}

impl fmt::Display for Placeholder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.sub_path {
            Some(sub_path) => write!(f, "{}/{}", self.index, sub_path),
            None => write!(f, "{}", self.index),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_entry_names() {
        assert_eq!(Placeholder::single(4).entry_name(), "4");
        assert_eq!(Placeholder::member(2, "textures/wood.png").entry_name(), "2/textures/wood.png");
        assert_eq!(Placeholder::member(2, "a.obj").group_prefix(), "2/");
    }

    #[test]
    fn test_parse() {
        assert_eq!(Placeholder::parse("7").unwrap(), Placeholder::single(7));
        assert_eq!(
            Placeholder::parse("1/sub/dir/model.obj").unwrap(),
            Placeholder::member(1, "sub/dir/model.obj")
        );
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(Placeholder::parse("").is_err());
        assert!(Placeholder::parse("x/model.obj").is_err());
        assert!(Placeholder::parse("3/").is_err());
        assert!(Placeholder::parse("-1").is_err());
    }
}
