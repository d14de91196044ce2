/// How two resource paths relate to each other
#[derive(Copy, Clone, Hash, PartialEq, Eq, Debug)]
pub enum PathCompare {
  /// Same resource
  Equal,
  /// `lhs` lives below `rhs` (`rhs` followed by `/...` is `lhs`)
  LhsIsSubresource,
  /// `rhs` lives below `lhs`
  RhsIsSubresource,
  /// Unrelated resources
  NotEqual,
}

/// Compare two `/`-delimited resource paths character by character.
///
/// Leading slashes are ignored, so `/sensors` and `sensors` are the same path.
///
/// ```
/// use coapling_msg::{path_cmp, PathCompare};
///
/// assert_eq!(path_cmp("/sensors", "sensors"), PathCompare::Equal);
/// assert_eq!(path_cmp("sensors", "sensors/temp1"), PathCompare::RhsIsSubresource);
/// assert_eq!(path_cmp("sensors/temp1", "sensors"), PathCompare::LhsIsSubresource);
/// assert_eq!(path_cmp("sensors", "sensorsx"), PathCompare::NotEqual);
/// ```
pub fn path_cmp(lhs: &str, rhs: &str) -> PathCompare {
  let lhs = lhs.trim_start_matches('/').as_bytes();
  let rhs = rhs.trim_start_matches('/').as_bytes();

  let mut i = 0;
  loop {
    match (lhs.get(i), rhs.get(i)) {
      | (None, None) => return PathCompare::Equal,
      | (None, Some(b'/')) => return PathCompare::RhsIsSubresource,
      | (Some(b'/'), None) => return PathCompare::LhsIsSubresource,
      | (Some(l), Some(r)) if l == r => i += 1,
      | _ => return PathCompare::NotEqual,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn equal() {
    assert_eq!(path_cmp("", ""), PathCompare::Equal);
    assert_eq!(path_cmp("a/b", "a/b"), PathCompare::Equal);
  }

  #[test]
  fn subresources() {
    assert_eq!(path_cmp("sensors", "sensors/1"), PathCompare::RhsIsSubresource);
    assert_eq!(path_cmp("sensors/1/raw", "sensors"),
               PathCompare::LhsIsSubresource);
  }

  #[test]
  fn prefix_without_separator_is_not_a_subresource() {
    assert_eq!(path_cmp("sensors", "sensors1"), PathCompare::NotEqual);
    assert_eq!(path_cmp("sensors1", "sensors"), PathCompare::NotEqual);
    assert_eq!(path_cmp("other", "sensors"), PathCompare::NotEqual);
  }

  #[test]
  fn root_has_no_subresources() {
    assert_eq!(path_cmp("", "sensors"), PathCompare::NotEqual);
  }
}
