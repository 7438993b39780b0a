use std::fmt;

/// A URI reference as carried by envelopes.
///
/// Node URIs arrive either absolute (`warp://host:9001/node`) or relative to
/// the connection they travel over (`/node`), so this type does not insist on
/// a scheme. Resolution against a base lives with the host.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct Uri(String);

impl Uri {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the scheme if this reference is absolute.
    pub fn scheme(&self) -> Option<&str> {
        let end = self.0.find(':')?;
        let scheme = &self.0[..end];
        let mut chars = scheme.chars();
        match chars.next() {
            Some(first) if first.is_ascii_alphabetic() => {}
            _ => return None,
        }
        if chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
            Some(scheme)
        } else {
            None
        }
    }

    /// Whether this reference names a host of its own, either as an absolute
    /// URI or as a network-path reference (`//host/path`).
    pub fn has_authority(&self) -> bool {
        self.hier_part().starts_with("//")
    }

    /// Returns the authority component (`host:port`), if present.
    pub fn authority(&self) -> Option<&str> {
        let rest = self.hier_part().strip_prefix("//")?;
        let end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
        Some(&rest[..end])
    }

    /// Returns everything after the authority: path, query and fragment.
    pub fn path_and_query(&self) -> &str {
        let hier = self.hier_part();
        match hier.strip_prefix("//") {
            Some(rest) => {
                let start = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
                &rest[start..]
            }
            None => hier,
        }
    }

    fn hier_part(&self) -> &str {
        match self.scheme() {
            Some(scheme) => &self.0[scheme.len() + 1..],
            None => &self.0,
        }
    }
}

impl fmt::Display for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Uri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uri({:?})", self.0)
    }
}

impl From<&str> for Uri {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for Uri {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl AsRef<str> for Uri {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
