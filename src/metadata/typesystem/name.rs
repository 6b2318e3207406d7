use std::fmt;

/// A type name as typed by a user.
///
/// Accepts reflection syntax (`Namespace.Outer+Inner`, ``List`1``) as well as dotted
/// display syntax (`Namespace.Outer.Inner`). Matching against a declared type compares
/// both forms, with and without generic arity suffixes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FullTypeName {
    raw: String,
}

impl FullTypeName {
    /// Wrap a user-supplied name.
    #[must_use]
    pub fn new(name: &str) -> Self {
        FullTypeName {
            raw: name.trim().to_string(),
        }
    }

    /// The name as supplied.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Whether this name designates the type whose reflection name (nested parts joined
    /// with `+`) is `reflection_name`.
    #[must_use]
    pub fn matches(&self, reflection_name: &str) -> bool {
        let wanted = Self::normalize(&self.raw);
        wanted == Self::normalize(reflection_name)
            || wanted == Self::normalize(&Self::strip_all_arities(reflection_name))
    }

    fn normalize(name: &str) -> String {
        name.replace(['+', '/'], ".")
    }

    fn strip_all_arities(name: &str) -> String {
        name.split('+')
            .map(super::strip_arity)
            .collect::<Vec<_>>()
            .join("+")
    }
}

impl fmt::Display for FullTypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reflection_and_display_syntax() {
        let reflection = "Sample.Outer+Inner";

        assert!(FullTypeName::new("Sample.Outer+Inner").matches(reflection));
        assert!(FullTypeName::new("Sample.Outer.Inner").matches(reflection));
        assert!(FullTypeName::new(" Sample.Outer/Inner ").matches(reflection));
        assert!(!FullTypeName::new("Sample.Inner").matches(reflection));
    }

    #[test]
    fn generic_arity() {
        let reflection = "Sample.Box`1+Slot`2";

        assert!(FullTypeName::new("Sample.Box`1+Slot`2").matches(reflection));
        assert!(FullTypeName::new("Sample.Box.Slot").matches(reflection));
        assert!(!FullTypeName::new("Sample.Box`2.Slot").matches(reflection));
    }
}
