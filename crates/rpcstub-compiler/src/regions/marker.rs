//! Region keys and marker line syntax.

use std::fmt;

/// Identity of a preserved region.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum RegionKey {
    /// File-level header (imports and module globals).
    Header,
    /// Class-level declarations.
    ClassHeader,
    Constructor,
    /// Body of the built-in status accessor.
    Status,
    /// Body of a remote function, keyed by its declared name.
    Function(String),
}

impl RegionKey {
    /// Regions every prior artifact must contain.
    pub const REQUIRED: [RegionKey; 3] = [RegionKey::Header, RegionKey::ClassHeader, RegionKey::Constructor];

    fn keyword(&self) -> &str {
        match self {
            RegionKey::Header => "HEADER",
            RegionKey::ClassHeader => "CLASS_HEADER",
            RegionKey::Constructor => "CONSTRUCTOR",
            RegionKey::Status => "STATUS",
            RegionKey::Function(name) => name,
        }
    }

    fn marker(&self, prefix: &str, edge: &str) -> String {
        match self {
            RegionKey::Function(name) => format!("{}{} {}", prefix, edge, name),
            other => format!("{}{}_{}", prefix, edge, other.keyword()),
        }
    }
}

impl fmt::Display for RegionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RegionKey::Function(name) => write!(f, "function '{}'", name),
            other => write!(f, "{}", other.keyword()),
        }
    }
}

/// A parsed marker line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Marker {
    Begin(RegionKey),
    End(RegionKey),
}

/// Marker syntax for one output ecosystem: its line-comment prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarkerSyntax {
    pub comment_prefix: &'static str,
}

impl MarkerSyntax {
    pub const PYTHON: MarkerSyntax = MarkerSyntax { comment_prefix: "#" };
    pub const TYPESCRIPT: MarkerSyntax = MarkerSyntax { comment_prefix: "//" };

    pub fn begin(&self, key: &RegionKey) -> String {
        key.marker(self.comment_prefix, "BEGIN")
    }

    pub fn end(&self, key: &RegionKey) -> String {
        key.marker(self.comment_prefix, "END")
    }

    /// Recognizes a marker line. Leading and trailing whitespace is ignored;
    /// anything else on the line makes it ordinary content.
    pub fn parse(&self, line: &str) -> Option<Marker> {
        let rest = line.trim().strip_prefix(self.comment_prefix)?;

        if let Some(keyword) = rest.strip_prefix("BEGIN_") {
            return fixed_key(keyword).map(Marker::Begin);
        }
        if let Some(keyword) = rest.strip_prefix("END_") {
            return fixed_key(keyword).map(Marker::End);
        }
        if let Some(name) = rest.strip_prefix("BEGIN ") {
            return function_key(name).map(Marker::Begin);
        }
        if let Some(name) = rest.strip_prefix("END ") {
            return function_key(name).map(Marker::End);
        }
        None
    }
}

fn fixed_key(keyword: &str) -> Option<RegionKey> {
    match keyword {
        "HEADER" => Some(RegionKey::Header),
        "CLASS_HEADER" => Some(RegionKey::ClassHeader),
        "CONSTRUCTOR" => Some(RegionKey::Constructor),
        "STATUS" => Some(RegionKey::Status),
        _ => None,
    }
}

fn function_key(name: &str) -> Option<RegionKey> {
    let valid = !name.is_empty() && name.chars().all(|c| c.is_alphanumeric() || c == '_');
    valid.then(|| RegionKey::Function(name.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_marker_text() {
        let py = MarkerSyntax::PYTHON;
        assert_eq!(py.begin(&RegionKey::Header), "#BEGIN_HEADER");
        assert_eq!(py.end(&RegionKey::ClassHeader), "#END_CLASS_HEADER");
        assert_eq!(py.begin(&RegionKey::Function("add".into())), "#BEGIN add");

        let ts = MarkerSyntax::TYPESCRIPT;
        assert_eq!(ts.end(&RegionKey::Status), "//END_STATUS");
        assert_eq!(ts.end(&RegionKey::Function("add".into())), "//END add");
    }

    #[test]
    fn test_parse_markers() {
        let py = MarkerSyntax::PYTHON;
        assert_eq!(py.parse("        #BEGIN_CONSTRUCTOR"), Some(Marker::Begin(RegionKey::Constructor)));
        assert_eq!(py.parse("#END add  "), Some(Marker::End(RegionKey::Function("add".into()))));
        assert_eq!(py.parse("# BEGIN add"), None);
        assert_eq!(py.parse("#BEGIN add extra"), None);
        assert_eq!(py.parse("#BEGIN_SOMETHING"), None);
        assert_eq!(py.parse("x = 1  #BEGIN_HEADER"), None);
        assert_eq!(py.parse("//BEGIN_HEADER"), None);
    }

    #[test]
    fn test_markers_parse_back() {
        let ts = MarkerSyntax::TYPESCRIPT;
        for key in [
            RegionKey::Header,
            RegionKey::ClassHeader,
            RegionKey::Constructor,
            RegionKey::Status,
            RegionKey::Function("run_job".into()),
        ] {
            assert_eq!(ts.parse(&ts.begin(&key)), Some(Marker::Begin(key.clone())));
            assert_eq!(ts.parse(&ts.end(&key)), Some(Marker::End(key)));
        }
    }
}
