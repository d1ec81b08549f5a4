//! Parsing of routing paths such as `../PreviewMachine` or `./Child/Leaf`.

/// One hop of a routing path.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Segment {
    /// `..`: step to the current node's parent
    Parent,
    /// A machine name, looked up among the current node's children
    Child(String),
}

/// A parsed routing path.
///
/// Paths that begin with `.` are relative to the sending machine. Anything
/// else is absolute: its first segment is a registered name. `.` and empty
/// segments are dropped while parsing.
///
/// ```rust
/// use tomekit::router::{RoutePath, Segment};
///
/// let path = RoutePath::parse("../PreviewMachine");
/// assert!(path.is_relative());
/// assert_eq!(
///     path.segments(),
///     &[Segment::Parent, Segment::Child("PreviewMachine".into())]
/// );
///
/// let path = RoutePath::parse("EditorTome/HealthMachine");
/// assert!(!path.is_relative());
/// assert_eq!(path.segments().len(), 2);
/// ```
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RoutePath {
    relative: bool,
    segments: Vec<Segment>,
}

impl RoutePath {
    pub fn parse(path: &str) -> Self {
        let trimmed = path.trim();
        let segments = trimmed
            .split('/')
            .filter_map(|segment| match segment.trim() {
                "" | "." => None,
                ".." => Some(Segment::Parent),
                name => Some(Segment::Child(name.to_string())),
            })
            .collect();

        Self {
            relative: trimmed.starts_with('.'),
            segments,
        }
    }

    pub fn is_relative(&self) -> bool {
        self.relative
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Whether the path names nothing at all (for example `""` or `"./"`).
    pub fn is_empty(&self) -> bool {
        self.segments.is_empty()
    }
}
