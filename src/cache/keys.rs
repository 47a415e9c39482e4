//! Page cache keys.

/// Identifies one rendered page: route plus the viewer it was rendered for.
///
/// Pages carry the viewer's name in the navigation bar, so anonymous and
/// signed-in renders of the same route are stored separately.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PageKey {
    pub path: String,
    pub query: String,
    pub viewer: Option<String>,
}

impl PageKey {
    pub fn new(path: &str, query: Option<&str>, viewer: Option<&str>) -> Self {
        Self {
            path: path.to_string(),
            query: query.unwrap_or_default().to_string(),
            viewer: viewer.map(str::to_string),
        }
    }
}
