use std::path::{Component, Path, PathBuf};

#[derive(Debug, Clone, Default, PartialOrd, Ord, Hash)]
/// A path inside a volume. Unlike a host path, it is always normalized, relative to the volume
/// root and valid Unicode. The root itself is the empty path.
pub struct VirtualPath(String);

impl VirtualPath {
    /// The root directory of a volume.
    pub fn root() -> Self {
        VirtualPath(String::new())
    }

    /// Resolve `path` against this directory; absolute paths start from the root instead.
    pub fn resolve<T: AsRef<Path>>(&self, path: T) -> Self {
        let path = path.as_ref();
        if path.has_root() {
            VirtualPath::from(path)
        } else {
            let mut joined = PathBuf::from(&self.0);
            joined.push(path);
            VirtualPath::from(joined)
        }
    }

    /// The containing directory, or `None` for the root.
    pub fn parent(&self) -> Option<VirtualPath> {
        if self.is_root() {
            return None;
        }
        Some(match self.0.rfind('/') {
            Some(index) => VirtualPath(self.0[..index].to_string()),
            None => VirtualPath::root(),
        })
    }

    /// The normalized path without leading separator.
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    /// Checks whether this is the root directory.
    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl<T> From<T> for VirtualPath
where
    T: AsRef<Path>,
{
    fn from(path: T) -> Self {
        let mut parts: Vec<&str> = Vec::new();
        for component in path.as_ref().components() {
            match component {
                Component::Normal(raw_path) => {
                    // Components which are not valid Unicode are dropped.
                    if let Some(value) = raw_path.to_str() {
                        parts.push(value);
                    }
                }
                Component::ParentDir => {
                    parts.pop();
                }
                Component::CurDir | Component::RootDir | Component::Prefix(_) => {}
            }
        }
        VirtualPath(parts.join("/"))
    }
}

impl AsRef<str> for VirtualPath {
    fn as_ref(&self) -> &str {
        self.0.as_str()
    }
}

impl<T> PartialEq<T> for VirtualPath
where
    T: AsRef<str>,
{
    fn eq(&self, other: &T) -> bool {
        self.0.as_str() == other.as_ref()
    }
}

impl Eq for VirtualPath {}

#[cfg(test)]
mod tests {
    use test_case::test_case;

    use super::VirtualPath;

    #[test_case("/", ""; "root")]
    #[test_case(".", ""; "current")]
    #[test_case("..", ""; "parent of root")]
    #[test_case("/42/PI/", "42/PI"; "trailing slash")]
    #[test_case("/42/./PI", "42/PI"; "current inside")]
    #[test_case("42/43/../PI/", "42/PI"; "parent inside")]
    fn test_normalization(raw: &str, expected: &str) {
        assert_eq!(VirtualPath::from(raw), expected);
    }

    #[test_case("", "file", "file"; "relative to root")]
    #[test_case("dir", "file", "dir/file"; "relative to directory")]
    #[test_case("dir", "/file", "file"; "absolute")]
    #[test_case("dir/sub", "../file", "dir/file"; "upwards")]
    fn test_resolve(cwd: &str, path: &str, expected: &str) {
        assert_eq!(VirtualPath::from(cwd).resolve(path), expected);
    }

    #[test]
    fn test_parent() {
        assert_eq!(VirtualPath::root().parent(), None);
        assert_eq!(VirtualPath::from("file").parent(), Some(VirtualPath::root()));
        assert_eq!(
            VirtualPath::from("dir/sub/file").parent(),
            Some(VirtualPath::from("dir/sub"))
        );
    }
}
