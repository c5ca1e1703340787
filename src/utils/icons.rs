use std::cell::RefCell;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

use super::filesystem;

const ICON_EXTENSIONS: [&str; 3] = ["svg", "png", "xpm"];
const MAX_THEME_DEPTH: usize = 4;

fn icon_roots() -> Vec<PathBuf> {
    let mut roots = vec![PathBuf::from(filesystem::get_local_data_directory()).join("icons")];

    roots.extend(
        filesystem::get_xdg_data_directories()
            .into_iter()
            .map(|dir| PathBuf::from(dir).join("icons"))
    );

    roots.push(PathBuf::from("/usr/share/pixmaps"));
    roots
}

fn find_in(dir: &Path, name: &str, depth: usize) -> bool {
    if ICON_EXTENSIONS.iter().any(|ext| dir.join(format!("{}.{}", name, ext)).is_file()) {
        return true;
    }

    if depth == 0 {
        return false;
    }

    let Ok(entries) = std::fs::read_dir(dir) else {
        return false;
    };

    entries
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().map(|t| t.is_dir()).unwrap_or(false))
        .any(|entry| find_in(&entry.path(), name, depth - 1))
}

/// Remembers lookups by name. Themes are walked at most once per name.
#[derive(Debug, Default)]
pub struct IconCache {
    roots: Vec<PathBuf>,
    found: RefCell<HashMap<String, bool>>,
}

impl IconCache {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        IconCache {
            roots,
            found: RefCell::new(HashMap::new()),
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        if let Some(found) = self.found.borrow().get(name) {
            return *found;
        }

        let found = icon_exists_in(&self.roots, name);
        self.found.borrow_mut().insert(name.to_owned(), found);
        found
    }
}

thread_local! {
    static ICON_CACHE: IconCache = IconCache::new(icon_roots());
}

/// Best-effort check that `name` resolves to an icon in one of the installed themes.
pub fn icon_exists(name: &str) -> bool {
    ICON_CACHE.with(|cache| cache.contains(name))
}

pub fn icon_exists_in(roots: &[PathBuf], name: &str) -> bool {
    // Paths are handled by the image preview, not the icon lookup
    if name.is_empty() || name.contains('/') {
        return false;
    }

    roots.iter().any(|root| find_in(root, name, MAX_THEME_DEPTH))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finds_icons_nested_in_theme_directories() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("hicolor/48x48/apps");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("firefox.png"), b"").unwrap();

        let roots = vec![root.path().to_path_buf()];
        assert!(icon_exists_in(&roots, "firefox"));
        assert!(!icon_exists_in(&roots, "thunderbird"));
    }

    #[test]
    fn cache_walks_the_themes_once_per_name() {
        let root = tempfile::tempdir().unwrap();
        let nested = root.path().join("hicolor/scalable/apps");
        std::fs::create_dir_all(&nested).unwrap();
        std::fs::write(nested.join("firefox.svg"), b"").unwrap();

        let cache = IconCache::new(vec![root.path().to_path_buf()]);
        assert!(cache.contains("firefox"));
        assert!(!cache.contains("org.gnome.Builder"));

        // Later changes on disk are not picked up again
        std::fs::remove_file(nested.join("firefox.svg")).unwrap();
        std::fs::write(nested.join("org.gnome.Builder.svg"), b"").unwrap();

        assert!(cache.contains("firefox"));
        assert!(!cache.contains("org.gnome.Builder"));
    }

    #[test]
    fn paths_and_empty_names_are_not_icons() {
        let root = tempfile::tempdir().unwrap();
        let roots = vec![root.path().to_path_buf()];

        assert!(!icon_exists_in(&roots, ""));
        assert!(!icon_exists_in(&roots, "/usr/share/pixmaps/firefox.png"));
    }
}
