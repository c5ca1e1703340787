use std::path::Path;

pub fn get_home_directory() -> String {
    std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_owned())
}

pub fn get_config_directory() -> String {
    match std::env::var("XDG_CONFIG_HOME") {
        Ok(dir) if !dir.is_empty() => format!("{}/hlybar", dir),
        _ => format!("{}/.config/hlybar", get_home_directory()),
    }
}

pub fn get_local_data_directory() -> String {
    match std::env::var("XDG_DATA_HOME") {
        Ok(dir) if !dir.is_empty() => dir,
        _ => format!("{}/.local/share", get_home_directory()),
    }
}

pub fn get_xdg_runtime_directory() -> String {
    std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| {
        format!("{}/.local/run", get_home_directory())
    })
}

/// Data directories from `$XDG_DATA_DIRS`, falling back to the usual system paths.
pub fn get_xdg_data_directories() -> Vec<String> {
    match std::env::var("XDG_DATA_DIRS") {
        Ok(dirs) if !dirs.is_empty() => dirs
            .split(':')
            .filter(|dir| !dir.is_empty())
            .map(str::to_owned)
            .collect(),

        _ => vec!["/usr/local/share".to_owned(), "/usr/share".to_owned()],
    }
}

/// Whether `path` points at something on disk. Accepts `file://` URIs.
pub fn file_exists(path: &str) -> bool {
    let path = path.strip_prefix("file://").unwrap_or(path);
    !path.is_empty() && Path::new(path).exists()
}
