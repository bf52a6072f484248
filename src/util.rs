use std::path::Path;

/// Returns the OS identifier used in manifests (`linux`, `darwin`, `windows`, ...).
pub fn current_os() -> &'static str {
    os_id(std::env::consts::OS)
}

/// Returns the architecture identifier used in manifests (`amd64`, `arm64`, ...).
pub fn current_arch() -> &'static str {
    arch_id(std::env::consts::ARCH)
}

/// Maps a Rust target OS name onto the identifier manifests use.
pub fn os_id(os: &'static str) -> &'static str {
    match os {
        "macos" => "darwin",
        other => other,
    }
}

/// Maps a Rust target architecture onto the identifier manifests use.
pub fn arch_id(arch: &'static str) -> &'static str {
    match arch {
        "x86_64" => "amd64",
        "x86" => "386",
        "aarch64" => "arm64",
        "powerpc64" => "ppc64",
        "loongarch64" => "loong64",
        other => other,
    }
}

/// Composite `os_arch` key for per-platform manifest data.
pub fn os_arch_key(os: &str, arch: &str) -> String {
    format!("{os}_{arch}")
}

/// Whether executables on this OS need an `.exe` suffix.
pub fn is_windows(os: &str) -> bool {
    os == "windows"
}

/// Last non-empty segment of a URL's path, or `download` when the path has
/// none. The host never counts as a file name.
pub fn url_file_name(url: &str) -> String {
    reqwest::Url::parse(url)
        .ok()
        .and_then(|url| {
            url.path_segments()?
                .rev()
                .find(|segment| !segment.is_empty())
                .map(str::to_string)
        })
        .unwrap_or_else(|| "download".to_string())
}

/// File name of a path as an owned string, empty if it has none.
pub fn file_name_string(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
