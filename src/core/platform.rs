//! Host OS family helpers.

pub fn is_windows() -> bool {
    cfg!(target_os = "windows")
}

pub fn is_linux() -> bool {
    cfg!(target_os = "linux")
}

/// Value substituted for the `{{@os@}}` placeholder.
pub fn os_placeholder() -> &'static str {
    if is_windows() {
        "win"
    } else {
        "unix"
    }
}
