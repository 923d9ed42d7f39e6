/// Host tag used when the local host name cannot be determined.
pub const FALLBACK_HOSTNAME: &str = "localhost";

/// Determine the host identifier attached to every event.
///
/// A non-blank `explicit` value wins. Otherwise the local host name is
/// looked up; any failure yields [`FALLBACK_HOSTNAME`] so that tagging
/// never gets in the way of logging.
pub fn resolve(explicit: &str) -> String {
    let explicit = explicit.trim();
    if !explicit.is_empty() {
        return explicit.to_string();
    }
    local().unwrap_or_else(|| FALLBACK_HOSTNAME.to_string())
}

fn local() -> Option<String> {
    // `hostname::get()` hands back an `OsString`; a name that is not valid
    // unicode is as good as no name here.
    ::hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
}
