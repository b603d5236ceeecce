//! Fast URL slicing utilities for the event hot path
//!
//! These functions avoid allocations and work directly on string slices.
//! Anything that needs decoding or joining goes through the `url` crate in
//! the classifier instead.

// =============================================================================
// Scheme Extraction
// =============================================================================

/// Scheme name without the trailing ':' (e.g. `https`, `chrome-extension`).
/// Returns None if the string does not start with a valid scheme.
#[inline]
pub fn extract_scheme(url: &str) -> Option<&str> {
    let colon_pos = url.find(':')?;
    let scheme = &url[..colon_pos];
    let mut bytes = scheme.bytes();

    match bytes.next() {
        Some(b) if b.is_ascii_alphabetic() => {}
        _ => return None,
    }
    if bytes.all(|b| b.is_ascii_alphanumeric() || matches!(b, b'+' | b'-' | b'.')) {
        Some(scheme)
    } else {
        None
    }
}

/// Get the position after "://".
#[inline]
pub fn get_scheme_end(url: &str) -> Option<usize> {
    let colon_pos = extract_scheme(url)?.len();
    let bytes = url.as_bytes();

    if bytes.len() > colon_pos + 2 && bytes[colon_pos + 1] == b'/' && bytes[colon_pos + 2] == b'/' {
        return Some(colon_pos + 3);
    }

    None
}

// =============================================================================
// Host Extraction
// =============================================================================

/// Get the start and end positions of the hostname in a URL.
#[inline]
pub fn get_host_position(url: &str) -> Option<(usize, usize)> {
    let scheme_end = get_scheme_end(url)?;
    let bytes = url.as_bytes();

    // Authority ends at the first '/', '?' or '#'
    let authority_end = bytes[scheme_end..]
        .iter()
        .position(|&b| matches!(b, b'/' | b'?' | b'#'))
        .map_or(bytes.len(), |i| scheme_end + i);

    // Skip userinfo
    let host_start = bytes[scheme_end..authority_end]
        .iter()
        .rposition(|&b| b == b'@')
        .map_or(scheme_end, |i| scheme_end + i + 1);

    let host_end = bytes[host_start..authority_end]
        .iter()
        .position(|&b| b == b':')
        .map_or(authority_end, |i| host_start + i);

    Some((host_start, host_end))
}

/// Fast host extraction without allocations.
/// Returns a slice into the original URL.
#[inline]
pub fn extract_host(url: &str) -> Option<&str> {
    let (host_start, host_end) = get_host_position(url)?;
    if host_start == host_end {
        return None;
    }
    Some(&url[host_start..host_end])
}

/// Check the URL's host against a list of lower-case hosts.
#[inline]
pub fn host_in(url: &str, hosts: &[String]) -> bool {
    match extract_host(url) {
        Some(host) => hosts.iter().any(|h| h.eq_ignore_ascii_case(host)),
        None => false,
    }
}

// =============================================================================
// Path Extraction
// =============================================================================

/// Extract the path portion of a URL.
#[inline]
pub fn extract_path(url: &str) -> &str {
    let scheme_end = match get_scheme_end(url) {
        Some(pos) => pos,
        None => return "/",
    };

    let bytes = url.as_bytes();

    // Find path start (first '/' after host)
    let mut path_start = None;
    for (i, &b) in bytes[scheme_end..].iter().enumerate() {
        if b == b'/' {
            path_start = Some(scheme_end + i);
            break;
        }
        if b == b'?' || b == b'#' {
            return "/";
        }
    }

    let path_start = match path_start {
        Some(pos) => pos,
        None => return "/",
    };

    // Find path end
    let path_end = bytes[path_start..]
        .iter()
        .position(|&b| b == b'?' || b == b'#')
        .map_or(bytes.len(), |i| path_start + i);

    &url[path_start..path_end]
}

/// Check whether a path's last segment ends in `.<ext>` (ASCII case-insensitive).
#[inline]
pub fn path_has_extension(path: &str, ext: &str) -> bool {
    let bytes = path.as_bytes();
    let ext = ext.as_bytes();
    if ext.is_empty() || bytes.len() < ext.len() + 1 {
        return false;
    }

    let dot = bytes.len() - ext.len() - 1;
    bytes[dot] == b'.' && bytes[dot + 1..].eq_ignore_ascii_case(ext)
}
