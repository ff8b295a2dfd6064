//! Native-to-POSIX path rewriting for tools that run inside the MSYS shell layer.

use std::path::Path;

/// Rewrites a native path into the form the POSIX-like shell expects.
///
/// A leading drive prefix (`X:\`, any ASCII letter) becomes `/x/` with the
/// letter lower-cased, and every remaining backslash becomes a forward slash.
/// Input without a drive prefix only gets the slash conversion.
///
/// ```
/// use srcstrap::paths::to_posix_style;
///
/// assert_eq!(to_posix_style(r"C:\Code"), "/c/Code");
/// assert_eq!(to_posix_style(r"Users\granger"), "Users/granger");
/// ```
pub fn to_posix_style(native: &str) -> String {
    let bytes = native.as_bytes();
    let (prefix, rest) = if bytes.len() >= 3
        && bytes[0].is_ascii_alphabetic()
        && bytes[1] == b':'
        && bytes[2] == b'\\'
    {
        let drive = (bytes[0] as char).to_ascii_lowercase();
        (format!("/{drive}/"), &native[3..])
    } else {
        (String::new(), native)
    };

    prefix + &rest.replace('\\', "/")
}

/// [`to_posix_style`] for a [`Path`].
pub fn posix_path(path: &Path) -> String {
    to_posix_style(&path.to_string_lossy())
}
