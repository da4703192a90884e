//! Home-relative path handling for local files named in configuration.

/// Resolves a `~/` prefix against `HOME`, as a shell would for identity
/// files, cookbook paths and `solo.rb` templates.
///
/// Paths without the prefix, and every path when `HOME` is unset, come back
/// unchanged.
///
/// ```
/// # use solo_bootstrap::channel::expand_tilde;
/// let home = std::env::var("HOME").expect("HOME should be set");
/// assert_eq!(expand_tilde("~/chef/cookbooks"), format!("{home}/chef/cookbooks"));
/// assert_eq!(expand_tilde("site-cookbooks"), "site-cookbooks");
/// ```
#[must_use]
pub fn expand_tilde(path: &str) -> String {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(relative), Some(home)) => format!("{}/{relative}", home.to_string_lossy()),
        _ => path.to_owned(),
    }
}
