//! POSIX shell quoting for commands assembled on the host and run in the guest.

use std::borrow::Cow;

use shell_escape::unix::escape;

/// Quotes `s` so a POSIX shell reads it back as exactly one word.
///
/// The empty string becomes `''`, so an omitted argument still occupies its
/// position on the command line.
#[must_use]
pub fn quote(s: &str) -> String {
    escape(Cow::Borrowed(s)).into_owned()
}

/// Runs `command` through a login shell of `user`.
#[must_use]
pub fn as_user(user: &str, command: &str) -> String {
    format!("su - {} -c {}", quote(user), quote(command))
}

/// Runs `command` through `sudo -i` as `user` with extra environment.
#[must_use]
pub fn sudo_login(user: &str, env: &[(&str, &str)], command: &str) -> String {
    let mut line = format!("sudo -u {} -i", quote(user));
    for (key, value) in env {
        line.push(' ');
        line.push_str(key);
        line.push('=');
        line.push_str(&quote(value));
    }
    line.push(' ');
    line.push_str(command);
    line
}
