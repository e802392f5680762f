// Authentication for the download tool: a closed menu that resolves to
// exactly one `AuthSpec`, and the mapping from that spec to tool flags.
// Every failure in here is reported to the operator and turned into
// `AuthSpec::None`; nothing propagates to the caller.

use crate::config::Settings;
use crate::error::CredentialError;
use crate::prompt::Prompt;
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// How the tool should authenticate for one invocation.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum AuthSpec {
    #[default]
    None,
    UsernamePassword {
        username: String,
        password: String,
    },
    /// Credentials read (and validated) from a file at resolution time.
    CredentialFile {
        path: PathBuf,
        username: String,
        password: String,
    },
    CookieFile(PathBuf),
    BrowserCookies(String),
}

// Hand-written so passwords never end up in logs.
impl fmt::Debug for AuthSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuthSpec::None => f.write_str("None"),
            AuthSpec::UsernamePassword { username, .. } => f
                .debug_struct("UsernamePassword")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            AuthSpec::CredentialFile { path, username, .. } => f
                .debug_struct("CredentialFile")
                .field("path", path)
                .field("username", username)
                .field("password", &"***")
                .finish(),
            AuthSpec::CookieFile(path) => f.debug_tuple("CookieFile").field(path).finish(),
            AuthSpec::BrowserCookies(browser) => {
                f.debug_tuple("BrowserCookies").field(browser).finish()
            }
        }
    }
}

impl AuthSpec {
    /// Tool flags for this method; empty for `None`.
    pub fn to_args(&self) -> Vec<String> {
        match self {
            AuthSpec::None => Vec::new(),
            AuthSpec::UsernamePassword { username, password }
            | AuthSpec::CredentialFile {
                username, password, ..
            } => vec![
                "--username".into(),
                username.clone(),
                "--password".into(),
                password.clone(),
            ],
            AuthSpec::CookieFile(path) => {
                vec!["--cookies".into(), path.to_string_lossy().into_owned()]
            }
            AuthSpec::BrowserCookies(browser) => {
                vec!["--cookies-from-browser".into(), browser.clone()]
            }
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, AuthSpec::None)
    }

    /// Short label for status messages.
    pub fn describe(&self) -> String {
        match self {
            AuthSpec::None => "no authentication".into(),
            AuthSpec::UsernamePassword { username, .. } => format!("user {}", username),
            AuthSpec::CredentialFile { path, username, .. } => {
                format!("user {} (from {})", username, path.display())
            }
            AuthSpec::CookieFile(path) => format!("cookie file {}", path.display()),
            AuthSpec::BrowserCookies(browser) => format!("cookies from {}", browser),
        }
    }
}

/// Read a credentials file: first non-blank line is the username, second is
/// the password, anything after is ignored.
pub fn read_credentials_file(path: &Path) -> Result<(String, String), CredentialError> {
    let raw = fs::read_to_string(path).map_err(|source| match source.kind() {
        io::ErrorKind::NotFound => CredentialError::PathNotFound(path.to_path_buf()),
        _ => CredentialError::Read {
            path: path.to_path_buf(),
            source,
        },
    })?;

    let mut lines = raw.lines().map(str::trim).filter(|l| !l.is_empty());
    match (lines.next(), lines.next()) {
        (Some(username), Some(password)) => Ok((username.to_string(), password.to_string())),
        (first, _) => Err(CredentialError::MalformedCredentialFile {
            path: path.to_path_buf(),
            found: usize::from(first.is_some()),
        }),
    }
}

/// Files in `dir` whose extension matches one of `extensions`
/// (case-insensitive), sorted by name. A missing directory yields an empty list.
pub fn list_cookie_files(dir: &Path, extensions: &[String]) -> io::Result<Vec<PathBuf>> {
    let entries = match fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e),
    };

    let mut files = Vec::new();
    for entry in entries {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        let recognised = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| extensions.iter().any(|want| want.eq_ignore_ascii_case(ext)))
            .unwrap_or(false);
        if recognised {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

/// Interactive resolver for one download invocation.
pub struct CredentialResolver<'a> {
    cookie_dir: &'a Path,
    cookie_extensions: &'a [String],
}

impl<'a> CredentialResolver<'a> {
    pub fn new(settings: &'a Settings) -> Self {
        CredentialResolver {
            cookie_dir: &settings.cookie_dir,
            cookie_extensions: &settings.cookie_extensions,
        }
    }

    /// Show the authentication menu and return the chosen method. Any prompt
    /// failure or cancel yields `AuthSpec::None`.
    pub fn resolve(&self, prompt: &mut dyn Prompt) -> AuthSpec {
        let auth = match self.resolve_inner(prompt) {
            Ok(auth) => auth,
            Err(e) => {
                debug!("authentication prompt cancelled: {}", e);
                AuthSpec::None
            }
        };
        info!(?auth, "resolved authentication");
        auth
    }

    fn resolve_inner(&self, prompt: &mut dyn Prompt) -> io::Result<AuthSpec> {
        prompt.say("\nAuthentication Options:");
        prompt.say("1. Skip authentication");
        prompt.say("2. Enter username and password");
        prompt.say("3. Use credentials from a text file");
        prompt.say("4. Use a cookie file");
        prompt.say("5. Use cookies from a browser");

        let choice = loop {
            let input = prompt.line("Choose an option (1-5)")?;
            match input.trim() {
                c @ ("1" | "2" | "3" | "4" | "5") => break c.to_string(),
                _ => prompt.warn("Invalid choice. Please enter a number between 1 and 5."),
            }
        };

        match choice.as_str() {
            "2" => self.manual_entry(prompt),
            "3" => self.credentials_file(prompt),
            "4" => self.cookie_file(prompt),
            "5" => self.browser_cookies(prompt),
            _ => Ok(AuthSpec::None),
        }
    }

    fn manual_entry(&self, prompt: &mut dyn Prompt) -> io::Result<AuthSpec> {
        let username = prompt.line("Enter username")?.trim().to_string();
        let password = prompt.secret("Enter password")?;
        Ok(AuthSpec::UsernamePassword { username, password })
    }

    fn credentials_file(&self, prompt: &mut dyn Prompt) -> io::Result<AuthSpec> {
        loop {
            let input = prompt.line("Path to the credentials file (blank to cancel)")?;
            let input = input.trim();
            if input.is_empty() {
                return Ok(AuthSpec::None);
            }

            let path = PathBuf::from(input);
            match read_credentials_file(&path) {
                Ok((username, password)) => {
                    return Ok(AuthSpec::CredentialFile {
                        path,
                        username,
                        password,
                    })
                }
                Err(e) => {
                    warn!("credentials file rejected: {}", e);
                    prompt.warn(&format!("{}", e));
                    if !prompt.confirm("Try another file?", true)? {
                        prompt.say("Skipping authentication.");
                        return Ok(AuthSpec::None);
                    }
                }
            }
        }
    }

    fn cookie_file(&self, prompt: &mut dyn Prompt) -> io::Result<AuthSpec> {
        let files = match list_cookie_files(self.cookie_dir, self.cookie_extensions) {
            Ok(files) => files,
            Err(e) => {
                prompt.warn(&format!(
                    "Could not read cookie directory {}: {}",
                    self.cookie_dir.display(),
                    e
                ));
                return Ok(AuthSpec::None);
            }
        };
        if files.is_empty() {
            prompt.warn(&format!(
                "No cookie files ({}) found in {}. Skipping authentication.",
                self.cookie_extensions.join(", "),
                self.cookie_dir.display()
            ));
            return Ok(AuthSpec::None);
        }

        prompt.say("\nAvailable cookie files:");
        for (idx, path) in files.iter().enumerate() {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_else(|| path.display().to_string());
            prompt.say(&format!("{}. {}", idx + 1, name));
        }
        prompt.say("0. Cancel");

        loop {
            let input = prompt.line(&format!("Choose a cookie file (0-{})", files.len()))?;
            match input.trim().parse::<usize>() {
                Ok(0) => return Ok(AuthSpec::None),
                Ok(n) if n <= files.len() => return Ok(AuthSpec::CookieFile(files[n - 1].clone())),
                _ => prompt.warn(&format!(
                    "Invalid selection. Enter a number between 0 and {}.",
                    files.len()
                )),
            }
        }
    }

    fn browser_cookies(&self, prompt: &mut dyn Prompt) -> io::Result<AuthSpec> {
        let browser = prompt.line("Browser name, e.g. firefox or chrome (blank to skip)")?;
        let browser = browser.trim();
        if browser.is_empty() {
            return Ok(AuthSpec::None);
        }
        Ok(AuthSpec::BrowserCookies(browser.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ScriptedPrompt;

    fn settings_with_cookie_dir(dir: &Path) -> Settings {
        Settings {
            cookie_dir: dir.to_path_buf(),
            ..Settings::default()
        }
    }

    #[test]
    fn skip_yields_none() {
        let settings = Settings::default();
        let mut prompt = ScriptedPrompt::new(["1"]);
        assert_eq!(CredentialResolver::new(&settings).resolve(&mut prompt), AuthSpec::None);
    }

    #[test]
    fn invalid_choice_is_reprompted() {
        let settings = Settings::default();
        let mut prompt = ScriptedPrompt::new(["9", "abc", "2", "alice", "s3cret"]);

        let auth = CredentialResolver::new(&settings).resolve(&mut prompt);

        assert_eq!(
            auth,
            AuthSpec::UsernamePassword {
                username: "alice".into(),
                password: "s3cret".into()
            }
        );
        assert!(prompt.printed("Invalid choice"));
    }

    #[test]
    fn closed_input_yields_none() {
        let settings = Settings::default();
        let mut prompt = ScriptedPrompt::new(["2", "alice"]);
        assert_eq!(CredentialResolver::new(&settings).resolve(&mut prompt), AuthSpec::None);
    }

    #[test]
    fn credentials_file_skips_blank_lines_and_ignores_extras() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.txt");
        fs::write(&path, "\n  alice  \n\nhunter2\nextra line\n").unwrap();

        let settings = Settings::default();
        let mut prompt = ScriptedPrompt::new(["3".to_string(), path.display().to_string()]);
        let auth = CredentialResolver::new(&settings).resolve(&mut prompt);

        assert_eq!(
            auth,
            AuthSpec::CredentialFile {
                path: path.clone(),
                username: "alice".into(),
                password: "hunter2".into()
            }
        );
        assert_eq!(
            auth.to_args(),
            vec!["--username", "alice", "--password", "hunter2"]
        );
    }

    #[test]
    fn malformed_credentials_file_is_reported_not_returned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("creds.txt");
        fs::write(&path, "only-a-username\n\n").unwrap();

        let err = read_credentials_file(&path).unwrap_err();
        assert!(matches!(
            err,
            CredentialError::MalformedCredentialFile { found: 1, .. }
        ));

        let settings = Settings::default();
        let mut prompt =
            ScriptedPrompt::new(["3".to_string(), path.display().to_string(), "n".to_string()]);
        let auth = CredentialResolver::new(&settings).resolve(&mut prompt);

        assert_eq!(auth, AuthSpec::None);
        assert!(prompt.printed("expected a username and a password"));
    }

    #[test]
    fn missing_credentials_file_can_be_retried() {
        let dir = tempfile::tempdir().unwrap();
        let good = dir.path().join("good.txt");
        fs::write(&good, "bob\npw\n").unwrap();
        let missing = dir.path().join("missing.txt");

        let settings = Settings::default();
        let mut prompt = ScriptedPrompt::new([
            "3".to_string(),
            missing.display().to_string(),
            "y".to_string(),
            good.display().to_string(),
        ]);
        let auth = CredentialResolver::new(&settings).resolve(&mut prompt);

        assert!(prompt.printed("file not found"));
        assert!(matches!(auth, AuthSpec::CredentialFile { ref username, .. } if username == "bob"));
    }

    #[test]
    fn cookie_files_are_filtered_and_sorted() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.txt", "a.TXT", "notes.md", "c.json"] {
            fs::write(dir.path().join(name), "").unwrap();
        }
        fs::create_dir(dir.path().join("sub.txt")).unwrap();

        let files = list_cookie_files(dir.path(), &["txt".to_string()]).unwrap();
        let names: Vec<_> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.TXT", "b.txt"]);
    }

    #[test]
    fn cookie_selection_rejects_bad_indexes() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("site.txt"), "").unwrap();
        let settings = settings_with_cookie_dir(dir.path());

        let mut prompt = ScriptedPrompt::new(["4", "2", "x", "-1", "1"]);
        let auth = CredentialResolver::new(&settings).resolve(&mut prompt);

        assert_eq!(auth, AuthSpec::CookieFile(dir.path().join("site.txt")));
        assert_eq!(prompt.remaining(), 0);
        assert_eq!(
            prompt
                .output
                .iter()
                .filter(|l| l.contains("Invalid selection"))
                .count(),
            3
        );
    }

    #[test]
    fn cookie_selection_zero_cancels() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("site.txt"), "").unwrap();
        let settings = settings_with_cookie_dir(dir.path());

        let mut prompt = ScriptedPrompt::new(["4", "0"]);
        assert_eq!(CredentialResolver::new(&settings).resolve(&mut prompt), AuthSpec::None);
    }

    #[test]
    fn missing_cookie_dir_yields_none() {
        let dir = tempfile::tempdir().unwrap();
        let settings = settings_with_cookie_dir(&dir.path().join("nope"));

        let mut prompt = ScriptedPrompt::new(["4"]);
        assert_eq!(CredentialResolver::new(&settings).resolve(&mut prompt), AuthSpec::None);
        assert!(prompt.printed("No cookie files"));
    }

    #[test]
    fn browser_cookies() {
        let settings = Settings::default();
        let mut prompt = ScriptedPrompt::new(["5", " firefox "]);
        let auth = CredentialResolver::new(&settings).resolve(&mut prompt);
        assert_eq!(auth.to_args(), vec!["--cookies-from-browser", "firefox"]);

        let mut prompt = ScriptedPrompt::new(["5", ""]);
        assert_eq!(CredentialResolver::new(&settings).resolve(&mut prompt), AuthSpec::None);
    }

    #[test]
    fn debug_hides_password() {
        let auth = AuthSpec::UsernamePassword {
            username: "alice".into(),
            password: "hunter2".into(),
        };
        let rendered = format!("{:?}", auth);
        assert!(rendered.contains("alice"));
        assert!(!rendered.contains("hunter2"));
    }
}
