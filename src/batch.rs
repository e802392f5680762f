// Batch downloads: a manifest of URLs (one per line) run one after another
// with a single shared authentication. A failed item is recorded and the
// batch moves on.

use crate::auth::AuthSpec;
use crate::error::{ManifestError, SessionError};
use crate::session::{DownloadTarget, ToolRunner};
use std::fs;
use std::io;
use std::path::Path;
use tracing::{info, warn};

/// URLs to download, in file order. Duplicates are kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchManifest {
    urls: Vec<String>,
}

impl BatchManifest {
    /// One entry per non-blank line, trimmed.
    pub fn parse(text: &str) -> Self {
        BatchManifest {
            urls: text
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(String::from)
                .collect(),
        }
    }

    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        let text = fs::read_to_string(path).map_err(|source| match source.kind() {
            io::ErrorKind::NotFound => ManifestError::PathNotFound(path.to_path_buf()),
            _ => ManifestError::Read {
                path: path.to_path_buf(),
                source,
            },
        })?;
        Ok(Self::parse(&text))
    }

    pub fn urls(&self) -> &[String] {
        &self.urls
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }
}

/// Result of one manifest entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchOutcome {
    pub url: String,
    pub result: Result<(), SessionError>,
}

/// Per-item results of a whole batch, in manifest order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BatchReport {
    pub outcomes: Vec<BatchOutcome>,
}

impl BatchReport {
    pub fn succeeded(&self) -> usize {
        self.outcomes.iter().filter(|o| o.result.is_ok()).count()
    }

    pub fn failed(&self) -> usize {
        self.outcomes.len() - self.succeeded()
    }

    pub fn failures(&self) -> impl Iterator<Item = &BatchOutcome> {
        self.outcomes.iter().filter(|o| o.result.is_err())
    }
}

pub struct BatchRunner;

impl BatchRunner {
    /// Download every manifest URL in order with the same `auth`.
    /// `on_item` is called before each item with its 1-based position.
    pub fn run_all(
        manifest: &BatchManifest,
        auth: &AuthSpec,
        tool: &mut dyn ToolRunner,
        mut on_item: impl FnMut(usize, usize, &str),
    ) -> BatchReport {
        let total = manifest.len();
        let mut report = BatchReport::default();

        for (idx, url) in manifest.urls().iter().enumerate() {
            on_item(idx + 1, total, url);
            let target = DownloadTarget::new(url.clone(), auth.clone());
            let result = tool.download(&target);
            if let Err(e) = &result {
                warn!(url = %url, "batch item failed: {}", e);
            }
            report.outcomes.push(BatchOutcome {
                url: url.clone(),
                result,
            });
        }

        info!(
            total,
            succeeded = report.succeeded(),
            failed = report.failed(),
            "batch finished"
        );
        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Fails the URLs it is told to, records every target it sees.
    struct FakeTool {
        failing: Vec<&'static str>,
        seen: Vec<DownloadTarget>,
    }

    impl ToolRunner for FakeTool {
        fn download(&mut self, target: &DownloadTarget) -> Result<(), SessionError> {
            self.seen.push(target.clone());
            if self.failing.iter().any(|url| *url == target.url) {
                Err(SessionError::ToolFailed(1))
            } else {
                Ok(())
            }
        }

        fn update(&mut self) -> Result<(), SessionError> {
            Ok(())
        }
    }

    #[test]
    fn parse_skips_blank_lines_and_keeps_order() {
        let manifest = BatchManifest::parse("a.example/2\n\n   \n  a.example/1  \na.example/2\n");
        assert_eq!(
            manifest.urls(),
            &["a.example/2", "a.example/1", "a.example/2"]
        );
    }

    #[test]
    fn load_missing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let err = BatchManifest::load(&dir.path().join("URLS.txt")).unwrap_err();
        assert!(matches!(err, ManifestError::PathNotFound(_)));
    }

    #[test]
    fn failure_does_not_abort_batch() {
        let manifest = BatchManifest::parse("a.example/1\na.example/2\n");
        let mut tool = FakeTool {
            failing: vec!["a.example/1"],
            seen: Vec::new(),
        };

        let report = BatchRunner::run_all(&manifest, &AuthSpec::None, &mut tool, |_, _, _| {});

        assert_eq!(
            report.outcomes,
            vec![
                BatchOutcome {
                    url: "a.example/1".into(),
                    result: Err(SessionError::ToolFailed(1)),
                },
                BatchOutcome {
                    url: "a.example/2".into(),
                    result: Ok(()),
                },
            ]
        );
        assert_eq!((report.succeeded(), report.failed()), (1, 1));
        assert_eq!(report.failures().count(), 1);
    }

    #[test]
    fn auth_is_shared_by_every_item() {
        let manifest = BatchManifest::parse("u1\nu2\nu3\n");
        let auth = AuthSpec::BrowserCookies("firefox".into());
        let mut tool = FakeTool {
            failing: Vec::new(),
            seen: Vec::new(),
        };
        let mut announced = Vec::new();

        BatchRunner::run_all(&manifest, &auth, &mut tool, |i, n, url| {
            announced.push(format!("{}/{} {}", i, n, url))
        });

        assert!(tool.seen.iter().all(|t| t.auth == auth));
        assert_eq!(announced, vec!["1/3 u1", "2/3 u2", "3/3 u3"]);
    }

    #[test]
    fn empty_manifest_runs_nothing() {
        let mut tool = FakeTool {
            failing: Vec::new(),
            seen: Vec::new(),
        };
        let report =
            BatchRunner::run_all(&BatchManifest::default(), &AuthSpec::None, &mut tool, |_, _, _| {});
        assert!(report.outcomes.is_empty());
        assert!(tool.seen.is_empty());
    }
}
