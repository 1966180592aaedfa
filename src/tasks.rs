//! Task list loading.
//!
//! One task per line: `<url><whitespace><alias>`. Blank lines and lines
//! starting with `#` are skipped. The alias is everything after the first
//! whitespace run and may itself contain spaces.

use crate::error::CrawlError;
use std::path::{Path, PathBuf};
use tracing::warn;
use url::Url;

/// One feed to archive: where to fetch it and what to call the archive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedTask {
    pub url: String,
    pub alias: String,
}

impl FeedTask {
    /// Archive root for this task under the configured result directory.
    pub fn dest_dir(&self, result_dir: &Path) -> PathBuf {
        result_dir.join(&self.alias)
    }
}

/// Parse a task list. Malformed lines are logged and skipped, never fatal.
pub fn parse_tasks(text: &str) -> Vec<FeedTask> {
    let mut tasks = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((url, alias)) = line.split_once(char::is_whitespace) else {
            warn!(line = idx + 1, "task line without alias; skipping");
            continue;
        };
        let alias = alias.trim();
        if alias.is_empty() {
            warn!(line = idx + 1, "task line without alias; skipping");
            continue;
        }
        if let Err(e) = Url::parse(url) {
            warn!(line = idx + 1, url, error = %e, "task line with invalid url; skipping");
            continue;
        }
        tasks.push(FeedTask {
            url: url.to_string(),
            alias: alias.to_string(),
        });
    }
    tasks
}

/// Read and parse the task list file.
pub async fn load_tasks(path: &Path) -> Result<Vec<FeedTask>, CrawlError> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| CrawlError::io(path, e))?;
    Ok(parse_tasks(&text))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_url_and_alias() {
        let tasks = parse_tasks("https://example.com/feed.xml myalias\n");
        assert_eq!(
            tasks,
            vec![FeedTask {
                url: "https://example.com/feed.xml".to_string(),
                alias: "myalias".to_string(),
            }]
        );
    }

    #[test]
    fn skips_blank_lines_and_comments() {
        let tasks = parse_tasks(
            "# archived shows\n\
             \n\
             https://example.com/a.xml first\n\
                \n\
             # https://example.com/b.xml disabled\n\
             https://example.com/c.xml second\n",
        );
        let aliases: Vec<&str> = tasks.iter().map(|t| t.alias.as_str()).collect();
        assert_eq!(aliases, vec!["first", "second"]);
    }

    #[test]
    fn alias_keeps_embedded_spaces() {
        let tasks = parse_tasks("https://example.com/feed.xml my favorite show\n");
        assert_eq!(tasks[0].alias, "my favorite show");
    }

    #[test]
    fn tab_separates_url_and_alias() {
        let tasks = parse_tasks("https://example.com/feed.xml\tshow\n");
        assert_eq!(tasks[0].alias, "show");
    }

    #[test]
    fn skips_lines_without_alias_or_with_bad_url() {
        let tasks = parse_tasks(
            "https://example.com/only-url.xml\n\
             not-a-url myalias\n\
             https://example.com/ok.xml good\n",
        );
        assert_eq!(tasks.len(), 1);
        assert_eq!(tasks[0].alias, "good");
    }

    #[test]
    fn dest_dir_joins_alias_under_result_dir() {
        let task = FeedTask {
            url: "https://example.com/feed.xml".to_string(),
            alias: "myalias".to_string(),
        };
        assert_eq!(
            task.dest_dir(Path::new("./result")),
            PathBuf::from("./result/myalias")
        );
    }
}
