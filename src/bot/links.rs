//! Link extraction from rendered item content
//!
//! The dispatcher only depends on the [`LinkExtractor`] trait. The default
//! [`NotebookLinkExtractor`] parses the HTML with `scraper` and keeps links
//! to Jupyter notebooks hosted on GitHub.

use crate::bot::item::{DiscussionItem, ItemKind};
use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use url::Url;

static ANCHOR_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("a[href]").expect("valid anchor selector"));

/// Returns the qualifying links found in an item's rendered content
pub trait LinkExtractor: Send + Sync {
    /// Qualifying links in document order
    fn extract_links(&self, rendered_content: &str) -> Vec<String>;

    /// Whether a bare URL (e.g. a link submission's target) qualifies
    fn is_qualifying(&self, url: &str) -> bool;
}

/// Extracts GitHub-hosted `.ipynb` links
#[derive(Debug, Clone, Copy, Default)]
pub struct NotebookLinkExtractor;

impl LinkExtractor for NotebookLinkExtractor {
    fn extract_links(&self, rendered_content: &str) -> Vec<String> {
        github_notebook_links(rendered_content)
    }

    fn is_qualifying(&self, url: &str) -> bool {
        is_github_notebook_url(url)
    }
}

/// All qualifying links for an item, first occurrence order, no duplicates.
///
/// Submissions also contribute their own link target.
pub fn item_links(extractor: &dyn LinkExtractor, item: &DiscussionItem) -> Vec<String> {
    let mut links = extractor.extract_links(&item.rendered_content);

    if item.kind == ItemKind::Submission {
        if let Some(url) = item.raw_content_url.as_deref() {
            if extractor.is_qualifying(url) {
                links.push(url.to_string());
            }
        }
    }

    let mut seen = std::collections::HashSet::new();
    links.retain(|link| seen.insert(link.clone()));
    links
}

/// Every `http(s)` hyperlink destination in an HTML fragment
pub fn all_links(html: &str) -> Vec<String> {
    let fragment = Html::parse_fragment(html);
    fragment
        .select(&ANCHOR_SELECTOR)
        .filter_map(|a| a.value().attr("href"))
        .filter(|href| href.starts_with("http"))
        .map(str::to_string)
        .collect()
}

/// Links in an HTML fragment that point at GitHub notebooks
pub fn github_notebook_links(html: &str) -> Vec<String> {
    all_links(html)
        .into_iter()
        .filter(|link| is_github_notebook_url(link))
        .collect()
}

/// True if the host contains "github" and the path contains ".ipynb"
pub fn is_github_notebook_url(url: &str) -> bool {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default().to_lowercase();
            host.contains("github") && parsed.path().to_lowercase().contains(".ipynb")
        }
        Err(_) => false,
    }
}

/// Host and path of a URL with scheme, `www.`, query and fragment removed.
///
/// `https://www.github.com/u/r/blob/master/nb.ipynb?x=1` becomes
/// `github.com/u/r/blob/master/nb.ipynb`. Unparseable input comes back as-is.
pub fn notebook_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => {
            let host = parsed.host_str().unwrap_or_default();
            let host = host.strip_prefix("www.").unwrap_or(host);
            format!("{}{}", host, parsed.path())
        }
        Err(_) => url.to_string(),
    }
}

/// Repository location parsed from a GitHub URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GithubInfo {
    /// `owner/name`
    pub repo: String,
    pub branch: String,
    pub filepath: Option<String>,
}

/// Repo, branch and file path of a GitHub URL such as
/// `https://github.com/owner/repo/blob/branch/dir/nb.ipynb`.
///
/// The branch defaults to `master` when the URL only names the repository.
pub fn github_info(url: &str) -> Option<GithubInfo> {
    let parsed = Url::parse(url).ok()?;
    if !parsed.host_str()?.to_lowercase().contains("github") {
        return None;
    }

    let segments: Vec<&str> = parsed.path().split('/').skip(1).collect();
    if segments.len() < 2 || segments[0].is_empty() || segments[1].is_empty() {
        return None;
    }

    let repo = format!("{}/{}", segments[0], segments[1]);
    let branch = segments
        .get(3)
        .filter(|b| !b.is_empty())
        .map(|b| b.to_string())
        .unwrap_or_else(|| "master".to_string());
    let filepath = if segments.len() > 4 {
        Some(segments[4..].join("/")).filter(|p| !p.is_empty())
    } else {
        None
    };

    Some(GithubInfo {
        repo,
        branch,
        filepath,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_github_notebook_url() {
        assert!(is_github_notebook_url(
            "https://github.com/username/repo/test.ipynb"
        ));
        assert!(is_github_notebook_url(
            "https://GitHub.com/username/repo/Test.IPYNB"
        ));
        assert!(is_github_notebook_url(
            "https://gist.github.com/username/abc123/analysis.ipynb"
        ));
        assert!(!is_github_notebook_url("http://github.com"));
        assert!(!is_github_notebook_url("www.example.com/test.ipynb"));
        assert!(!is_github_notebook_url("http://google.com"));
        assert!(!is_github_notebook_url("https://example.com/github/test.ipynb"));
    }

    #[test]
    fn test_notebook_path() {
        let expected = "github.com/username/repo/test.ipynb";
        assert_eq!(
            notebook_path("https://github.com/username/repo/test.ipynb"),
            expected
        );
        assert_eq!(
            notebook_path("http://www.github.com/username/repo/test.ipynb"),
            expected
        );
        assert_eq!(
            notebook_path("https://github.com/username/repo/test.ipynb?param=on"),
            expected
        );
        assert_eq!(
            notebook_path("https://github.com/username/repo/test.ipynb#section1"),
            expected
        );
    }

    #[test]
    fn test_all_links_plain_text() {
        assert!(all_links("this isn't even html").is_empty());
    }

    #[test]
    fn test_all_links_skips_fragments() {
        let html = r##"some text <a href="http://www.example.com">a</a> also <a href="#section1">b</a>"##;
        assert_eq!(all_links(html), vec!["http://www.example.com"]);
    }

    #[test]
    fn test_all_links_unquoted_attributes() {
        let html = "some text <a href=http://www.example.com> also <a href=http://www.github.com>";
        assert_eq!(
            all_links(html),
            vec!["http://www.example.com", "http://www.github.com"]
        );
    }

    #[test]
    fn test_github_notebook_links() {
        let html = r#"<div class="md"><p>See <a href="http://www.example.com">this</a> and
            <a href="http://www.github.com/username/repo/test.ipynb">my notebook</a></p></div>"#;
        assert_eq!(
            github_notebook_links(html),
            vec!["http://www.github.com/username/repo/test.ipynb"]
        );

        let html = r#"<a href="http://www.example.com">x</a> <a href="http://www.github.com">y</a>"#;
        assert!(github_notebook_links(html).is_empty());
    }

    #[test]
    fn test_item_links_includes_submission_url() {
        let extractor = NotebookLinkExtractor;
        let url = "https://github.com/u/r/blob/master/a.ipynb".to_string();
        let html = format!(r#"<p><a href="{url}">dup</a> <a href="https://github.com/u/r/blob/master/b.ipynb">b</a></p>"#);

        let item = DiscussionItem::submission("s1", html, Some(url.clone()));
        let links = item_links(&extractor, &item);
        assert_eq!(
            links,
            vec![url, "https://github.com/u/r/blob/master/b.ipynb".to_string()]
        );
    }

    #[test]
    fn test_item_links_ignores_url_for_comments() {
        let extractor = NotebookLinkExtractor;
        let mut item = DiscussionItem::comment("c1", "<p>nothing here</p>");
        item.raw_content_url = Some("https://github.com/u/r/blob/master/a.ipynb".to_string());
        assert!(item_links(&extractor, &item).is_empty());
    }

    #[test]
    fn test_item_links_non_notebook_submission_url() {
        let extractor = NotebookLinkExtractor;
        let item = DiscussionItem::submission("s2", "", Some("https://github.com/u/r".to_string()));
        assert!(item_links(&extractor, &item).is_empty());
    }

    #[test]
    fn test_github_info_full() {
        let info = github_info("https://github.com/JohnPaton/numpy-neural-networks/blob/dev/nbs/01-perceptron.ipynb").unwrap();
        assert_eq!(info.repo, "JohnPaton/numpy-neural-networks");
        assert_eq!(info.branch, "dev");
        assert_eq!(info.filepath.as_deref(), Some("nbs/01-perceptron.ipynb"));
    }

    #[test]
    fn test_github_info_repo_only() {
        let info = github_info("https://github.com/owner/repo").unwrap();
        assert_eq!(info.repo, "owner/repo");
        assert_eq!(info.branch, "master");
        assert_eq!(info.filepath, None);
    }

    #[test]
    fn test_github_info_rejects_non_github() {
        assert_eq!(github_info("https://gitlab.com/owner/repo"), None);
        assert_eq!(github_info("https://github.com/owner"), None);
        assert_eq!(github_info("not a url"), None);
    }
}
