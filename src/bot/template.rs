//! Reply text rendering

use crate::bot::links::{github_info, notebook_path};

const NBVIEWER_URL_PREFIX: &str = "https://nbviewer.jupyter.org/url/";
const BINDER_URL_PREFIX: &str = "https://mybinder.org/v2/gh/";

const COMMENT_FOOTER: &str = "\
------

^(I am a bot.) \
[^(Feedback)](https://www.reddit.com/message/compose/?to=jd_paton) ^(|) \
[^(GitHub)](https://github.com/JohnPaton/nbviewerbot) ^(|) \
[^(Author)](https://johnpaton.net/)
";

const INTRO_SINGLE: &str = "\
I see you've posted a GitHub link to a Jupyter Notebook! GitHub doesn't \
render Jupyter Notebooks on mobile, so here is an \
[nbviewer](https://nbviewer.jupyter.org/) link to the notebook \
for mobile viewing:";

const INTRO_MULTI: &str = "\
I see you've posted GitHub links to Jupyter Notebooks! GitHub doesn't \
render Jupyter Notebooks on mobile, so here are \
[nbviewer](https://nbviewer.jupyter.org/) links to the notebooks \
for mobile viewing:";

/// nbviewer mirror for a notebook URL
pub fn nbviewer_url(url: &str) -> String {
    format!("{NBVIEWER_URL_PREFIX}{}", notebook_path(url))
}

/// Binder launch URL for a GitHub URL, if it names a repository
pub fn binder_url(url: &str) -> Option<String> {
    let info = github_info(url)?;
    let base = format!("{BINDER_URL_PREFIX}{}/{}", info.repo, info.branch);
    Some(match info.filepath {
        Some(filepath) => format!("{base}?filepath={filepath}"),
        None => base,
    })
}

/// Renders reply comments for a list of notebook links
#[derive(Debug, Clone, Default)]
pub struct ReplyRenderer {
    binder_links: bool,
}

impl ReplyRenderer {
    pub fn new(binder_links: bool) -> Self {
        Self { binder_links }
    }

    fn link_line(&self, url: &str) -> String {
        let nbviewer = nbviewer_url(url);
        if !self.binder_links {
            return nbviewer;
        }
        match binder_url(url) {
            Some(binder) => format!("{nbviewer}\n\nWant to run the code yourself? [Binder]({binder})"),
            None => nbviewer,
        }
    }

    /// Reply text for one or more links; `None` when there are no links
    pub fn render(&self, links: &[String]) -> Option<String> {
        let intro = match links.len() {
            0 => return None,
            1 => INTRO_SINGLE,
            _ => INTRO_MULTI,
        };

        let body = links
            .iter()
            .map(|url| self.link_line(url))
            .collect::<Vec<_>>()
            .join("\n\n");

        Some(format!("{intro}\n\n{body}\n\n{COMMENT_FOOTER}"))
    }
}
