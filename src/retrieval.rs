use crate::config::AppSettings;
use crate::context::RetrievalSource;
use crate::github::GithubApiClient;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

const README_FILE: &str = "README.md";
const MAX_KEYWORDS: usize = 6;
const MIN_KEYWORD_LEN: usize = 3;

pub const NO_CONTEXT_FOUND: &str = "No relevant repository content was found for this question.";

const STOP_WORDS: [&str; 48] = [
    "the", "and", "for", "are", "but", "not", "you", "all", "any", "can", "had", "her", "was",
    "one", "our", "out", "has", "how", "its", "does", "did", "what", "when", "where", "which",
    "who", "why", "will", "with", "this", "that", "there", "these", "those", "from", "have",
    "into", "about", "would", "could", "should", "please", "some", "just", "help", "work",
    "thanks", "i'm",
];

/// Finds repository files relevant to a question through GitHub code search.
pub struct RepoContextRetriever {
    github: Arc<GithubApiClient>,
    settings: Arc<AppSettings>,
}

impl RepoContextRetriever {
    pub fn new(github: Arc<GithubApiClient>, settings: Arc<AppSettings>) -> Self {
        Self { github, settings }
    }

    /// Appends `section` if it fits the remaining budget, otherwise a placeholder.
    fn push_section(&self, sections: &mut Vec<String>, total_size: &mut usize, path: &str, content: &str) {
        let section = format!("--- {} ---\n{}\n", path, content);
        if *total_size + section.len() <= self.settings.max_context_size {
            *total_size += section.len();
            sections.push(section);
        } else {
            warn!("{} too large to fit in context", path);
            sections.push(format!(
                "--- {} ---\n[Content omitted due to context size limits]\n",
                path
            ));
        }
    }
}

#[async_trait]
impl RetrievalSource for RepoContextRetriever {
    async fn get_context_for_query(
        &self,
        owner: &str,
        repo: &str,
        search_text: &str,
    ) -> Result<String> {
        let keywords = extract_keywords(search_text);
        info!(
            "Retrieving context for {}/{} with keywords {:?}",
            owner, repo, keywords
        );

        let git_ref = self.settings.default_branch.as_deref();
        let mut sections = Vec::new();
        let mut total_size = 0;

        match self
            .github
            .get_file_content(owner, repo, README_FILE, git_ref)
            .await
        {
            Ok(Some(readme)) => {
                self.push_section(&mut sections, &mut total_size, README_FILE, &readme)
            }
            Ok(None) => debug!("{} not found in {}/{}", README_FILE, owner, repo),
            Err(e) => warn!(
                "Failed to fetch {} from {}/{}: {}. Continuing without it.",
                README_FILE, owner, repo, e
            ),
        }

        if keywords.is_empty() {
            debug!("No usable keywords in search text, skipping code search");
        } else {
            let matches = self
                .github
                .search_code(owner, repo, &keywords, self.settings.max_context_files)
                .await
                .with_context(|| format!("code search failed for {}/{}", owner, repo))?;

            let candidates: Vec<_> = matches
                .iter()
                .filter(|item| item.path != README_FILE)
                .take(self.settings.max_context_files)
                .collect();

            let fetches = candidates.iter().map(|item| {
                let github = self.github.clone();
                async move { github.get_file_content(owner, repo, &item.path, git_ref).await }
            });
            let results = futures::future::join_all(fetches).await;

            let mut scored = Vec::new();
            for (result, item) in results.into_iter().zip(candidates) {
                match result {
                    Ok(Some(content)) => {
                        let score = keyword_frequency(&content, &keywords);
                        scored.push((score, item.path.clone(), content));
                    }
                    Ok(None) => debug!("{} disappeared before it could be fetched", item.path),
                    Err(e) => warn!("Failed to get content for file {}: {}", item.path, e),
                }
            }

            // Highest keyword density first, path as a stable tie-break
            scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(&b.1)));
            for (_, path, content) in &scored {
                self.push_section(&mut sections, &mut total_size, path, content);
            }
        }

        if sections.is_empty() {
            return Ok(NO_CONTEXT_FOUND.to_string());
        }
        Ok(sections.join("\n"))
    }
}

/// Lowercased search terms in order of first appearance, without stop words.
pub fn extract_keywords(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    text.split(|c: char| !(c.is_alphanumeric() || c == '_' || c == '\''))
        .map(|word| word.trim_matches('\'').to_lowercase())
        .filter(|word| word.chars().count() >= MIN_KEYWORD_LEN)
        .filter(|word| !STOP_WORDS.contains(&word.as_str()))
        .filter(|word| seen.insert(word.clone()))
        .take(MAX_KEYWORDS)
        .collect()
}

/// Total number of keyword occurrences in `content`, case-insensitive.
fn keyword_frequency(content: &str, keywords: &[String]) -> usize {
    if keywords.is_empty() || content.is_empty() {
        return 0;
    }
    let content_lower = content.to_lowercase();
    keywords
        .iter()
        .map(|keyword| content_lower.matches(keyword.as_str()).count())
        .sum()
}
