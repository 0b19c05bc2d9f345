use serde::{Deserialize, Serialize};

/// Most candidate links a metadata provider may hand over for one episode.
pub const MAX_CANDIDATE_LINKS: usize = 4;

/// A labelled external link (e.g. "AniList", "MyAnimeList").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinkButton {
    pub label: String,
    pub url: String,
}

impl LinkButton {
    pub fn new(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            url: url.into(),
        }
    }

    /// Parse a `Label=URL` pair as given on the command line.
    pub fn parse(value: &str) -> Option<Self> {
        let (label, url) = value.split_once('=')?;
        let (label, url) = (label.trim(), url.trim());
        if label.is_empty() || !(url.starts_with("https://") || url.starts_with("http://")) {
            return None;
        }
        Some(Self::new(label, url))
    }
}

/// What the metadata provider knows about the episode being played.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct EpisodeMeta {
    pub title: String,
    /// Free-form episode label ("5", "12.5", "OVA").
    pub episode_label: String,
    /// Episode length in seconds; 0 when unknown.
    pub duration_hint: u64,
    pub artwork_url: Option<String>,
    pub links: Vec<LinkButton>,
}

impl EpisodeMeta {
    pub fn new(title: impl Into<String>, episode_label: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            episode_label: episode_label.into(),
            ..Default::default()
        }
    }

    pub fn with_duration_hint(mut self, seconds: u64) -> Self {
        self.duration_hint = seconds;
        self
    }

    pub fn with_artwork(mut self, url: impl Into<String>) -> Self {
        self.artwork_url = Some(url.into());
        self
    }

    /// Attach candidate links; anything past [`MAX_CANDIDATE_LINKS`] is dropped.
    pub fn with_links(mut self, links: impl IntoIterator<Item = LinkButton>) -> Self {
        self.links = links.into_iter().take(MAX_CANDIDATE_LINKS).collect();
        self
    }

    /// Line shown under the title, e.g. "Episode 5".
    pub fn state_text(&self) -> String {
        if self.episode_label.is_empty() {
            "Watching".into()
        } else {
            format!("Episode {}", self.episode_label)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_link() {
        let link = LinkButton::parse("AniList=https://anilist.co/anime/154587").unwrap();
        assert_eq!(link.label, "AniList");
        assert_eq!(link.url, "https://anilist.co/anime/154587");
    }

    #[test]
    fn test_parse_link_rejects_garbage() {
        assert!(LinkButton::parse("no separator").is_none());
        assert!(LinkButton::parse("=https://example.com").is_none());
        assert!(LinkButton::parse("Label=ftp://example.com").is_none());
    }

    #[test]
    fn test_links_capped_at_four() {
        let links = (0..6).map(|i| LinkButton::new(format!("L{i}"), "https://example.com"));
        let meta = EpisodeMeta::new("Sousou no Frieren", "5").with_links(links);
        assert_eq!(meta.links.len(), MAX_CANDIDATE_LINKS);
        assert_eq!(meta.links[3].label, "L3");
    }

    #[test]
    fn test_state_text() {
        assert_eq!(EpisodeMeta::new("Frieren", "5").state_text(), "Episode 5");
        assert_eq!(EpisodeMeta::new("Frieren", "").state_text(), "Watching");
    }
}
