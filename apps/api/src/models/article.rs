use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// One content item from a section library.
///
/// `id` is the sole merge/dedup key across every curation stage.
/// Articles are read-only inside the curation core; scores are attached via
/// [`ScoredArticle`], never written back onto the article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    #[serde(alias = "webTitle", default)]
    pub title: String,
    #[serde(alias = "webUrl", default)]
    pub url: String,
    #[serde(default)]
    pub trail_text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,
    #[serde(alias = "sectionId", default)]
    pub section: String,
    #[serde(alias = "webPublicationDate", default)]
    pub published_date: Option<String>,
}

impl Article {
    /// Parsed publication timestamp. `None` for missing or unparseable dates,
    /// which recency ordering treats as the oldest possible value.
    pub fn published_at(&self) -> Option<DateTime<Utc>> {
        let raw = self.published_date.as_deref()?.trim();
        if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
            return Some(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc())
    }
}

/// An article annotated with its relevance score (0–100).
///
/// Serializes flat: every article field plus `relevanceScore`. This is the data
/// contract handed to the digest compositor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoredArticle {
    #[serde(flatten)]
    pub article: Article,
    pub relevance_score: u8,
}

impl ScoredArticle {
    pub fn new(article: Article, relevance_score: u8) -> Self {
        Self {
            article,
            relevance_score,
        }
    }

    /// An article that was never scored carries the default score of 0.
    pub fn unscored(article: Article) -> Self {
        Self::new(article, 0)
    }
}

/// The JSON document published per section by the library builder.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionLibrary {
    #[serde(default)]
    pub section: Option<String>,
    #[serde(default)]
    pub last_updated: Option<String>,
    #[serde(default)]
    pub articles: Vec<Article>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn article_with_date(date: Option<&str>) -> Article {
        Article {
            id: "world/2024/jan/15/story".to_string(),
            title: "Story".to_string(),
            url: "https://example.com/story".to_string(),
            trail_text: "Trail".to_string(),
            summary: None,
            section: "world".to_string(),
            published_date: date.map(String::from),
        }
    }

    #[test]
    fn test_published_at_parses_rfc3339() {
        let article = article_with_date(Some("2024-01-15T10:30:00Z"));
        let ts = article.published_at().unwrap();
        assert_eq!(ts.to_rfc3339(), "2024-01-15T10:30:00+00:00");
    }

    #[test]
    fn test_published_at_accepts_plain_date() {
        let article = article_with_date(Some("2024-01-15"));
        assert!(article.published_at().is_some());
    }

    #[test]
    fn test_published_at_none_for_garbage_or_missing() {
        assert!(article_with_date(Some("last tuesday")).published_at().is_none());
        assert!(article_with_date(None).published_at().is_none());
    }

    #[test]
    fn test_article_accepts_content_api_field_names() {
        let json = r#"{
            "id": "technology/2024/feb/01/chips",
            "webTitle": "Chip shortage eases",
            "webUrl": "https://example.com/chips",
            "sectionId": "technology",
            "webPublicationDate": "2024-02-01T08:00:00Z",
            "trailText": "Supply is recovering"
        }"#;
        let article: Article = serde_json::from_str(json).unwrap();
        assert_eq!(article.title, "Chip shortage eases");
        assert_eq!(article.section, "technology");
        assert_eq!(article.trail_text, "Supply is recovering");
    }

    #[test]
    fn test_scored_article_serializes_flat() {
        let scored = ScoredArticle::new(article_with_date(Some("2024-01-15")), 82);
        let value = serde_json::to_value(&scored).unwrap();
        assert_eq!(value["relevanceScore"], 82);
        assert_eq!(value["id"], "world/2024/jan/15/story");
        assert_eq!(value["trailText"], "Trail");
        assert_eq!(value["publishedDate"], "2024-01-15");
    }

    #[test]
    fn test_library_tolerates_missing_articles_field() {
        let library: SectionLibrary = serde_json::from_str(r#"{"section": "world"}"#).unwrap();
        assert!(library.articles.is_empty());
    }
}
