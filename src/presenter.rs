use crate::models::{AnalysisResult, FeatureRecommendation};
use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};
use tracing::{info, warn};
use url::Url;

pub const SHARE_URL: &str = "https://optiflow.ai";
pub const SHARE_TEXT: &str =
    "I just optimized my project with OptiFlow AI! Check out this analysis tool. 🚀 #SEO #AI";
pub const COPIED_TTL: Duration = Duration::from_secs(2);

fn or_na(value: &str) -> &str {
    if value.is_empty() {
        "N/A"
    } else {
        value
    }
}

fn bullets(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("- {}", item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn feature_block(feature: &FeatureRecommendation) -> String {
    format!(
        "FEATURE: {}\nImpact: {} | Difficulty: {}\nDescription: {}\nUser Flow: {}\nTech Stack: {}\n",
        feature.name,
        feature.impact,
        feature.difficulty,
        feature.description,
        or_na(feature.implementation_example.as_deref().unwrap_or("")),
        or_na(feature.tech_stack_suggestion.as_deref().unwrap_or("")),
    )
}

/// Plain-text report. The output depends only on `result` and `date`.
pub fn export_text(result: &AnalysisResult, date: &str) -> String {
    let seo = &result.seo;
    let features = result
        .recommended_features
        .iter()
        .map(feature_block)
        .collect::<Vec<_>>()
        .join("\n");

    let lines = [
        "OPTIFLOW AI - ANALYSIS REPORT".to_string(),
        format!("Generated on: {}", date),
        "==========================================\n".to_string(),
        "EXECUTIVE SUMMARY".to_string(),
        "-----------------".to_string(),
        format!("{}\n", or_na(&result.summary)),
        "SEO STRATEGY".to_string(),
        "------------".to_string(),
        format!("Title Tag: {}", or_na(&seo.title_tag)),
        format!("Meta Description: {}", or_na(&seo.meta_description)),
        format!("Keywords: {}", seo.keywords.join(", ")),
        "\nHeader Suggestions:".to_string(),
        format!("{}\n", bullets(&seo.header_suggestions)),
        "CONTENT IMPROVEMENTS".to_string(),
        "--------------------".to_string(),
        format!("{}\n", bullets(&result.content_improvements)),
        "ACCESSIBILITY TIPS".to_string(),
        "------------------".to_string(),
        format!("{}\n", bullets(&result.accessibility_tips)),
        "RECOMMENDED FEATURES (RELAY STRATEGY)".to_string(),
        "-------------------------------------".to_string(),
        features,
    ];
    lines.join("\n")
}

pub fn export_filename(timestamp_millis: i64) -> String {
    format!("optiflow-analysis-{}.txt", timestamp_millis)
}

/// Writes the report into `dir` and returns the file path.
pub fn write_export(result: &AnalysisResult, dir: &Path) -> Result<PathBuf> {
    let now = chrono::Local::now();
    let path = dir.join(export_filename(now.timestamp_millis()));
    let report = export_text(result, &now.format("%Y-%m-%d").to_string());
    std::fs::write(&path, report)
        .with_context(|| format!("Failed to write report to {}", path.display()))?;
    info!("Report exported to {}", path.display());
    Ok(path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShareLink {
    pub label: &'static str,
    pub href: String,
}

/// Share links for the three fixed platforms. Nothing from the analysis is
/// included.
pub fn share_links() -> Result<Vec<ShareLink>, url::ParseError> {
    let twitter = Url::parse_with_params(
        "https://twitter.com/intent/tweet",
        &[("text", SHARE_TEXT), ("url", SHARE_URL)],
    )?;
    let linkedin = Url::parse_with_params(
        "https://www.linkedin.com/sharing/share-offsite/",
        &[("url", SHARE_URL)],
    )?;
    let facebook =
        Url::parse_with_params("https://www.facebook.com/sharer/sharer.php", &[("u", SHARE_URL)])?;

    Ok(vec![
        ShareLink { label: "Twitter", href: twitter.into() },
        ShareLink { label: "LinkedIn", href: linkedin.into() },
        ShareLink { label: "Facebook", href: facebook.into() },
    ])
}

/// Individual strings a user can copy, keyed by a stable field id.
pub fn copyable_fields(result: &AnalysisResult) -> Vec<(String, String)> {
    let mut fields = vec![
        ("title".to_string(), result.seo.title_tag.clone()),
        ("description".to_string(), result.seo.meta_description.clone()),
    ];
    let lists = [
        ("keyword", &result.seo.keywords),
        ("header", &result.seo.header_suggestions),
        ("content", &result.content_improvements),
        ("a11y", &result.accessibility_tips),
    ];
    for (prefix, items) in lists {
        for (i, item) in items.iter().enumerate() {
            fields.push((format!("{}-{}", prefix, i), item.clone()));
        }
    }
    fields
}

/// Remembers which fields were copied recently. Each flag expires on its
/// own after the TTL.
#[derive(Debug)]
pub struct CopyTracker {
    ttl: Duration,
    copied: HashMap<String, Instant>,
}

impl Default for CopyTracker {
    fn default() -> Self {
        Self::new(COPIED_TTL)
    }
}

impl CopyTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            copied: HashMap::new(),
        }
    }

    pub fn mark(&mut self, field: &str, now: Instant) {
        self.copied.insert(field.to_string(), now);
    }

    pub fn is_copied(&self, field: &str, now: Instant) -> bool {
        self.copied
            .get(field)
            .is_some_and(|at| now.saturating_duration_since(*at) < self.ttl)
    }

    pub fn prune(&mut self, now: Instant) {
        let ttl = self.ttl;
        self.copied
            .retain(|_, at| now.saturating_duration_since(*at) < ttl);
    }

    /// Copies `text` to the system clipboard and flags `field`. Returns a
    /// status line; an unavailable clipboard is reported, not raised.
    pub fn copy(&mut self, field: &str, text: &str) -> String {
        match arboard::Clipboard::new().and_then(|mut c| c.set_text(text)) {
            Ok(()) => {
                self.mark(field, Instant::now());
                format!("Copied {} to clipboard", field)
            }
            Err(e) => {
                warn!("Clipboard unavailable: {}", e);
                format!("Clipboard not available: {}", e)
            }
        }
    }
}

pub fn render_terminal(result: &AnalysisResult) -> String {
    let mut out = String::new();
    out.push_str("\n✅ Analysis complete\n");
    out.push_str("====================\n\n");
    out.push_str(&format!("📋 Executive summary\n{}\n\n", or_na(&result.summary)));

    let seo = &result.seo;
    out.push_str("🔍 SEO\n");
    out.push_str(&format!(
        "  Title tag ({} chars): {}\n",
        seo.title_tag.chars().count(),
        or_na(&seo.title_tag)
    ));
    out.push_str(&format!("  Meta description: {}\n", or_na(&seo.meta_description)));
    out.push_str(&format!("  Keywords: {}\n", seo.keywords.join(", ")));
    for (i, header) in seo.header_suggestions.iter().enumerate() {
        out.push_str(&format!("  H{} {}\n", (i + 1).min(3), header));
    }
    out.push('\n');

    let sections = [
        ("✍️  Content improvements", &result.content_improvements),
        ("♿ Accessibility tips", &result.accessibility_tips),
    ];
    for (title, items) in sections {
        out.push_str(title);
        out.push('\n');
        for item in items {
            out.push_str(&format!("  - {}\n", item));
        }
        out.push('\n');
    }

    out.push_str("🧩 Recommended features\n");
    for feature in &result.recommended_features {
        out.push_str(&format!(
            "  • {} [impact: {}, difficulty: {}]\n    {}\n",
            feature.name, feature.impact, feature.difficulty, feature.description
        ));
        if let Some(stack) = &feature.tech_stack_suggestion {
            out.push_str(&format!("    Tech stack: {}\n", stack));
        }
        if let Some(flow) = &feature.implementation_example {
            out.push_str(&format!("    User flow: {}\n", flow));
        }
    }
    out
}
