use serde::{Deserialize, Serialize};
use std::fmt;

/// An image carried inline with its mime type, equivalent to a `data:` URI.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EmbeddedImage {
    pub mime_type: String,

    /// Base64 (standard alphabet) encoded bytes.
    pub data: String,
}

impl EmbeddedImage {
    /// Parses `data:<mime>;base64,<data>`. Returns `None` for anything else.
    pub fn from_data_uri(uri: &str) -> Option<Self> {
        let rest = uri.strip_prefix("data:")?;
        let (header, data) = rest.split_once(',')?;
        let mime_type = header.strip_suffix(";base64")?;
        if mime_type.is_empty() || data.is_empty() {
            return None;
        }
        Some(Self {
            mime_type: mime_type.to_string(),
            data: data.to_string(),
        })
    }
}

/// One submission of business context. Built by `input::RequestDraft::submit`.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisRequest {
    #[serde(default)]
    pub url: Option<String>,

    pub business_name: String,

    pub target_audience: String,

    pub description: String,

    #[serde(default)]
    pub current_content: Option<String>,

    #[serde(default)]
    pub image: Option<EmbeddedImage>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub seo: SeoBlock,

    pub content_improvements: Vec<String>,

    pub accessibility_tips: Vec<String>,

    pub recommended_features: Vec<FeatureRecommendation>,

    pub summary: String,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SeoBlock {
    /// Expected to stay under 60 characters; not checked locally.
    pub title_tag: String,

    pub meta_description: String,

    pub keywords: Vec<String>,

    pub header_suggestions: Vec<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureRecommendation {
    pub name: String,

    pub description: String,

    pub impact: Impact,

    pub difficulty: Difficulty,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tech_stack_suggestion: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub implementation_example: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    High,
    Medium,
    Low,
}

impl Impact {
    pub const ALL: [&'static str; 3] = ["High", "Medium", "Low"];
}

impl fmt::Display for Impact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Impact::High => "High",
            Impact::Medium => "Medium",
            Impact::Low => "Low",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Difficulty {
    Easy,
    Moderate,
    Hard,
}

impl Difficulty {
    pub const ALL: [&'static str; 3] = ["Easy", "Moderate", "Hard"];
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Difficulty::Easy => "Easy",
            Difficulty::Moderate => "Moderate",
            Difficulty::Hard => "Hard",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum Plan {
    Free,
    Pro,
    Premium,
}

impl Plan {
    /// Matches a pricing label such as "Pro Professional" or a bare plan name.
    pub fn from_label(label: &str) -> Option<Self> {
        let label = label.trim().to_ascii_lowercase();
        if label.starts_with("free") {
            Some(Plan::Free)
        } else if label.starts_with("pro") {
            Some(Plan::Pro)
        } else if label.starts_with("premium") {
            Some(Plan::Premium)
        } else {
            None
        }
    }
}

impl fmt::Display for Plan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Plan::Free => "Free",
            Plan::Pro => "Pro",
            Plan::Premium => "Premium",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct UserSession {
    pub name: String,

    pub email: String,

    pub credits: u32,

    pub plan: Plan,

    #[serde(default)]
    pub avatar: Option<EmbeddedImage>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PricingPlan {
    pub plan: Plan,

    pub label: &'static str,

    pub price: &'static str,

    pub credits: &'static str,

    pub features: &'static [&'static str],

    pub recommended: bool,
}

pub const PRICING_PLANS: [PricingPlan; 3] = [
    PricingPlan {
        plan: Plan::Free,
        label: "Free Starter",
        price: "$0",
        credits: "5 Credits",
        features: &[
            "Basic SEO Analysis",
            "Standard Response Speed",
            "1 Project Profile",
            "Community Support",
        ],
        recommended: false,
    },
    PricingPlan {
        plan: Plan::Pro,
        label: "Pro Professional",
        price: "$29",
        credits: "50 Credits / mo",
        features: &[
            "Deep Content Analysis",
            "Feature Relay Recommendations",
            "Priority Processing",
            "Export to PDF/Markdown",
            "Email Support",
        ],
        recommended: true,
    },
    PricingPlan {
        plan: Plan::Premium,
        label: "Premium Agency",
        price: "$99",
        credits: "Unlimited",
        features: &[
            "Everything in Pro",
            "Team Collaboration",
            "API Access",
            "Whitelabel Reports",
            "Dedicated Success Manager",
        ],
        recommended: false,
    },
];
