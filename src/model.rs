//! Content records stored in the document collections.

use serde::{Deserialize, Serialize};

/// Names of the fixed document collections.
pub const COLLECTIONS: &[&str] = &[
    "articles",
    "rituals",
    "guides",
    "testimonials",
    "messages",
    "notifications",
    "transactions",
    "subscriptions",
    "vip_content",
    "profiles",
    "settings",
];

/// Fixed settings section names stored under the `settings` collection.
pub const SETTINGS_SECTIONS: &[&str] = &["contact", "about", "social", "api_keys"];

/// Settings sections readable without admin credentials.
pub const PUBLIC_SETTINGS_SECTIONS: &[&str] = &["contact", "about", "social"];

/// Notification target addressing every device.
pub const GLOBAL_TARGET: &str = "global";

/// Published article shown on the public site and edited in the admin console.
///
/// ```json
/// {
///   "id": "7f3a...",
///   "title": "Cleansing bath for new beginnings",
///   "excerpt": "A simple bath to open your paths.",
///   "content": "<p>Gather salt and white flowers...</p>",
///   "author": "Mãe Celina",
///   "date": "12 de março",
///   "tags": ["banhos", "limpeza"],
///   "imageUrl": "https://cdn.example.com/banho.jpg",
///   "likes": 12,
///   "vip": false,
///   "createdAt": 1700000000000
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    pub id: String,
    pub title: String,
    pub excerpt: String,
    /// Optional HTML body; list views render the excerpt only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    pub author: String,
    /// Free-text display date, kept verbatim from the editor.
    pub date: String,
    #[serde(default)]
    pub tags: Vec<String>,
    pub image_url: String,
    #[serde(default)]
    pub likes: u64,
    /// Restricts the full body to VIP members.
    #[serde(default)]
    pub vip: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub faq: Option<Vec<FaqEntry>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus_keyword: Option<String>,
    #[serde(default)]
    pub created_at: u64,
}

/// Question/answer pair rendered under an article.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FaqEntry {
    pub question: String,
    pub answer: String,
}

/// Ritual listing with free-text duration and difficulty.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Ritual {
    pub id: String,
    pub title: String,
    pub category: String,
    pub description: String,
    pub image_url: String,
    pub duration: String,
    pub difficulty: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Spiritual guide profile. The `symbol` string selects a display icon.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Guide {
    pub id: String,
    pub name: String,
    pub line: String,
    pub description: String,
    pub color: String,
    pub greeting: String,
    pub symbol: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Visitor testimonial shown on the home page.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Testimonial {
    pub id: String,
    pub name: String,
    pub role: String,
    pub text: String,
    pub avatar_url: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Comment on an article. `created_at` is assigned by the server on creation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Comment {
    pub id: String,
    pub name: String,
    pub text: String,
    pub created_at: u64,
}

/// Notification addressed to one device id or to [`GLOBAL_TARGET`].
///
/// The `timestamp` is supplied by the sender in epoch milliseconds, so feed
/// ordering is only as trustworthy as the sender's clock.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    pub id: String,
    pub target: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action_label: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub timestamp: u64,
}

/// Payment lifecycle states shared by transactions and subscriptions.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Paid,
    Pending,
    Refused,
    Refunded,
}

/// One-off payment recorded by the checkout collaborator.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub amount: f64,
    pub status: PaymentStatus,
    pub payment_method: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Recurring VIP membership.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Subscription {
    pub id: String,
    pub customer_name: String,
    pub customer_email: String,
    pub plan: String,
    pub amount: f64,
    pub status: PaymentStatus,
    #[serde(default)]
    pub created_at: u64,
}

/// Kind of content in the VIP area.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub enum VipContentType {
    Video,
    Ebook,
    ExclusiveRitual,
}

/// Member-only content item.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VipContent {
    pub id: String,
    pub title: String,
    pub content_type: VipContentType,
    pub description: String,
    pub url: String,
    pub thumbnail: String,
    #[serde(default)]
    pub exclusive: bool,
    #[serde(default)]
    pub created_at: u64,
}

/// Contact-form message delivered to the admin inbox.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub name: String,
    pub email: String,
    pub message: String,
    #[serde(default)]
    pub created_at: u64,
}

/// Per-device session record.
///
/// Replaces the original browser-local storage (device id, premium flag,
/// free-tier clock, theme) with an explicit persisted record so the usage
/// gate and theming stay testable without ambient state.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub id: String,
    #[serde(default)]
    pub premium: bool,
    /// Epoch milliseconds of the last free-tier reading, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_free_use_ms: Option<u64>,
    #[serde(default = "default_theme")]
    pub theme: String,
    #[serde(default)]
    pub created_at: u64,
}

fn default_theme() -> String {
    "dark".into()
}

impl DeviceProfile {
    /// Fresh non-premium profile with the default theme.
    pub fn new(id: String, created_at: u64) -> Self {
        Self {
            id,
            premium: false,
            last_free_use_ms: None,
            theme: default_theme(),
            created_at,
        }
    }
}
