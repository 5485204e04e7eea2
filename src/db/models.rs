use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, NaiveDateTime, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_COLOR: &str = "#FF8C00";

static HEX_COLOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#?([0-9A-Fa-f]{6})$").expect("static color pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ValidationError(pub String);

/// Missing or blank colors fall back to the default; anything else must be `#RRGGBB`.
pub fn normalize_color(color: Option<&str>) -> Result<String, ValidationError> {
    let Some(raw) = color.map(str::trim).filter(|c| !c.is_empty()) else {
        return Ok(DEFAULT_COLOR.to_string());
    };

    HEX_COLOR
        .captures(raw)
        .map(|caps| format!("#{}", caps[1].to_ascii_uppercase()))
        .ok_or_else(|| ValidationError(format!("invalid color {raw:?}, expected #RRGGBB")))
}

fn require_name(name: &str) -> Result<String, ValidationError> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError("name cannot be empty".to_string()));
    }
    Ok(trimmed.to_string())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ButtonConfig {
    pub label: String,
    #[serde(default = "default_button_style")]
    pub style: String,
    #[serde(default)]
    pub emoji: Option<String>,
}

fn default_button_style() -> String {
    "primary".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub emoji: Option<String>,
    pub description: Option<String>,
    pub channel_category_id: Option<String>,
    pub channel_name_template: Option<String>,
    pub allowed_roles: Vec<String>,
    pub mention_role_id: Option<String>,
    pub initial_message: Option<String>,
    pub buttons_config: Vec<ButtonConfig>,
    pub color: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CategoryInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub emoji: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub channel_category_id: Option<String>,
    #[serde(default)]
    pub channel_name_template: Option<String>,
    #[serde(default)]
    pub allowed_roles: Vec<String>,
    #[serde(default)]
    pub mention_role_id: Option<String>,
    #[serde(default)]
    pub initial_message: Option<String>,
    #[serde(default)]
    pub buttons_config: Vec<ButtonConfig>,
    #[serde(default)]
    pub color: Option<String>,
}

impl CategoryInput {
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        self.name = require_name(&self.name)?;
        self.color = Some(normalize_color(self.color.as_deref())?);
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PanelType {
    #[default]
    Buttons,
    Dropdown,
}

impl PanelType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PanelType::Buttons => "buttons",
            PanelType::Dropdown => "dropdown",
        }
    }
}

impl FromStr for PanelType {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "buttons" => Ok(PanelType::Buttons),
            "dropdown" => Ok(PanelType::Dropdown),
            other => Err(ValidationError(format!("unknown panel type {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Panel {
    pub id: i64,
    pub name: String,
    pub title: Option<String>,
    pub description: Option<String>,
    pub color: String,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub footer: Option<String>,
    pub channel_id: Option<String>,
    pub message_id: Option<String>,
    pub panel_type: PanelType,
    pub categories: Vec<i64>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PanelInput {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub color: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default)]
    pub thumbnail_url: Option<String>,
    #[serde(default)]
    pub footer: Option<String>,
    #[serde(default)]
    pub channel_id: Option<String>,
    #[serde(default)]
    pub panel_type: PanelType,
    #[serde(default)]
    pub categories: Vec<i64>,
}

impl PanelInput {
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        self.name = require_name(&self.name)?;
        self.color = Some(normalize_color(self.color.as_deref())?);
        Ok(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Open,
    Closed,
}

impl TicketStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TicketStatus {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "open" => Ok(TicketStatus::Open),
            "closed" => Ok(TicketStatus::Closed),
            other => Err(ValidationError(format!("unknown ticket status {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TicketPriority {
    Low,
    #[default]
    Normal,
    High,
    Urgent,
}

impl TicketPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            TicketPriority::Low => "low",
            TicketPriority::Normal => "normal",
            TicketPriority::High => "high",
            TicketPriority::Urgent => "urgent",
        }
    }
}

impl FromStr for TicketPriority {
    type Err = ValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "low" => Ok(TicketPriority::Low),
            "normal" => Ok(TicketPriority::Normal),
            "high" => Ok(TicketPriority::High),
            "urgent" => Ok(TicketPriority::Urgent),
            other => Err(ValidationError(format!("unknown ticket priority {other:?}"))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ticket {
    pub id: i64,
    pub ticket_number: i64,
    pub user_id: String,
    pub username: Option<String>,
    pub category_id: Option<i64>,
    pub channel_id: Option<String>,
    pub status: TicketStatus,
    pub priority: TicketPriority,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
    pub messages_count: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketSummary {
    #[serde(flatten)]
    pub ticket: Ticket,
    pub category_name: Option<String>,
    pub category_emoji: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketDetail {
    #[serde(flatten)]
    pub summary: TicketSummary,
    pub messages: Vec<TicketMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TicketMessage {
    pub id: i64,
    pub ticket_id: i64,
    pub user_id: String,
    pub username: Option<String>,
    pub content: String,
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
}

/// Payload of the bot's `ticket-created` webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicket {
    pub ticket_number: i64,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub channel_id: Option<String>,
    /// RFC 3339, or a naive ISO timestamp taken as UTC. Defaults to now.
    #[serde(default)]
    pub created_at: Option<String>,
}

impl NewTicket {
    pub fn created_at(&self) -> Result<DateTime<Utc>, ValidationError> {
        match self.created_at.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
            None => Ok(Utc::now()),
            Some(raw) => parse_timestamp(raw)
                .ok_or_else(|| ValidationError(format!("invalid created_at {raw:?}"))),
        }
    }
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Payload of the bot's `ticket-message` webhook.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewTicketMessage {
    pub ticket_id: i64,
    pub user_id: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub content: String,
    #[serde(default)]
    pub attachments: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketUpdate {
    #[serde(default)]
    pub priority: Option<TicketPriority>,
    /// An empty string clears the assignee.
    #[serde(default)]
    pub assigned_to: Option<String>,
}

impl TicketUpdate {
    pub fn is_empty(&self) -> bool {
        self.priority.is_none() && self.assigned_to.is_none()
    }
}

#[derive(Debug, Clone)]
pub struct CloseOutcome {
    pub ticket: Ticket,
    pub already_closed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketStats {
    pub total: i64,
    pub open: i64,
    pub closed: i64,
    /// Whole percent of tickets closed, rounded down.
    pub resolution_rate: i64,
    pub avg_first_response_secs: Option<i64>,
}

impl TicketStats {
    pub fn new(total: i64, open: i64, closed: i64, avg_first_response_secs: Option<i64>) -> Self {
        Self {
            total,
            open,
            closed,
            resolution_rate: resolution_rate(total, closed),
            avg_first_response_secs,
        }
    }
}

pub fn resolution_rate(total: i64, closed: i64) -> i64 {
    if total <= 0 {
        return 0;
    }
    closed.saturating_mul(100) / total
}

/// Mean delay between a ticket opening and the first message from someone other than
/// its opener. `replies` must be in chronological order.
pub fn average_first_response(
    opened: &[(i64, String, DateTime<Utc>)],
    replies: &[(i64, String, DateTime<Utc>)],
) -> Option<i64> {
    let mut pending: HashMap<i64, (&str, DateTime<Utc>)> = opened
        .iter()
        .map(|(id, opener, at)| (*id, (opener.as_str(), *at)))
        .collect();

    let mut total = 0i64;
    let mut answered = 0i64;
    for (ticket_id, author, at) in replies {
        let Some((opener, opened_at)) = pending.get(ticket_id).copied() else {
            continue;
        };
        if opener == author {
            continue;
        }
        total += (*at - opened_at).num_seconds().max(0);
        answered += 1;
        pending.remove(ticket_id);
    }

    if answered == 0 {
        None
    } else {
        Some(total / answered)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettingsEntry {
    pub key: String,
    pub value: String,
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, Utc};
    use test_case::test_case;

    use super::{
        CategoryInput, DEFAULT_COLOR, NewTicket, PanelInput, TicketStats, TicketStatus,
        average_first_response, normalize_color, resolution_rate,
    };

    #[test_case(None, Ok(DEFAULT_COLOR) ; "missing uses default")]
    #[test_case(Some("  "), Ok(DEFAULT_COLOR) ; "blank uses default")]
    #[test_case(Some("#ff8c00"), Ok("#FF8C00") ; "lowercase is normalized")]
    #[test_case(Some("00AAFF"), Ok("#00AAFF") ; "hash is optional")]
    #[test_case(Some("#12345"), Err(()) ; "short hex is rejected")]
    #[test_case(Some("orange"), Err(()) ; "names are rejected")]
    fn color_normalization(input: Option<&str>, expected: Result<&str, ()>) {
        let result = normalize_color(input).map_err(|_| ());
        assert_eq!(result, expected.map(str::to_string));
    }

    #[test]
    fn category_requires_name() {
        let input = CategoryInput {
            name: "   ".to_string(),
            ..Default::default()
        };
        assert!(input.validated().is_err());
    }

    #[test]
    fn category_name_is_trimmed_and_color_defaulted() {
        let input = CategoryInput {
            name: " Support ".to_string(),
            ..Default::default()
        };
        let valid = input.validated().expect("valid category");
        assert_eq!(valid.name, "Support");
        assert_eq!(valid.color.as_deref(), Some(DEFAULT_COLOR));
    }

    #[test]
    fn panel_rejects_bad_color() {
        let input = PanelInput {
            name: "Main".to_string(),
            color: Some("#GGGGGG".to_string()),
            ..Default::default()
        };
        assert!(input.validated().is_err());
    }

    #[test_case(0, 0, 0 ; "no tickets means zero")]
    #[test_case(3, 1, 33 ; "rounds down")]
    #[test_case(3, 2, 66 ; "rounds down again")]
    #[test_case(4, 4, 100 ; "all closed")]
    fn resolution_rate_is_floored(total: i64, closed: i64, expected: i64) {
        assert_eq!(resolution_rate(total, closed), expected);
    }

    #[test]
    fn stats_with_no_tickets_do_not_divide_by_zero() {
        let stats = TicketStats::new(0, 0, 0, None);
        assert_eq!(stats.resolution_rate, 0);
        assert_eq!(stats.avg_first_response_secs, None);
    }

    #[test]
    fn naive_bot_timestamps_are_read_as_utc() {
        let ticket = NewTicket {
            ticket_number: 1,
            user_id: "u1".to_string(),
            username: None,
            category_id: None,
            channel_id: None,
            created_at: Some("2025-10-05T22:00:00".to_string()),
        };
        let created = ticket.created_at().expect("parses");
        assert_eq!(created.to_rfc3339(), "2025-10-05T22:00:00+00:00");

        let bad = NewTicket {
            created_at: Some("yesterday".to_string()),
            ..ticket
        };
        assert!(bad.created_at().is_err());
    }

    #[test]
    fn first_response_ignores_opener_and_later_replies() {
        let base = Utc::now();
        let opened = vec![
            (1, "u1".to_string(), base),
            (2, "u2".to_string(), base),
            (3, "u3".to_string(), base),
        ];
        let replies = vec![
            (1, "u1".to_string(), base + Duration::seconds(5)),
            (1, "staff".to_string(), base + Duration::seconds(60)),
            (1, "staff".to_string(), base + Duration::seconds(600)),
            (2, "staff".to_string(), base + Duration::seconds(120)),
            (3, "u3".to_string(), base + Duration::seconds(30)),
        ];

        assert_eq!(average_first_response(&opened, &replies), Some(90));
    }

    #[test]
    fn first_response_is_none_without_replies() {
        let opened = vec![(1, "u1".to_string(), Utc::now())];
        assert_eq!(average_first_response(&opened, &[]), None);
    }

    #[test]
    fn waiting_is_not_a_status() {
        assert!("waiting".parse::<TicketStatus>().is_err());
        assert_eq!("closed".parse::<TicketStatus>(), Ok(TicketStatus::Closed));
    }
}
