use serenity::all::{ButtonStyle, ReactionType};
use serenity::builder::{
    CreateActionRow, CreateButton, CreateEmbed, CreateEmbedFooter, CreateSelectMenu,
    CreateSelectMenuKind, CreateSelectMenuOption,
};

use crate::db::{Category, Panel, PanelType};

/// Discord caps a row at five buttons and a message at five rows.
const BUTTONS_PER_ROW: usize = 5;
const MAX_ROWS: usize = 5;
const MAX_SELECT_OPTIONS: usize = 25;

pub const SELECT_CUSTOM_ID: &str = "ticket_select";

/// Custom id the bot parses back into a category id.
pub fn button_custom_id(category_id: i64) -> String {
    format!("ticket_{category_id}")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelOption {
    pub category_id: i64,
    pub label: String,
    pub emoji: Option<String>,
    pub description: Option<String>,
    pub style: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PanelLayout {
    pub title: String,
    pub description: Option<String>,
    pub color: u32,
    pub image_url: Option<String>,
    pub thumbnail_url: Option<String>,
    pub footer: Option<String>,
    pub panel_type: PanelType,
    pub options: Vec<PanelOption>,
}

impl PanelLayout {
    pub fn build(panel: &Panel, categories: &[Category]) -> Self {
        let limit = match panel.panel_type {
            PanelType::Buttons => BUTTONS_PER_ROW * MAX_ROWS,
            PanelType::Dropdown => MAX_SELECT_OPTIONS,
        };

        let options = categories
            .iter()
            .take(limit)
            .map(|category| {
                let button = category.buttons_config.first();
                PanelOption {
                    category_id: category.id,
                    label: button
                        .map(|b| b.label.clone())
                        .filter(|label| !label.trim().is_empty())
                        .unwrap_or_else(|| category.name.clone()),
                    emoji: button
                        .and_then(|b| b.emoji.clone())
                        .or_else(|| category.emoji.clone())
                        .filter(|emoji| !emoji.trim().is_empty()),
                    description: category.description.clone(),
                    style: button
                        .map(|b| b.style.clone())
                        .unwrap_or_else(|| "primary".to_string()),
                }
            })
            .collect();

        Self {
            title: panel.title.clone().unwrap_or_else(|| panel.name.clone()),
            description: panel.description.clone(),
            color: parse_color(&panel.color),
            image_url: panel.image_url.clone(),
            thumbnail_url: panel.thumbnail_url.clone(),
            footer: panel.footer.clone(),
            panel_type: panel.panel_type,
            options,
        }
    }

    pub fn to_embed(&self) -> CreateEmbed {
        let mut embed = CreateEmbed::new().title(&self.title).color(self.color);

        if let Some(ref description) = self.description {
            embed = embed.description(description);
        }
        if let Some(ref url) = self.image_url {
            embed = embed.image(url);
        }
        if let Some(ref url) = self.thumbnail_url {
            embed = embed.thumbnail(url);
        }
        if let Some(ref footer) = self.footer {
            embed = embed.footer(CreateEmbedFooter::new(footer));
        }

        embed
    }

    pub fn to_components(&self) -> Vec<CreateActionRow> {
        if self.options.is_empty() {
            return Vec::new();
        }

        match self.panel_type {
            PanelType::Buttons => self
                .options
                .chunks(BUTTONS_PER_ROW)
                .map(|chunk| {
                    CreateActionRow::Buttons(chunk.iter().map(option_button).collect())
                })
                .collect(),
            PanelType::Dropdown => {
                let options = self.options.iter().map(select_option).collect();
                let menu = CreateSelectMenu::new(
                    SELECT_CUSTOM_ID,
                    CreateSelectMenuKind::String { options },
                )
                .placeholder("Choose a category");
                vec![CreateActionRow::SelectMenu(menu)]
            }
        }
    }
}

fn option_button(option: &PanelOption) -> CreateButton {
    let mut button = CreateButton::new(button_custom_id(option.category_id))
        .label(&option.label)
        .style(button_style(&option.style));
    if let Some(ref emoji) = option.emoji {
        button = button.emoji(ReactionType::Unicode(emoji.clone()));
    }
    button
}

fn select_option(option: &PanelOption) -> CreateSelectMenuOption {
    let mut entry = CreateSelectMenuOption::new(&option.label, option.category_id.to_string());
    if let Some(ref description) = option.description {
        entry = entry.description(description);
    }
    if let Some(ref emoji) = option.emoji {
        entry = entry.emoji(ReactionType::Unicode(emoji.clone()));
    }
    entry
}

fn button_style(style: &str) -> ButtonStyle {
    match style.to_ascii_lowercase().as_str() {
        "secondary" | "grey" | "gray" => ButtonStyle::Secondary,
        "success" | "green" => ButtonStyle::Success,
        "danger" | "red" => ButtonStyle::Danger,
        _ => ButtonStyle::Primary,
    }
}

/// Stored colors are already normalized `#RRGGBB`.
fn parse_color(color: &str) -> u32 {
    u32::from_str_radix(color.trim_start_matches('#'), 16).unwrap_or(0xFF8C00)
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{PanelLayout, button_custom_id, parse_color};
    use crate::db::models::ButtonConfig;
    use crate::db::{Category, Panel, PanelType};

    fn category(id: i64, name: &str, buttons: Vec<ButtonConfig>) -> Category {
        Category {
            id,
            name: name.to_string(),
            emoji: Some("📩".to_string()),
            description: None,
            channel_category_id: None,
            channel_name_template: None,
            allowed_roles: vec![],
            mention_role_id: None,
            initial_message: None,
            buttons_config: buttons,
            color: "#FF8C00".to_string(),
            created_at: Utc::now(),
        }
    }

    fn panel(panel_type: PanelType) -> Panel {
        Panel {
            id: 1,
            name: "support".to_string(),
            title: None,
            description: Some("Open a ticket".to_string()),
            color: "#00FF00".to_string(),
            image_url: None,
            thumbnail_url: None,
            footer: None,
            channel_id: Some("123".to_string()),
            message_id: None,
            panel_type,
            categories: vec![],
            created_at: Utc::now(),
        }
    }

    #[test]
    fn layout_prefers_button_config_over_category() {
        let categories = vec![
            category(3, "Billing", vec![]),
            category(
                9,
                "Support",
                vec![ButtonConfig {
                    label: "Get help".to_string(),
                    style: "success".to_string(),
                    emoji: Some("🆘".to_string()),
                }],
            ),
        ];

        let layout = PanelLayout::build(&panel(PanelType::Buttons), &categories);

        assert_eq!(layout.title, "support");
        assert_eq!(layout.color, 0x00FF00);
        assert_eq!(layout.options[0].label, "Billing");
        assert_eq!(layout.options[0].emoji.as_deref(), Some("📩"));
        assert_eq!(layout.options[0].style, "primary");
        assert_eq!(layout.options[1].label, "Get help");
        assert_eq!(layout.options[1].emoji.as_deref(), Some("🆘"));
        assert_eq!(layout.options[1].style, "success");
    }

    #[test]
    fn buttons_are_split_into_rows_of_five() {
        let categories: Vec<_> = (1..=7)
            .map(|id| category(id, &format!("c{id}"), vec![]))
            .collect();
        let layout = PanelLayout::build(&panel(PanelType::Buttons), &categories);
        assert_eq!(layout.to_components().len(), 2);

        let dropdown = PanelLayout::build(&panel(PanelType::Dropdown), &categories);
        assert_eq!(dropdown.to_components().len(), 1);
    }

    #[test]
    fn custom_ids_encode_category() {
        assert_eq!(button_custom_id(12), "ticket_12");
        assert_eq!(parse_color("#ff8c00"), 0xFF8C00);
    }
}
