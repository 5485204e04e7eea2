use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use diesel::dsl::max;
use diesel::prelude::*;
use diesel::sqlite::SqliteConnection;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::db::manager::Pool;
use crate::db::schema_sqlite::{categories, panels, settings, ticket_messages, tickets};

use super::{
    DatabaseError,
    models::{
        Category, CategoryInput, CloseOutcome, NewTicket, NewTicketMessage, Panel, PanelInput,
        SettingsEntry, Ticket, TicketDetail, TicketMessage, TicketStats, TicketStatus,
        TicketSummary, TicketUpdate, average_first_response,
    },
};

// Fixed precision and a `Z` suffix keep lexical order equal to chronological order.
fn datetime_to_string(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn string_to_datetime(s: &str) -> Result<DateTime<Utc>, DatabaseError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| DatabaseError::Query(format!("invalid datetime format: {}", e)))
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String, DatabaseError> {
    serde_json::to_string(value).map_err(|e| DatabaseError::Query(format!("json encode: {e}")))
}

fn from_json<T: DeserializeOwned>(raw: &str, column: &str) -> Result<T, DatabaseError> {
    serde_json::from_str(raw)
        .map_err(|e| DatabaseError::Query(format!("invalid json in {column}: {e}")))
}

// SQLite rows use i32 keys; the API keeps i64. Out-of-range ids cannot exist.
fn row_id(id: i64) -> Option<i32> {
    i32::try_from(id).ok()
}

async fn with_connection<T, F>(pool: Pool, operation: F) -> Result<T, DatabaseError>
where
    T: Send + 'static,
    F: FnOnce(&mut SqliteConnection) -> Result<T, DatabaseError> + Send + 'static,
{
    tokio::task::spawn_blocking(move || {
        let mut conn = pool
            .get()
            .map_err(|e| DatabaseError::Connection(e.to_string()))?;
        operation(&mut *conn)
    })
    .await
    .map_err(|e| DatabaseError::Query(format!("database task failed: {e}")))?
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = categories)]
struct DbCategory {
    id: i32,
    name: String,
    emoji: Option<String>,
    description: Option<String>,
    channel_category_id: Option<String>,
    channel_name_template: Option<String>,
    allowed_roles: String,
    mention_role_id: Option<String>,
    initial_message: Option<String>,
    buttons_config: String,
    color: String,
    created_at: String,
}

impl DbCategory {
    fn to_category(&self) -> Result<Category, DatabaseError> {
        Ok(Category {
            id: self.id as i64,
            name: self.name.clone(),
            emoji: self.emoji.clone(),
            description: self.description.clone(),
            channel_category_id: self.channel_category_id.clone(),
            channel_name_template: self.channel_name_template.clone(),
            allowed_roles: from_json(&self.allowed_roles, "categories.allowed_roles")?,
            mention_role_id: self.mention_role_id.clone(),
            initial_message: self.initial_message.clone(),
            buttons_config: from_json(&self.buttons_config, "categories.buttons_config")?,
            color: self.color.clone(),
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = categories)]
#[diesel(treat_none_as_null = true)]
struct CategoryRow<'a> {
    name: &'a str,
    emoji: Option<&'a str>,
    description: Option<&'a str>,
    channel_category_id: Option<&'a str>,
    channel_name_template: Option<&'a str>,
    allowed_roles: String,
    mention_role_id: Option<&'a str>,
    initial_message: Option<&'a str>,
    buttons_config: String,
    color: &'a str,
}

impl<'a> CategoryRow<'a> {
    fn from_input(input: &'a CategoryInput) -> Result<Self, DatabaseError> {
        Ok(Self {
            name: &input.name,
            emoji: input.emoji.as_deref(),
            description: input.description.as_deref(),
            channel_category_id: input.channel_category_id.as_deref(),
            channel_name_template: input.channel_name_template.as_deref(),
            allowed_roles: to_json(&input.allowed_roles)?,
            mention_role_id: input.mention_role_id.as_deref(),
            initial_message: input.initial_message.as_deref(),
            buttons_config: to_json(&input.buttons_config)?,
            color: input.color.as_deref().unwrap_or(super::DEFAULT_COLOR),
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = panels)]
struct DbPanel {
    id: i32,
    name: String,
    title: Option<String>,
    description: Option<String>,
    color: String,
    image_url: Option<String>,
    thumbnail_url: Option<String>,
    footer: Option<String>,
    channel_id: Option<String>,
    message_id: Option<String>,
    panel_type: String,
    categories: String,
    created_at: String,
}

impl DbPanel {
    fn to_panel(&self) -> Result<Panel, DatabaseError> {
        Ok(Panel {
            id: self.id as i64,
            name: self.name.clone(),
            title: self.title.clone(),
            description: self.description.clone(),
            color: self.color.clone(),
            image_url: self.image_url.clone(),
            thumbnail_url: self.thumbnail_url.clone(),
            footer: self.footer.clone(),
            channel_id: self.channel_id.clone(),
            message_id: self.message_id.clone(),
            panel_type: self
                .panel_type
                .parse()
                .map_err(|e| DatabaseError::Query(format!("panels.panel_type: {e}")))?,
            categories: from_json(&self.categories, "panels.categories")?,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable, AsChangeset)]
#[diesel(table_name = panels)]
#[diesel(treat_none_as_null = true)]
struct PanelRow<'a> {
    name: &'a str,
    title: Option<&'a str>,
    description: Option<&'a str>,
    color: &'a str,
    image_url: Option<&'a str>,
    thumbnail_url: Option<&'a str>,
    footer: Option<&'a str>,
    channel_id: Option<&'a str>,
    panel_type: &'a str,
    categories: String,
}

impl<'a> PanelRow<'a> {
    fn from_input(input: &'a PanelInput) -> Result<Self, DatabaseError> {
        Ok(Self {
            name: &input.name,
            title: input.title.as_deref(),
            description: input.description.as_deref(),
            color: input.color.as_deref().unwrap_or(super::DEFAULT_COLOR),
            image_url: input.image_url.as_deref(),
            thumbnail_url: input.thumbnail_url.as_deref(),
            footer: input.footer.as_deref(),
            channel_id: input.channel_id.as_deref(),
            panel_type: input.panel_type.as_str(),
            categories: to_json(&input.categories)?,
        })
    }
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = tickets)]
struct DbTicket {
    id: i32,
    ticket_number: i64,
    user_id: String,
    username: Option<String>,
    category_id: Option<i32>,
    channel_id: Option<String>,
    status: String,
    priority: String,
    assigned_to: Option<String>,
    created_at: String,
    closed_at: Option<String>,
    messages_count: i32,
}

impl DbTicket {
    fn to_ticket(&self) -> Result<Ticket, DatabaseError> {
        Ok(Ticket {
            id: self.id as i64,
            ticket_number: self.ticket_number,
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            category_id: self.category_id.map(i64::from),
            channel_id: self.channel_id.clone(),
            status: self
                .status
                .parse()
                .map_err(|e| DatabaseError::Query(format!("tickets.status: {e}")))?,
            priority: self
                .priority
                .parse()
                .map_err(|e| DatabaseError::Query(format!("tickets.priority: {e}")))?,
            assigned_to: self.assigned_to.clone(),
            created_at: string_to_datetime(&self.created_at)?,
            closed_at: self.closed_at.as_deref().map(string_to_datetime).transpose()?,
            messages_count: self.messages_count as i64,
        })
    }

    fn to_summary(
        &self,
        category: Option<(String, Option<String>)>,
    ) -> Result<TicketSummary, DatabaseError> {
        let (category_name, category_emoji) = match category {
            Some((name, emoji)) => (Some(name), emoji),
            None => (None, None),
        };
        Ok(TicketSummary {
            ticket: self.to_ticket()?,
            category_name,
            category_emoji,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = tickets)]
struct NewTicketRow<'a> {
    ticket_number: i64,
    user_id: &'a str,
    username: Option<&'a str>,
    category_id: Option<i32>,
    channel_id: Option<&'a str>,
    status: &'a str,
    priority: &'a str,
    created_at: String,
    messages_count: i32,
}

#[derive(Debug, Clone, Queryable, Selectable)]
#[diesel(table_name = ticket_messages)]
struct DbTicketMessage {
    id: i32,
    ticket_id: i32,
    user_id: String,
    username: Option<String>,
    content: String,
    attachments: String,
    created_at: String,
}

impl DbTicketMessage {
    fn to_message(&self) -> Result<TicketMessage, DatabaseError> {
        Ok(TicketMessage {
            id: self.id as i64,
            ticket_id: self.ticket_id as i64,
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            content: self.content.clone(),
            attachments: from_json(&self.attachments, "ticket_messages.attachments")?,
            created_at: string_to_datetime(&self.created_at)?,
        })
    }
}

#[derive(Insertable)]
#[diesel(table_name = ticket_messages)]
struct NewTicketMessageRow<'a> {
    ticket_id: i32,
    user_id: &'a str,
    username: Option<&'a str>,
    content: &'a str,
    attachments: String,
    created_at: String,
}

#[derive(Debug, Clone, Queryable, Selectable, Insertable)]
#[diesel(table_name = settings)]
struct DbSetting {
    key: String,
    value: String,
}

fn load_ticket_row(conn: &mut SqliteConnection, ticket_id: i32) -> Result<DbTicket, DatabaseError> {
    tickets::table
        .find(ticket_id)
        .select(DbTicket::as_select())
        .first::<DbTicket>(conn)
        .optional()?
        .ok_or(DatabaseError::UnknownTicket(ticket_id as i64))
}

/// Returns the first id in `ids` that has no category row.
fn first_missing_category(
    conn: &mut SqliteConnection,
    ids: &[i64],
) -> Result<Option<i64>, DatabaseError> {
    let wanted: BTreeSet<i64> = ids.iter().copied().collect();
    let row_ids: Vec<i32> = wanted.iter().filter_map(|id| row_id(*id)).collect();
    let found: BTreeSet<i64> = categories::table
        .filter(categories::id.eq_any(row_ids))
        .select(categories::id)
        .load::<i32>(conn)?
        .into_iter()
        .map(i64::from)
        .collect();

    Ok(ids.iter().copied().find(|id| !found.contains(id)))
}

pub struct SqliteCategoryStore {
    pool: Pool,
}

impl SqliteCategoryStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::CategoryStore for SqliteCategoryStore {
    async fn list_categories(&self) -> Result<Vec<Category>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            categories::table
                .order((categories::created_at.desc(), categories::id.desc()))
                .select(DbCategory::as_select())
                .load::<DbCategory>(conn)?
                .iter()
                .map(DbCategory::to_category)
                .collect()
        })
        .await
    }

    async fn get_category(&self, id: i64) -> Result<Option<Category>, DatabaseError> {
        let Some(category_id) = row_id(id) else {
            return Ok(None);
        };
        with_connection(self.pool.clone(), move |conn| {
            categories::table
                .find(category_id)
                .select(DbCategory::as_select())
                .first::<DbCategory>(conn)
                .optional()?
                .map(|c| c.to_category())
                .transpose()
        })
        .await
    }

    async fn resolve_categories(&self, ids: &[i64]) -> Result<Vec<Category>, DatabaseError> {
        let ids = ids.to_vec();
        with_connection(self.pool.clone(), move |conn| {
            let row_ids: Vec<i32> = ids.iter().filter_map(|id| row_id(*id)).collect();
            let found: HashMap<i64, Category> = categories::table
                .filter(categories::id.eq_any(row_ids))
                .select(DbCategory::as_select())
                .load::<DbCategory>(conn)?
                .iter()
                .map(|c| c.to_category().map(|c| (c.id, c)))
                .collect::<Result<_, _>>()?;

            ids.iter()
                .map(|id| match found.get(id) {
                    Some(category) => Ok(category.clone()),
                    None => Err(DatabaseError::UnknownCategory(*id)),
                })
                .collect()
        })
        .await
    }

    async fn create_category(&self, input: &CategoryInput) -> Result<i64, DatabaseError> {
        let input = input.clone();
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                let row = CategoryRow::from_input(&input)?;
                diesel::insert_into(categories::table)
                    .values((&row, categories::created_at.eq(datetime_to_string(&Utc::now()))))
                    .execute(conn)?;

                categories::table
                    .select(max(categories::id))
                    .first::<Option<i32>>(conn)?
                    .map(i64::from)
                    .ok_or_else(|| DatabaseError::Query("category insert returned no id".into()))
            })
        })
        .await
    }

    async fn update_category(&self, id: i64, input: &CategoryInput) -> Result<(), DatabaseError> {
        let category_id = row_id(id).ok_or(DatabaseError::UnknownCategory(id))?;
        let input = input.clone();
        with_connection(self.pool.clone(), move |conn| {
            let row = CategoryRow::from_input(&input)?;
            let updated = diesel::update(categories::table.find(category_id))
                .set(&row)
                .execute(conn)?;
            if updated == 0 {
                return Err(DatabaseError::UnknownCategory(id));
            }
            Ok(())
        })
        .await
    }

    async fn delete_category(&self, id: i64) -> Result<(), DatabaseError> {
        let category_id = row_id(id).ok_or(DatabaseError::UnknownCategory(id))?;
        with_connection(self.pool.clone(), move |conn| {
            let deleted = diesel::delete(categories::table.find(category_id)).execute(conn)?;
            if deleted == 0 {
                return Err(DatabaseError::UnknownCategory(id));
            }
            Ok(())
        })
        .await
    }
}

pub struct SqlitePanelStore {
    pool: Pool,
}

impl SqlitePanelStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::PanelStore for SqlitePanelStore {
    async fn list_panels(&self) -> Result<Vec<Panel>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            panels::table
                .order((panels::created_at.desc(), panels::id.desc()))
                .select(DbPanel::as_select())
                .load::<DbPanel>(conn)?
                .iter()
                .map(DbPanel::to_panel)
                .collect()
        })
        .await
    }

    async fn get_panel(&self, id: i64) -> Result<Option<Panel>, DatabaseError> {
        let Some(panel_id) = row_id(id) else {
            return Ok(None);
        };
        with_connection(self.pool.clone(), move |conn| {
            panels::table
                .find(panel_id)
                .select(DbPanel::as_select())
                .first::<DbPanel>(conn)
                .optional()?
                .map(|p| p.to_panel())
                .transpose()
        })
        .await
    }

    async fn create_panel(&self, input: &PanelInput) -> Result<i64, DatabaseError> {
        let input = input.clone();
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                if let Some(missing) = first_missing_category(conn, &input.categories)? {
                    return Err(DatabaseError::UnknownCategory(missing));
                }

                let row = PanelRow::from_input(&input)?;
                diesel::insert_into(panels::table)
                    .values((&row, panels::created_at.eq(datetime_to_string(&Utc::now()))))
                    .execute(conn)?;

                panels::table
                    .select(max(panels::id))
                    .first::<Option<i32>>(conn)?
                    .map(i64::from)
                    .ok_or_else(|| DatabaseError::Query("panel insert returned no id".into()))
            })
        })
        .await
    }

    async fn update_panel(&self, id: i64, input: &PanelInput) -> Result<(), DatabaseError> {
        let panel_id = row_id(id).ok_or(DatabaseError::UnknownPanel(id))?;
        let input = input.clone();
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                if let Some(missing) = first_missing_category(conn, &input.categories)? {
                    return Err(DatabaseError::UnknownCategory(missing));
                }

                let row = PanelRow::from_input(&input)?;
                let updated = diesel::update(panels::table.find(panel_id))
                    .set(&row)
                    .execute(conn)?;
                if updated == 0 {
                    return Err(DatabaseError::UnknownPanel(id));
                }
                Ok(())
            })
        })
        .await
    }

    async fn delete_panel(&self, id: i64) -> Result<(), DatabaseError> {
        let panel_id = row_id(id).ok_or(DatabaseError::UnknownPanel(id))?;
        with_connection(self.pool.clone(), move |conn| {
            let deleted = diesel::delete(panels::table.find(panel_id)).execute(conn)?;
            if deleted == 0 {
                return Err(DatabaseError::UnknownPanel(id));
            }
            Ok(())
        })
        .await
    }

    async fn set_panel_message(&self, id: i64, message_id: &str) -> Result<(), DatabaseError> {
        let panel_id = row_id(id).ok_or(DatabaseError::UnknownPanel(id))?;
        let message_id = message_id.to_string();
        with_connection(self.pool.clone(), move |conn| {
            let updated = diesel::update(panels::table.find(panel_id))
                .set(panels::message_id.eq(Some(message_id)))
                .execute(conn)?;
            if updated == 0 {
                return Err(DatabaseError::UnknownPanel(id));
            }
            Ok(())
        })
        .await
    }
}

pub struct SqliteTicketStore {
    pool: Pool,
}

impl SqliteTicketStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::TicketStore for SqliteTicketStore {
    async fn create_ticket(
        &self,
        ticket: &NewTicket,
        created_at: DateTime<Utc>,
    ) -> Result<Ticket, DatabaseError> {
        let ticket = ticket.clone();
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                let taken = tickets::table
                    .filter(tickets::ticket_number.eq(ticket.ticket_number))
                    .select(tickets::id)
                    .first::<i32>(conn)
                    .optional()?;
                if taken.is_some() {
                    return Err(DatabaseError::DuplicateTicketNumber(ticket.ticket_number));
                }

                let category_id = match ticket.category_id {
                    Some(id) => {
                        if first_missing_category(conn, &[id])?.is_some() {
                            return Err(DatabaseError::UnknownCategory(id));
                        }
                        row_id(id)
                    }
                    None => None,
                };

                let row = NewTicketRow {
                    ticket_number: ticket.ticket_number,
                    user_id: &ticket.user_id,
                    username: ticket.username.as_deref(),
                    category_id,
                    channel_id: ticket.channel_id.as_deref(),
                    status: TicketStatus::Open.as_str(),
                    priority: super::TicketPriority::default().as_str(),
                    created_at: datetime_to_string(&created_at),
                    messages_count: 0,
                };
                diesel::insert_into(tickets::table)
                    .values(&row)
                    .execute(conn)?;

                tickets::table
                    .filter(tickets::ticket_number.eq(ticket.ticket_number))
                    .select(DbTicket::as_select())
                    .first::<DbTicket>(conn)?
                    .to_ticket()
            })
        })
        .await
    }

    async fn append_message(
        &self,
        message: &NewTicketMessage,
    ) -> Result<TicketMessage, DatabaseError> {
        let ticket_id =
            row_id(message.ticket_id).ok_or(DatabaseError::UnknownTicket(message.ticket_id))?;
        let message = message.clone();
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                load_ticket_row(conn, ticket_id)?;

                let row = NewTicketMessageRow {
                    ticket_id,
                    user_id: &message.user_id,
                    username: message.username.as_deref(),
                    content: &message.content,
                    attachments: to_json(&message.attachments)?,
                    created_at: datetime_to_string(&Utc::now()),
                };
                diesel::insert_into(ticket_messages::table)
                    .values(&row)
                    .execute(conn)?;

                diesel::update(tickets::table.find(ticket_id))
                    .set(tickets::messages_count.eq(tickets::messages_count + 1))
                    .execute(conn)?;

                let message_id = ticket_messages::table
                    .select(max(ticket_messages::id))
                    .first::<Option<i32>>(conn)?
                    .ok_or_else(|| DatabaseError::Query("message insert returned no id".into()))?;

                ticket_messages::table
                    .find(message_id)
                    .select(DbTicketMessage::as_select())
                    .first::<DbTicketMessage>(conn)?
                    .to_message()
            })
        })
        .await
    }

    async fn close_ticket(&self, id: i64) -> Result<CloseOutcome, DatabaseError> {
        let ticket_id = row_id(id).ok_or(DatabaseError::UnknownTicket(id))?;
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                let current = load_ticket_row(conn, ticket_id)?.to_ticket()?;
                if current.status == TicketStatus::Closed {
                    return Ok(CloseOutcome {
                        ticket: current,
                        already_closed: true,
                    });
                }

                diesel::update(tickets::table.find(ticket_id))
                    .set((
                        tickets::status.eq(TicketStatus::Closed.as_str()),
                        tickets::closed_at.eq(Some(datetime_to_string(&Utc::now()))),
                    ))
                    .execute(conn)?;

                Ok(CloseOutcome {
                    ticket: load_ticket_row(conn, ticket_id)?.to_ticket()?,
                    already_closed: false,
                })
            })
        })
        .await
    }

    async fn update_ticket(&self, id: i64, update: &TicketUpdate) -> Result<Ticket, DatabaseError> {
        let ticket_id = row_id(id).ok_or(DatabaseError::UnknownTicket(id))?;
        let update = update.clone();
        with_connection(self.pool.clone(), move |conn| {
            conn.immediate_transaction(|conn| {
                load_ticket_row(conn, ticket_id)?;

                if let Some(priority) = update.priority {
                    diesel::update(tickets::table.find(ticket_id))
                        .set(tickets::priority.eq(priority.as_str()))
                        .execute(conn)?;
                }

                if let Some(assignee) = update.assigned_to.as_deref() {
                    let assignee = Some(assignee.trim()).filter(|a| !a.is_empty());
                    diesel::update(tickets::table.find(ticket_id))
                        .set(tickets::assigned_to.eq(assignee))
                        .execute(conn)?;
                }

                load_ticket_row(conn, ticket_id)?.to_ticket()
            })
        })
        .await
    }

    async fn get_ticket(&self, id: i64) -> Result<Option<TicketDetail>, DatabaseError> {
        let Some(ticket_id) = row_id(id) else {
            return Ok(None);
        };
        with_connection(self.pool.clone(), move |conn| {
            let row = tickets::table
                .left_join(categories::table)
                .filter(tickets::id.eq(ticket_id))
                .select((
                    DbTicket::as_select(),
                    (categories::name, categories::emoji).nullable(),
                ))
                .first::<(DbTicket, Option<(String, Option<String>)>)>(conn)
                .optional()?;

            let Some((ticket, category)) = row else {
                return Ok(None);
            };

            let messages = ticket_messages::table
                .filter(ticket_messages::ticket_id.eq(ticket_id))
                .order((ticket_messages::created_at.asc(), ticket_messages::id.asc()))
                .select(DbTicketMessage::as_select())
                .load::<DbTicketMessage>(conn)?
                .iter()
                .map(DbTicketMessage::to_message)
                .collect::<Result<Vec<_>, _>>()?;

            Ok(Some(TicketDetail {
                summary: ticket.to_summary(category)?,
                messages,
            }))
        })
        .await
    }

    async fn list_tickets(
        &self,
        status: TicketStatus,
        limit: i64,
    ) -> Result<Vec<TicketSummary>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            tickets::table
                .left_join(categories::table)
                .filter(tickets::status.eq(status.as_str()))
                .order((tickets::created_at.desc(), tickets::id.desc()))
                .limit(limit)
                .select((
                    DbTicket::as_select(),
                    (categories::name, categories::emoji).nullable(),
                ))
                .load::<(DbTicket, Option<(String, Option<String>)>)>(conn)?
                .into_iter()
                .map(|(ticket, category)| ticket.to_summary(category))
                .collect()
        })
        .await
    }

    async fn ticket_stats(&self) -> Result<TicketStats, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            let total = tickets::table.count().get_result::<i64>(conn)?;
            let open = tickets::table
                .filter(tickets::status.eq(TicketStatus::Open.as_str()))
                .count()
                .get_result::<i64>(conn)?;
            let closed = tickets::table
                .filter(tickets::status.eq(TicketStatus::Closed.as_str()))
                .count()
                .get_result::<i64>(conn)?;

            let opened = tickets::table
                .select((tickets::id, tickets::user_id, tickets::created_at))
                .load::<(i32, String, String)>(conn)?
                .into_iter()
                .map(|(id, user, at)| Ok((id as i64, user, string_to_datetime(&at)?)))
                .collect::<Result<Vec<_>, DatabaseError>>()?;
            let replies = ticket_messages::table
                .order((ticket_messages::created_at.asc(), ticket_messages::id.asc()))
                .select((
                    ticket_messages::ticket_id,
                    ticket_messages::user_id,
                    ticket_messages::created_at,
                ))
                .load::<(i32, String, String)>(conn)?
                .into_iter()
                .map(|(id, user, at)| Ok((id as i64, user, string_to_datetime(&at)?)))
                .collect::<Result<Vec<_>, DatabaseError>>()?;

            Ok(TicketStats::new(
                total,
                open,
                closed,
                average_first_response(&opened, &replies),
            ))
        })
        .await
    }
}

pub struct SqliteSettingsStore {
    pool: Pool,
}

impl SqliteSettingsStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl super::SettingsStore for SqliteSettingsStore {
    async fn get_setting(&self, key: &str) -> Result<Option<String>, DatabaseError> {
        let key = key.to_string();
        with_connection(self.pool.clone(), move |conn| {
            settings::table
                .find(key)
                .select(settings::value)
                .first::<String>(conn)
                .optional()
                .map_err(Into::into)
        })
        .await
    }

    async fn list_settings(&self) -> Result<Vec<SettingsEntry>, DatabaseError> {
        with_connection(self.pool.clone(), move |conn| {
            Ok(settings::table
                .order(settings::key.asc())
                .select(DbSetting::as_select())
                .load::<DbSetting>(conn)?
                .into_iter()
                .map(|row| SettingsEntry {
                    key: row.key,
                    value: row.value,
                })
                .collect())
        })
        .await
    }

    async fn put_setting(&self, key: &str, value: &str) -> Result<(), DatabaseError> {
        let row = DbSetting {
            key: key.to_string(),
            value: value.to_string(),
        };
        with_connection(self.pool.clone(), move |conn| {
            diesel::replace_into(settings::table)
                .values(&row)
                .execute(conn)
                .map(|_| ())
                .map_err(Into::into)
        })
        .await
    }

    async fn delete_setting(&self, key: &str) -> Result<bool, DatabaseError> {
        let key = key.to_string();
        with_connection(self.pool.clone(), move |conn| {
            diesel::delete(settings::table.find(key))
                .execute(conn)
                .map(|deleted| deleted > 0)
                .map_err(Into::into)
        })
        .await
    }
}
