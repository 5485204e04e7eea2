// SQLite schema definitions. Timestamps are RFC 3339 text, list columns are JSON text.

diesel::table! {
    categories (id) {
        id -> Integer,
        name -> Text,
        emoji -> Nullable<Text>,
        description -> Nullable<Text>,
        channel_category_id -> Nullable<Text>,
        channel_name_template -> Nullable<Text>,
        allowed_roles -> Text,
        mention_role_id -> Nullable<Text>,
        initial_message -> Nullable<Text>,
        buttons_config -> Text,
        color -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    panels (id) {
        id -> Integer,
        name -> Text,
        title -> Nullable<Text>,
        description -> Nullable<Text>,
        color -> Text,
        image_url -> Nullable<Text>,
        thumbnail_url -> Nullable<Text>,
        footer -> Nullable<Text>,
        channel_id -> Nullable<Text>,
        message_id -> Nullable<Text>,
        panel_type -> Text,
        categories -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    tickets (id) {
        id -> Integer,
        ticket_number -> BigInt,
        user_id -> Text,
        username -> Nullable<Text>,
        category_id -> Nullable<Integer>,
        channel_id -> Nullable<Text>,
        status -> Text,
        priority -> Text,
        assigned_to -> Nullable<Text>,
        created_at -> Text,
        closed_at -> Nullable<Text>,
        messages_count -> Integer,
    }
}

diesel::table! {
    ticket_messages (id) {
        id -> Integer,
        ticket_id -> Integer,
        user_id -> Text,
        username -> Nullable<Text>,
        content -> Text,
        attachments -> Text,
        created_at -> Text,
    }
}

diesel::table! {
    settings (key) {
        key -> Text,
        value -> Text,
    }
}

diesel::joinable!(tickets -> categories (category_id));
diesel::joinable!(ticket_messages -> tickets (ticket_id));

diesel::allow_tables_to_appear_in_same_query!(
    categories,
    panels,
    tickets,
    ticket_messages,
    settings,
);
