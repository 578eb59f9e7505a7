table! {
    schema_migrations (version) {
        version -> Integer,
        applied_at -> Text,
    }
}

table! {
    songs (id) {
        id -> Integer,
        owner_id -> Integer,
        title -> Text,
        category -> Text,
        video_url -> Text,
    }
}

table! {
    users (id) {
        id -> Integer,
        username -> Text,
        hash -> Text,
        subdomain -> Nullable<Text>,
        display_name -> Nullable<Text>,
        avatar_url -> Nullable<Text>,
        intro -> Nullable<Text>,
        theme_color -> Nullable<Text>,
        channel_url -> Nullable<Text>,
        stream_url -> Nullable<Text>,
        background_url -> Nullable<Text>,
        button_color -> Nullable<Text>,
        back_to_top_url -> Nullable<Text>,
    }
}

joinable!(songs -> users (owner_id));

allow_tables_to_appear_in_same_query!(schema_migrations, songs, users,);
