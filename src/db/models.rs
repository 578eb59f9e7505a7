use super::schema::{songs, users};
use diesel::{Insertable, Queryable};
use serde::{Deserialize, Serialize};

#[derive(Clone, Queryable, Debug, Serialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    #[serde(skip)]
    /// Hash is NOT serialized.
    pub hash: String,
    pub subdomain: Option<String>,
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub intro: Option<String>,
    pub theme_color: Option<String>,
    pub channel_url: Option<String>,
    pub stream_url: Option<String>,
    pub background_url: Option<String>,
    pub button_color: Option<String>,
    pub back_to_top_url: Option<String>,
}

impl User {
    pub const DEFAULT_THEME_COLOR: &'static str = "#fc9ee0";
}

#[derive(Clone, Insertable, Debug)]
#[table_name = "users"]
pub struct NewUser<'a> {
    pub username: &'a str,
    pub hash: &'a str,
    pub subdomain: &'a str,
    pub display_name: &'a str,
    pub theme_color: &'a str,
}

/// The nine profile fields a tenant may edit from the admin panel.
///
/// `PUT /api/site-info` overwrites all of them at once; a field the client
/// leaves out is written back as NULL, not preserved.
#[derive(Clone, Debug, Deserialize, AsChangeset)]
#[table_name = "users"]
#[changeset_options(treat_none_as_null = "true")]
pub struct ProfileChangeset {
    pub display_name: Option<String>,
    pub avatar_url: Option<String>,
    pub intro: Option<String>,
    pub theme_color: Option<String>,
    pub channel_url: Option<String>,
    pub stream_url: Option<String>,
    pub background_url: Option<String>,
    pub button_color: Option<String>,
    pub back_to_top_url: Option<String>,
}

#[derive(Clone, Queryable, Debug, Serialize)]
pub struct Song {
    pub id: i32,
    pub owner_id: i32,
    pub title: String,
    pub category: String,
    pub video_url: String,
}

impl Song {
    pub const DEFAULT_CATEGORY: &'static str = "default";
}

#[derive(Clone, Insertable, Debug)]
#[table_name = "songs"]
pub struct NewSong {
    pub owner_id: i32,
    pub title: String,
    pub category: String,
    pub video_url: String,
}
