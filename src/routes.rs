pub use crate::auth::{change_password, login, logout, register};
pub use crate::pages::{admin_page, index};
pub use crate::site::{site_info, update_site_info};
pub use crate::songs::{add_song, delete_song, import_songs, list_songs};
pub use crate::uploads::upload_image;
