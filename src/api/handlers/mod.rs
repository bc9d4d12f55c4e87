mod health;
mod photos;

pub use health::health;
pub use photos::{delete_photo, get_photo, list_photos, upload_photo};
