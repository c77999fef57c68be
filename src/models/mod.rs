mod article;
mod bookmark;
mod reading;

pub use article::Article;
pub use bookmark::{Bookmark, NewBookmark};
pub use reading::ReadingMode;
