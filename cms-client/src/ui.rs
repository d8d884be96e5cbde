//! Seams to whatever renders the editor: toasts and route changes.

pub const POSTS_ROUTE: &str = "/dashboard/posts";

pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
}

pub trait Navigator: Send + Sync {
    fn push(&self, route: &str);
}
