// opsdesk CLI library

pub mod commands;
pub mod error;
pub mod output;
pub mod router;
