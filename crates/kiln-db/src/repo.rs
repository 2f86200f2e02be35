//! Repository traits and PostgreSQL implementations.

pub mod build;
pub mod component;
pub mod logs;
pub mod template;

pub use build::{BuildRepo, BuildRow, PgBuildRepo};
pub use component::{ComponentRepo, PgComponentRepo};
pub use logs::{LogRepo, PgLogRepo};
pub use template::{PgTemplateRepo, TemplateRepo};
