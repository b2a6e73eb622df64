//! Configuration module

mod site;

pub use site::CheckConfig;
pub use site::CONFIG_FILE;
pub use site::MarkdownConfig;
pub use site::SiteConfig;
