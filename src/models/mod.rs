pub mod link;

pub use link::{Link, LinkDefinition, TargetUrl, UrlValue};
