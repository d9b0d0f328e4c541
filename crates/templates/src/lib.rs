//! `mailq-templates` — HTML rendering for queued emails.
//!
//! Rendering is pure: the same input always yields byte-identical output. The
//! only time-dependent piece (the footer year) is passed in by the caller.

pub mod catalog;
pub mod render;

pub use catalog::{TemplateName, BRAND_NAME, BRAND_TAGLINE};
pub use render::{render_default, render_email, render_template, strip_html, EmailContent};
