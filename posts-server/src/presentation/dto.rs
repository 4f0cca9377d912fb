use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::domain::error::ValidationErrors;
use crate::domain::post::PostInput;

const FORM_FIELDS: [&str; 3] = ["image", "title", "content"];

#[derive(Debug, Deserialize)]
pub struct ListPostsQuery {
    #[serde(default = "default_page")]
    pub page: u32,
}

/// Text a user typed into a post form, echoed back when validation fails.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PostFormValues {
    pub title: String,
    pub content: String,
}

impl From<&PostInput> for PostFormValues {
    fn from(input: &PostInput) -> Self {
        Self {
            title: input.title.clone(),
            content: input.content.clone(),
        }
    }
}

/// Link targets for the pager under the post list.
#[derive(Debug, Serialize)]
pub struct PageLinks {
    pub current: u32,
    pub last: u32,
    pub previous: Option<u32>,
    pub next: Option<u32>,
}

/// Messages per form field. Every field has an entry so templates can loop
/// without checking for presence.
pub fn form_errors(errors: Option<&ValidationErrors>) -> BTreeMap<&'static str, Vec<String>> {
    let mut grouped = errors.map(ValidationErrors::by_field).unwrap_or_default();
    for field in FORM_FIELDS {
        grouped.entry(field).or_default();
    }
    grouped
}

fn default_page() -> u32 {
    1
}
