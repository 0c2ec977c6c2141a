//! Article page scrapers.
//!
//! Feeds carry most of what the pipeline needs. Pages are only fetched for
//! the members of the story that was actually chosen:
//!
//! | Need | Function | Trigger |
//! |------|----------|---------|
//! | Story image | [`page::scrape_page_images`] | No member has a feed or inline image |
//! | Summary text | [`page::scrape_article_text`] | `scrape_article_text` is on and the RSS summary is trivial |
//!
//! Scrapes fan out with `futures::stream` and a failed page is logged and
//! skipped, never propagated.

pub mod page;
