//! Chapter splitting engine.
//!
//! Works entirely in terms of [`source::PageSource`] and
//! [`source::ChapterWriter`], so it can run against any backend that exposes
//! per-page text, sized words and page-range output.

pub mod offset;
pub mod pipeline;
pub mod project;
pub mod ranges;
pub mod report;
pub mod source;
pub mod toc;
