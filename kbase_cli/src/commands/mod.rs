//! CLI subcommand implementations.

pub mod admin;
pub mod user;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Args;
use kbase_lib::{CachedTransport, Filters, PaginatedSorting, PaginationConfig, Sortable};

use crate::output::OutputFormat;

/// Shared state handed to every subcommand.
pub struct Context {
    pub transport: Arc<CachedTransport>,
    pub token: Option<String>,
    pub timeout: Duration,
    pub format: OutputFormat,
}

/// Paging, sorting and filtering flags common to list commands.
#[derive(Args, Debug, Clone)]
pub struct ListArgs {
    /// Page number; out-of-range values are clamped
    #[arg(long, default_value = "1", allow_negative_numbers = true)]
    pub page: i64,

    /// Results per page
    #[arg(long, default_value = "10")]
    pub page_size: usize,

    /// Never page past this many pages
    #[arg(long)]
    pub max_pages: Option<usize>,

    /// Field to sort by (e.g. username, created_at, size)
    #[arg(long)]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Filter sent to the server as key=value (repeatable)
    #[arg(long = "filter", value_name = "KEY=VALUE", value_parser = parse_filter)]
    pub filters: Vec<(String, String)>,
}

impl ListArgs {
    pub fn filter_map(&self) -> Filters {
        self.filters.iter().cloned().collect()
    }

    fn view(&self, total_items: usize) -> PaginatedSorting {
        let config = PaginationConfig::new(self.page_size).with_max_pages(self.max_pages);
        let mut view = PaginatedSorting::new(config, self.sort.as_deref());
        if self.desc {
            if let Some(key) = &self.sort {
                view.toggle_sort(key);
            }
        }
        view.go_to_page(self.page, total_items);
        view
    }
}

fn parse_filter(raw: &str) -> Result<(String, String), String> {
    let (key, value) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected KEY=VALUE, got '{}'", raw))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(format!("empty filter key in '{}'", raw));
    }
    Ok((key.to_string(), value.trim().to_string()))
}

/// Sorts and pages `items` per `args`, prints a page summary on stderr and
/// hands the visible slice to `print`.
pub fn show_page<T, F>(items: &[T], args: &ListArgs, label: &str, print: F) -> Result<()>
where
    T: Sortable,
    F: FnOnce(&[&T]) -> Result<()>,
{
    let page = args.view(items.len()).view(items);
    eprintln!(
        "Page {}/{} ({} total {})",
        page.current_page,
        page.total_pages.max(1),
        page.total_items,
        label
    );
    print(&page.items)
}
