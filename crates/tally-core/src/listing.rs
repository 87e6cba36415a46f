use std::fmt;
use std::str::FromStr;

use anyhow::anyhow;
use tracing::debug;

use crate::remote::{Post, User};

pub const PAGE_SIZE: usize = 6;
pub const MAX_PAGE_BUTTONS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Category {
  #[default]
  Posts,
  Users
}

impl Category {
  pub fn as_str(self) -> &'static str {
    match self {
      | Category::Posts => "posts",
      | Category::Users => "users"
    }
  }

  pub fn label(self) -> &'static str {
    match self {
      | Category::Posts => "Posts",
      | Category::Users => "Users"
    }
  }
}

impl fmt::Display for Category {
  fn fmt(
    &self,
    f: &mut fmt::Formatter<'_>
  ) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for Category {
  type Err = anyhow::Error;

  fn from_str(
    s: &str
  ) -> Result<Self, Self::Err> {
    match s
      .trim()
      .to_ascii_lowercase()
      .as_str()
    {
      | "posts" | "post" => {
        Ok(Category::Posts)
      }
      | "users" | "user" => {
        Ok(Category::Users)
      }
      | other => Err(anyhow!(
        "unknown category: {other} \
         (expected posts or users)"
      ))
    }
  }
}

/// `needle` must already be
/// lowercased.
pub fn post_matches(
  post: &Post,
  needle: &str
) -> bool {
  post
    .title
    .to_lowercase()
    .contains(needle)
    || post
      .body
      .to_lowercase()
      .contains(needle)
}

/// `needle` must already be
/// lowercased.
pub fn user_matches(
  user: &User,
  needle: &str
) -> bool {
  user
    .name
    .to_lowercase()
    .contains(needle)
    || user
      .email
      .to_lowercase()
      .contains(needle)
    || user
      .company
      .name
      .to_lowercase()
      .contains(needle)
}

/// Case-insensitive substring filter.
/// An empty term passes everything
/// through.
pub fn filter_items<'a, T>(
  items: &'a [T],
  term: &str,
  predicate: fn(&T, &str) -> bool
) -> Vec<&'a T> {
  if term.is_empty() {
    return items.iter().collect();
  }

  let needle = term.to_lowercase();
  items
    .iter()
    .filter(|item| {
      predicate(*item, &needle)
    })
    .collect()
}

pub fn filter_posts<'a>(
  posts: &'a [Post],
  term: &str
) -> Vec<&'a Post> {
  filter_items(posts, term, post_matches)
}

pub fn filter_users<'a>(
  users: &'a [User],
  term: &str
) -> Vec<&'a User> {
  filter_items(users, term, user_matches)
}

/// Never less than one, so an empty
/// result still has a first page.
pub fn total_pages(
  len: usize,
  page_size: usize
) -> usize {
  if page_size == 0 {
    return 1;
  }
  len.div_ceil(page_size).max(1)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
  pub items:          Vec<T>,
  pub current_page:   usize,
  pub total_pages:    usize,
  pub filtered_count: usize
}

impl<T> Page<T> {
  pub fn has_previous(&self) -> bool {
    self.current_page > 1
  }

  pub fn has_next(&self) -> bool {
    self.current_page
      < self.total_pages
  }
}

/// Slices `[(page-1)*size,
/// page*size)`. A page past the end
/// yields no items.
pub fn paginate<T: Clone>(
  items: &[T],
  page: usize,
  page_size: usize
) -> Page<T> {
  let page = page.max(1);
  let start = (page - 1)
    .saturating_mul(page_size)
    .min(items.len());
  let end = start
    .saturating_add(page_size)
    .min(items.len());

  Page {
    items:          items[start..end]
      .to_vec(),
    current_page:   page,
    total_pages:    total_pages(
      items.len(),
      page_size
    ),
    filtered_count: items.len()
  }
}

pub fn visible_page_numbers(
  total_pages: usize
) -> Vec<usize> {
  (1..=total_pages.min(MAX_PAGE_BUTTONS))
    .collect()
}

pub fn results_summary(
  category: Category,
  term: &str,
  filtered_count: usize
) -> String {
  if term.is_empty() {
    format!(
      "Total {category}: \
       {filtered_count}"
    )
  } else {
    format!(
      "Showing {filtered_count} \
       results for \"{term}\""
    )
  }
}

/// UI state of one list panel.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListViewState {
  pub category:     Category,
  pub search_term:  String,
  pub current_page: usize
}

impl Default for ListViewState {
  fn default() -> Self {
    Self {
      category:     Category::default(),
      search_term:  String::new(),
      current_page: 1
    }
  }
}

impl ListViewState {
  pub fn new(category: Category) -> Self {
    Self {
      category,
      ..Self::default()
    }
  }

  /// Also clears the search term.
  pub fn switch_category(
    &mut self,
    category: Category
  ) {
    debug!(from = %self.category, to = %category, "switching category");
    self.category = category;
    self.search_term.clear();
    self.reset_page();
  }

  pub fn set_search_term(
    &mut self,
    term: &str
  ) {
    if self.search_term != term {
      debug!(term, "search term changed");
    }
    self.search_term = term.to_string();
    self.reset_page();
  }

  pub fn reset_page(&mut self) {
    self.current_page = 1;
  }

  /// Clamps to `[1, total_pages]`.
  pub fn set_page(
    &mut self,
    page: usize,
    total_pages: usize
  ) {
    self.current_page =
      page.clamp(1, total_pages.max(1));
  }

  pub fn next_page(
    &mut self,
    total_pages: usize
  ) {
    self.set_page(
      self.current_page.saturating_add(1),
      total_pages
    );
  }

  pub fn previous_page(
    &mut self,
    total_pages: usize
  ) {
    self.set_page(
      self.current_page.saturating_sub(1),
      total_pages
    );
  }

  pub fn summary(
    &self,
    filtered_count: usize
  ) -> String {
    results_summary(
      self.category,
      &self.search_term,
      filtered_count
    )
  }
}
