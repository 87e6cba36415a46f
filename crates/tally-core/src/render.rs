use std::io::{self, IsTerminal, Write};

use anyhow::anyhow;
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use crate::config::Config;
use crate::datetime::format_local_date;
use crate::listing::{Category, Page, visible_page_numbers};
use crate::remote::{Post, User};
use crate::task::Task;
use crate::tasks::{TaskFilter, TaskStats};

const TITLE_WIDTH: usize = 48;

#[derive(Debug, Clone)]
pub struct Renderer {
    color: bool,
}

impl Renderer {
    pub fn new(cfg: &Config) -> anyhow::Result<Self> {
        let color_cfg = cfg.get("color").unwrap_or_else(|| "on".to_string());
        let color = match color_cfg.to_ascii_lowercase().as_str() {
            "on" | "yes" | "true" | "1" => io::stdout().is_terminal(),
            "off" | "no" | "false" | "0" => false,
            other => return Err(anyhow!("invalid color setting: {other}")),
        };

        Ok(Self { color })
    }

    pub fn plain() -> Self {
        Self { color: false }
    }

    #[tracing::instrument(skip(self, out, tasks, stats))]
    pub fn write_task_list<W: Write>(
        &self,
        out: &mut W,
        tasks: &[&Task],
        filter: TaskFilter,
        stats: &TaskStats,
    ) -> anyhow::Result<()> {
        let tabs = TaskFilter::ALL
            .iter()
            .map(|f| {
                let label = format!("{f} ({})", stats.count_for(*f));
                if *f == filter {
                    self.paint(&format!("[{label}]"), "1")
                } else {
                    label
                }
            })
            .collect::<Vec<_>>()
            .join("  ");
        writeln!(out, "{tabs}")?;
        writeln!(out)?;

        if tasks.is_empty() {
            writeln!(out, "{}", filter.empty_message())?;
            return Ok(());
        }

        let headers = vec![
            "ID".to_string(),
            "Done".to_string(),
            "Title".to_string(),
            "Created".to_string(),
            "Completed".to_string(),
        ];

        let rows = tasks
            .iter()
            .map(|task| {
                let id = self.paint(&task.short_id(), "33");
                let done = if task.completed {
                    self.paint("x", "32")
                } else {
                    " ".to_string()
                };
                let title = if task.completed {
                    self.paint(&task.title, "9")
                } else {
                    task.title.clone()
                };
                let completed = task
                    .completed_at
                    .map(|at| format_local_date(&at))
                    .unwrap_or_default();
                vec![id, done, title, format_local_date(&task.created_at), completed]
            })
            .collect();

        write_table(out, headers, rows)
    }

    pub fn write_stats<W: Write>(&self, out: &mut W, stats: &TaskStats) -> anyhow::Result<()> {
        writeln!(out, "Total      {}", stats.total)?;
        writeln!(out, "Active     {}", stats.active)?;
        writeln!(out, "Completed  {}", stats.completed)?;
        Ok(())
    }

    pub fn write_category_tabs<W: Write>(
        &self,
        out: &mut W,
        active: Category,
        counts: (usize, usize),
    ) -> anyhow::Result<()> {
        let posts = format!("{} ({})", Category::Posts.label(), counts.0);
        let users = format!("{} ({})", Category::Users.label(), counts.1);
        let (posts, users) = match active {
            Category::Posts => (self.paint(&format!("[{posts}]"), "1"), users),
            Category::Users => (posts, self.paint(&format!("[{users}]"), "1")),
        };
        writeln!(out, "{posts}  {users}")?;
        Ok(())
    }

    #[tracing::instrument(skip(self, out, page))]
    pub fn write_posts<W: Write>(&self, out: &mut W, page: &Page<Post>) -> anyhow::Result<()> {
        let headers = vec![
            "Post".to_string(),
            "User".to_string(),
            "Title".to_string(),
            "Body".to_string(),
        ];
        let rows = page
            .items
            .iter()
            .map(|post| {
                vec![
                    self.paint(&format!("#{}", post.id), "33"),
                    post.user_id.to_string(),
                    truncate(&post.title, TITLE_WIDTH),
                    truncate(&first_line(&post.body), TITLE_WIDTH),
                ]
            })
            .collect();
        write_table(out, headers, rows)?;
        self.write_pagination(out, page)
    }

    #[tracing::instrument(skip(self, out, page))]
    pub fn write_users<W: Write>(&self, out: &mut W, page: &Page<User>) -> anyhow::Result<()> {
        let headers = vec![
            "Name".to_string(),
            "Username".to_string(),
            "Email".to_string(),
            "Phone".to_string(),
            "Company".to_string(),
        ];
        let rows = page
            .items
            .iter()
            .map(|user| {
                vec![
                    user.name.clone(),
                    format!("@{}", user.username),
                    user.email.clone(),
                    user.phone.clone(),
                    self.paint(&user.company.name, "36"),
                ]
            })
            .collect();
        write_table(out, headers, rows)?;
        self.write_pagination(out, page)
    }

    /// Nothing is written for a single page.
    pub fn write_pagination<W: Write, T>(&self, out: &mut W, page: &Page<T>) -> anyhow::Result<()> {
        let (current_page, total_pages) = (page.current_page, page.total_pages);
        if total_pages <= 1 {
            return Ok(());
        }

        let buttons = visible_page_numbers(total_pages)
            .into_iter()
            .map(|n| {
                if n == current_page {
                    self.paint(&format!("[{n}]"), "1")
                } else {
                    n.to_string()
                }
            })
            .collect::<Vec<_>>()
            .join(" ");
        let previous = if page.has_previous() { "< prev" } else { "      " };
        let next = if page.has_next() { "next >" } else { "" };
        writeln!(out)?;
        writeln!(out, "{previous}  {buttons}  {next}  (page {current_page} of {total_pages})")?;
        Ok(())
    }

    pub fn write_error<W: Write>(&self, out: &mut W, message: &str) -> anyhow::Result<()> {
        writeln!(out, "{}", self.paint(&format!("Error: {message}"), "31"))?;
        writeln!(out, "Run the same command again to retry.")?;
        Ok(())
    }

    fn paint(&self, text: &str, code: &str) -> String {
        if !self.color {
            return text.to_string();
        }
        format!("\x1b[{code}m{text}\x1b[0m")
    }
}

fn first_line(text: &str) -> String {
    text.lines().next().unwrap_or_default().to_string()
}

fn truncate(text: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(text) <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in text.chars() {
        let w = UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w + 1 > max_width {
            break;
        }
        width += w;
        out.push(ch);
    }
    out.push('…');
    out
}

fn write_table<W: Write>(
    writer: &mut W,
    headers: Vec<String>,
    rows: Vec<Vec<String>>,
) -> anyhow::Result<()> {
    let column_count = headers.len();
    let mut widths = vec![0usize; column_count];

    for (idx, header) in headers.iter().enumerate() {
        widths[idx] = widths[idx].max(UnicodeWidthStr::width(header.as_str()));
    }

    for row in &rows {
        for (idx, cell) in row.iter().enumerate() {
            widths[idx] = widths[idx].max(UnicodeWidthStr::width(strip_ansi(cell).as_str()));
        }
    }

    let header_line = headers
        .iter()
        .enumerate()
        .map(|(idx, header)| format!("{:width$}", header, width = widths[idx]))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{}", header_line.trim_end())?;

    let rule = widths
        .iter()
        .map(|w| "-".repeat(*w))
        .collect::<Vec<_>>()
        .join(" ");
    writeln!(writer, "{rule}")?;

    for row in rows {
        let mut line = String::new();
        for (idx, cell) in row.iter().enumerate() {
            if idx > 0 {
                line.push(' ');
            }
            let visible_width = UnicodeWidthStr::width(strip_ansi(cell).as_str());
            let padding = widths[idx].saturating_sub(visible_width);
            line.push_str(cell);
            line.push_str(&" ".repeat(padding));
        }
        writeln!(writer, "{}", line.trim_end())?;
    }

    Ok(())
}

fn strip_ansi(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut escaped = false;

    for ch in s.chars() {
        if escaped {
            if ch == 'm' {
                escaped = false;
            }
            continue;
        }

        if ch == '\x1b' {
            escaped = true;
            continue;
        }

        out.push(ch);
    }

    out
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::{Renderer, strip_ansi, truncate, write_table};
    use crate::listing::paginate;
    use crate::remote::Post;
    use crate::task::Task;
    use crate::tasks::{TaskFilter, stats};

    fn render<F>(f: F) -> String
    where
        F: FnOnce(&mut Vec<u8>) -> anyhow::Result<()>,
    {
        let mut buf = Vec::new();
        f(&mut buf).expect("render");
        String::from_utf8(buf).expect("utf8")
    }

    #[test]
    fn table_columns_align_ignoring_ansi() {
        let out = render(|buf| {
            write_table(
                buf,
                vec!["A".to_string(), "B".to_string()],
                vec![
                    vec!["\x1b[33mlong\x1b[0m".to_string(), "x".to_string()],
                    vec!["s".to_string(), "y".to_string()],
                ],
            )
        });
        let lines: Vec<String> = out.lines().map(strip_ansi).collect();
        assert_eq!(lines[0], "A    B");
        assert_eq!(lines[1], "---- -");
        assert_eq!(lines[2], "long x");
        assert_eq!(lines[3], "s    y");
    }

    #[test]
    fn strip_ansi_removes_escapes() {
        assert_eq!(strip_ansi("\x1b[1mbold\x1b[0m"), "bold");
    }

    #[test]
    fn truncate_adds_ellipsis() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("abcdefghij", 5), "abcd…");
    }

    #[test]
    fn empty_task_list_shows_filter_message() {
        let renderer = Renderer::plain();
        let tasks: Vec<Task> = vec![];
        let out = render(|buf| {
            renderer.write_task_list(buf, &[], TaskFilter::Active, &stats(&tasks))
        });
        assert!(out.contains("[active (0)]"));
        assert!(out.contains("No active tasks. Great job!"));
    }

    #[test]
    fn task_list_shows_rows() {
        let renderer = Renderer::plain();
        let now = Utc::now();
        let mut done = Task::new("Buy milk".to_string(), now);
        done.toggle(now);
        let tasks = vec![done];
        let refs: Vec<&Task> = tasks.iter().collect();
        let out = render(|buf| renderer.write_task_list(buf, &refs, TaskFilter::All, &stats(&tasks)));
        assert!(out.contains("[all (1)]"));
        assert!(out.contains("completed (1)"));
        assert!(out.contains("Buy milk"));
        assert!(out.contains(&tasks[0].short_id()));
    }

    #[test]
    fn pagination_footer_only_for_multiple_pages() {
        let renderer = Renderer::plain();
        let posts: Vec<Post> = (1..=13)
            .map(|id| Post {
                user_id: 1,
                id,
                title: format!("title {id}"),
                body: "body".to_string(),
            })
            .collect();

        let out = render(|buf| renderer.write_posts(buf, &paginate(&posts, 2, 6)));
        assert!(out.contains("#7"));
        assert!(!out.contains("#6 "));
        assert!(out.contains("< prev  1 [2] 3  next >  (page 2 of 3)"));

        let out = render(|buf| renderer.write_posts(buf, &paginate(&posts, 3, 6)));
        assert!(out.contains("< prev  1 2 [3]"));
        assert!(!out.contains("next >"));

        let out = render(|buf| renderer.write_posts(buf, &paginate(&posts[..3], 1, 6)));
        assert!(!out.contains("page 1 of 1"));
    }
}
