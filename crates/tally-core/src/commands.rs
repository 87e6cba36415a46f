use std::io::Write;

use anyhow::Context;
use chrono::Utc;
use tracing::{debug, info, instrument, warn};

use crate::cli::Command;
use crate::config::Config;
use crate::listing::Category;
use crate::panel::{PanelView, RemotePanel};
use crate::remote::{Endpoints, build_client};
use crate::render::Renderer;
use crate::storage::StorageBackend;
use crate::tasks::TaskList;

#[instrument(skip(tasks, cfg, renderer, out))]
pub fn dispatch<B, W>(
    tasks: &mut TaskList<B>,
    cfg: &Config,
    renderer: &Renderer,
    command: Command,
    out: &mut W,
) -> anyhow::Result<()>
where
    B: StorageBackend,
    W: Write,
{
    let now = Utc::now();

    match command {
        Command::Add { title } => {
            let title = title.join(" ");
            match tasks.add(&title, now) {
                Some(id) => {
                    let short = tasks.find(id).map(|t| t.short_id()).unwrap_or_default();
                    writeln!(out, "Created task {short}.")?;
                }
                None => debug!("empty title; nothing added"),
            }
            Ok(())
        }
        Command::Toggle { id } => {
            let task = tasks.find_by_prefix(&id)?;
            let (id, short) = (task.id, task.short_id());
            tasks.toggle(id, now);
            let completed = tasks.find(id).is_some_and(|t| t.completed);
            if completed {
                writeln!(out, "Completed task {short}.")?;
            } else {
                writeln!(out, "Reopened task {short}.")?;
            }
            Ok(())
        }
        Command::Remove { id } => {
            let task = tasks.find_by_prefix(&id)?;
            let (id, short, title) = (task.id, task.short_id(), task.title.clone());
            tasks.remove(id);
            writeln!(out, "Deleted task {short} '{title}'.")?;
            Ok(())
        }
        Command::Clear => {
            let removed = tasks.clear();
            writeln!(out, "Deleted {removed} task(s).")?;
            Ok(())
        }
        Command::List { filter } => {
            let filter = match filter {
                Some(filter) => filter,
                None => cfg.default_filter()?,
            };
            let visible = tasks.filtered(filter);
            renderer.write_task_list(out, &visible, filter, &tasks.stats())
        }
        Command::Stats => renderer.write_stats(out, &tasks.stats()),
        Command::Browse {
            category,
            search,
            page,
        } => {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .context("failed to start async runtime")?;
            runtime.block_on(browse(cfg, renderer, category, search.as_deref(), page, out))
        }
        Command::ShowConfig => cmd_show_config(cfg, out),
    }
}

/// Loads both remote collections, applies the search term and page, and
/// renders the active category. Fetch failures are rendered, not returned.
#[instrument(skip(cfg, renderer, out))]
pub async fn browse<W: Write>(
    cfg: &Config,
    renderer: &Renderer,
    category: Category,
    search: Option<&str>,
    page: usize,
    out: &mut W,
) -> anyhow::Result<()> {
    let endpoints = Endpoints::from_base_url(&cfg.api_base_url())?;
    let client = build_client(cfg.api_timeout()?)?;

    let mut panel = RemotePanel::new(client, &endpoints);
    panel.switch_category(category);
    panel.load_all().await;

    if let Some(term) = search {
        panel.set_search_term(term);
    }
    panel.set_page(page);

    renderer.write_category_tabs(out, category, panel.counts())?;

    let view = panel.view();
    if page_out_of_range(&view, page, panel.state().current_page) {
        warn!(
            requested = page,
            shown = panel.state().current_page,
            "requested page out of range"
        );
    }

    match view {
        PanelView::Idle | PanelView::Loading => {
            writeln!(out, "Loading {category}...")?;
        }
        PanelView::Error(message) => {
            renderer.write_error(out, &message)?;
        }
        PanelView::Posts(page) => {
            writeln!(out, "{}", panel.summary())?;
            writeln!(out)?;
            renderer.write_posts(out, &page)?;
        }
        PanelView::Users(page) => {
            writeln!(out, "{}", panel.summary())?;
            writeln!(out)?;
            renderer.write_users(out, &page)?;
        }
    }

    info!(category = %category, "browse complete");
    Ok(())
}

/// Only a rendered page can have been clamped; a failed fetch has no pages.
fn page_out_of_range(view: &PanelView, requested: usize, shown: usize) -> bool {
    matches!(view, PanelView::Posts(_) | PanelView::Users(_)) && requested != shown
}

fn cmd_show_config<W: Write>(cfg: &Config, out: &mut W) -> anyhow::Result<()> {
    for file in &cfg.loaded_files {
        writeln!(out, "# loaded {}", file.display())?;
    }
    for (key, value) in cfg.iter() {
        writeln!(out, "{key}={value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{dispatch, page_out_of_range};
    use crate::cli::Command;
    use crate::config::Config;
    use crate::listing::paginate;
    use crate::panel::PanelView;
    use crate::remote::Post;
    use crate::render::Renderer;
    use crate::storage::MemoryStorage;
    use crate::tasks::{TaskFilter, TaskList};

    fn run(list: &mut TaskList<&MemoryStorage>, command: Command) -> anyhow::Result<String> {
        let mut buf = Vec::new();
        dispatch(list, &Config::default(), &Renderer::plain(), command, &mut buf)?;
        Ok(String::from_utf8(buf).expect("utf8"))
    }

    #[test]
    fn add_toggle_remove_through_commands() {
        let storage = MemoryStorage::new();
        let mut list = TaskList::open(&storage);

        let out = run(
            &mut list,
            Command::Add {
                title: vec!["Buy".to_string(), "milk".to_string()],
            },
        )
        .unwrap();
        assert!(out.starts_with("Created task "));
        assert_eq!(list.tasks()[0].title, "Buy milk");

        let short = list.tasks()[0].short_id();
        let out = run(&mut list, Command::Toggle { id: short.clone() }).unwrap();
        assert!(out.contains("Completed task"));
        assert_eq!(list.stats().completed, 1);

        let out = run(
            &mut list,
            Command::List {
                filter: Some(TaskFilter::Completed),
            },
        )
        .unwrap();
        assert!(out.contains("Buy milk"));

        let out = run(&mut list, Command::Remove { id: short }).unwrap();
        assert!(out.contains("Deleted task"));
        assert!(list.tasks().is_empty());
        assert_eq!(storage.raw("tasks"), Some("[]".to_string()));
    }

    #[test]
    fn blank_add_prints_nothing() {
        let storage = MemoryStorage::new();
        let mut list = TaskList::open(&storage);
        let out = run(
            &mut list,
            Command::Add {
                title: vec!["  ".to_string()],
            },
        )
        .unwrap();
        assert!(out.is_empty());
        assert!(list.tasks().is_empty());
    }

    #[test]
    fn unknown_id_is_reported() {
        let storage = MemoryStorage::new();
        let mut list = TaskList::open(&storage);
        assert!(run(&mut list, Command::Toggle { id: "abc".to_string() }).is_err());
    }

    #[test]
    fn stats_and_config_render() {
        let storage = MemoryStorage::new();
        let mut list = TaskList::open(&storage);
        list.add("a", chrono::Utc::now());

        let out = run(&mut list, Command::Stats).unwrap();
        assert!(out.contains("Total      1"));
        assert!(out.contains("Active     1"));

        let out = run(&mut list, Command::ShowConfig).unwrap();
        assert!(out.contains("list.filter=all"));
    }

    #[test]
    fn clamped_page_only_reported_for_rendered_pages() {
        let error = PanelView::Error("http://localhost/posts returned HTTP 500".to_string());
        assert!(!page_out_of_range(&error, 3, 1));
        assert!(!page_out_of_range(&PanelView::Loading, 3, 1));

        let posts: Vec<Post> = Vec::new();
        let view = PanelView::Posts(paginate(&posts, 1, 6));
        assert!(page_out_of_range(&view, 3, 1));
        assert!(!page_out_of_range(&view, 1, 1));
    }
}
