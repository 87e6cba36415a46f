use tracing::{debug, instrument};

use crate::listing::{Category, ListViewState, PAGE_SIZE, Page, filter_posts, filter_users, paginate, total_pages};
use crate::remote::{Endpoints, FetchState, Post, ResourceFetcher, User};

/// What the remote panel shows for the active category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PanelView {
    Idle,
    Loading,
    Error(String),
    Posts(Page<Post>),
    Users(Page<User>),
}

/// Both remote collections plus the list view state that selects between
/// them.
#[derive(Debug)]
pub struct RemotePanel {
    posts: ResourceFetcher<Vec<Post>>,
    users: ResourceFetcher<Vec<User>>,
    state: ListViewState,
}

impl RemotePanel {
    pub fn new(client: reqwest::Client, endpoints: &Endpoints) -> Self {
        Self {
            posts: ResourceFetcher::new(client.clone(), endpoints.posts.clone()),
            users: ResourceFetcher::new(client, endpoints.users.clone()),
            state: ListViewState::default(),
        }
    }

    pub fn state(&self) -> &ListViewState {
        &self.state
    }

    pub fn posts(&self) -> &ResourceFetcher<Vec<Post>> {
        &self.posts
    }

    pub fn users(&self) -> &ResourceFetcher<Vec<User>> {
        &self.users
    }

    /// Initial load of both collections.
    #[instrument(skip(self))]
    pub async fn load_all(&mut self) {
        tokio::join!(self.posts.refetch(), self.users.refetch());
    }

    #[instrument(skip(self), fields(category = %self.state.category))]
    pub async fn refetch_active(&mut self) {
        match self.state.category {
            Category::Posts => self.posts.refetch().await,
            Category::Users => self.users.refetch().await,
        }
        self.clamp_page();
    }

    pub fn switch_category(&mut self, category: Category) {
        self.state.switch_category(category);
    }

    pub fn set_search_term(&mut self, term: &str) {
        self.state.set_search_term(term);
    }

    pub fn set_page(&mut self, page: usize) {
        let total = self.total_pages();
        self.state.set_page(page, total);
    }

    pub fn next_page(&mut self) {
        let total = self.total_pages();
        self.state.next_page(total);
    }

    pub fn previous_page(&mut self) {
        let total = self.total_pages();
        self.state.previous_page(total);
    }

    /// Loaded collection sizes as `(posts, users)`; zero when not loaded.
    pub fn counts(&self) -> (usize, usize) {
        (
            self.posts.data().map_or(0, Vec::len),
            self.users.data().map_or(0, Vec::len),
        )
    }

    pub fn filtered_count(&self) -> usize {
        match self.state.category {
            Category::Posts => self
                .posts
                .data()
                .map_or(0, |posts| filter_posts(posts, &self.state.search_term).len()),
            Category::Users => self
                .users
                .data()
                .map_or(0, |users| filter_users(users, &self.state.search_term).len()),
        }
    }

    pub fn total_pages(&self) -> usize {
        total_pages(self.filtered_count(), PAGE_SIZE)
    }

    pub fn summary(&self) -> String {
        self.state.summary(self.filtered_count())
    }

    pub fn view(&self) -> PanelView {
        let page = self.state.current_page;
        match self.state.category {
            Category::Posts => match self.posts.state() {
                FetchState::Idle => PanelView::Idle,
                FetchState::Loading => PanelView::Loading,
                FetchState::Error(message) => PanelView::Error(message.clone()),
                FetchState::Success(posts) => {
                    let filtered: Vec<Post> = filter_posts(posts, &self.state.search_term)
                        .into_iter()
                        .cloned()
                        .collect();
                    PanelView::Posts(paginate_clamped(&filtered, page))
                }
            },
            Category::Users => match self.users.state() {
                FetchState::Idle => PanelView::Idle,
                FetchState::Loading => PanelView::Loading,
                FetchState::Error(message) => PanelView::Error(message.clone()),
                FetchState::Success(users) => {
                    let filtered: Vec<User> = filter_users(users, &self.state.search_term)
                        .into_iter()
                        .cloned()
                        .collect();
                    PanelView::Users(paginate_clamped(&filtered, page))
                }
            },
        }
    }

    fn clamp_page(&mut self) {
        let total = self.total_pages();
        if self.state.current_page > total {
            debug!(page = self.state.current_page, total, "clamping page after reload");
        }
        self.state.set_page(self.state.current_page, total);
    }
}

fn paginate_clamped<T: Clone>(items: &[T], page: usize) -> Page<T> {
    let page = page.clamp(1, total_pages(items.len(), PAGE_SIZE));
    paginate(items, page, PAGE_SIZE)
}
