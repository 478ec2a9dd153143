//! Offset pagination over a chain.
//!
//! A [`Pager`] owns the paging state and asks a [`PageProvider`] for one page
//! at a time. [`ChainPageProvider`] adapts a built [`Chain`] into a provider,
//! so any chain whose input can be built from `(index, page_size)` pages for
//! free.
//!
//! ```text
//! Idle ──next()──► Loading ──► Idle        (full page)
//!                          └─► Exhausted   (short or empty page, or total reached)
//! ```

use crate::{
    chain::Chain,
    error::{MappingError, NodeError, Result},
    mapping::{Json, RawEncodable},
    node::BoxFut,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Number of items carried by a page.
pub trait PageLen {
    fn page_len(&self) -> usize;
}

impl<T> PageLen for Vec<T> {
    fn page_len(&self) -> usize {
        self.len()
    }
}

/// One loaded page.
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: T,
    pub len: usize,
}

impl<T: PageLen> Page<T> {
    pub fn new(items: T) -> Self {
        let len = items.page_len();
        Self { items, len }
    }
}

/// Loads the page starting at `index`.
pub trait PageProvider<T>: Send + Sync {
    fn provide<'a>(&'a self, index: usize, page_size: usize) -> BoxFut<'a, Result<Page<T>>>;
}

/// Default paging request: `{"offset": index, "limit": page_size}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OffsetPage {
    pub offset: usize,
    pub limit: usize,
}

impl RawEncodable for OffsetPage {
    fn to_raw(&self) -> std::result::Result<Json, MappingError> {
        crate::mapping::to_raw_via_serde(self)
    }
}

type MakeInput<I> = Arc<dyn Fn(usize, usize) -> I + Send + Sync>;

/// [`PageProvider`] backed by a chain.
pub struct ChainPageProvider<I, T> {
    chain: Chain<I, T>,
    make_input: MakeInput<I>,
}

impl<I, T> ChainPageProvider<I, T>
where
    I: Send + 'static,
    T: Send + 'static,
{
    /// Build each page's input with `make_input(index, page_size)`.
    pub fn new(
        chain: Chain<I, T>,
        make_input: impl Fn(usize, usize) -> I + Send + Sync + 'static,
    ) -> Self {
        Self {
            chain,
            make_input: Arc::new(make_input),
        }
    }
}

impl<T> ChainPageProvider<OffsetPage, T>
where
    T: Send + 'static,
{
    /// Provider for chains taking an [`OffsetPage`].
    pub fn offset(chain: Chain<OffsetPage, T>) -> Self {
        Self::new(chain, |offset, limit| OffsetPage { offset, limit })
    }
}

impl<I, T> PageProvider<T> for ChainPageProvider<I, T>
where
    I: Send + 'static,
    T: PageLen + Send + 'static,
{
    fn provide<'a>(&'a self, index: usize, page_size: usize) -> BoxFut<'a, Result<Page<T>>> {
        Box::pin(async move {
            let input = (self.make_input)(index, page_size);
            let done = self.chain.process(input).await;
            done.result.map(Page::new)
        })
    }
}

/// Snapshot of the paging position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PagerState {
    pub index: usize,
    pub page_size: usize,
    pub has_next: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PagerPhase {
    Idle,
    Loading,
    Exhausted,
}

/// Stateful driver for a [`PageProvider`].
///
/// `next` takes `&mut self`, so one pager can have only one page in flight;
/// share a pager behind a `tokio::sync::Mutex` to drive it from several
/// tasks.
pub struct Pager<T> {
    provider: Arc<dyn PageProvider<T>>,
    state: PagerState,
    saved: Vec<PagerState>,
    total: Option<usize>,
    phase: PagerPhase,
    on_over: Option<Box<dyn FnMut() + Send>>,
    over_fired: bool,
}

impl<T> std::fmt::Debug for Pager<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pager")
            .field("state", &self.state)
            .field("saved", &self.saved.len())
            .field("total", &self.total)
            .field("phase", &self.phase)
            .finish()
    }
}

impl<T: Send + 'static> Pager<T> {
    pub fn new(provider: Arc<dyn PageProvider<T>>, page_size: usize) -> Self {
        Self {
            provider,
            state: PagerState {
                index: 0,
                page_size,
                has_next: true,
            },
            saved: Vec::new(),
            total: None,
            phase: PagerPhase::Idle,
            on_over: None,
            over_fired: false,
        }
    }

    /// Stop once `index` reaches `total`, even if pages are full.
    pub fn with_total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// Called once when the pager first runs out of pages.
    pub fn on_over(mut self, f: impl FnMut() + Send + 'static) -> Self {
        self.on_over = Some(Box::new(f));
        self
    }

    pub fn set_total(&mut self, total: Option<usize>) {
        self.total = total;
    }

    /// Load the next page.
    ///
    /// Fails with [`NodeError::NoMorePages`] once exhausted. A failed load
    /// leaves the position unchanged so the same page can be retried.
    pub async fn next(&mut self) -> Result<T> {
        if !self.state.has_next {
            return Err(NodeError::NoMorePages);
        }

        self.phase = PagerPhase::Loading;
        let page = match self
            .provider
            .provide(self.state.index, self.state.page_size)
            .await
        {
            Ok(page) => page,
            Err(e) => {
                self.phase = PagerPhase::Idle;
                return Err(e);
            }
        };

        self.state.index += self.state.page_size;
        let reached_total = self.total.is_some_and(|t| self.state.index >= t);
        self.state.has_next =
            page.len != 0 && page.len >= self.state.page_size && !reached_total;
        tracing::debug!(
            index = self.state.index,
            len = page.len,
            has_next = self.state.has_next,
            "page loaded"
        );

        if self.state.has_next {
            self.phase = PagerPhase::Idle;
        } else {
            self.phase = PagerPhase::Exhausted;
            self.fire_over();
        }
        Ok(page.items)
    }

    fn fire_over(&mut self) {
        if self.over_fired {
            return;
        }
        self.over_fired = true;
        if let Some(f) = self.on_over.as_mut() {
            f();
        }
    }

    pub fn has_next(&self) -> bool {
        self.state.has_next
    }

    pub fn phase(&self) -> PagerPhase {
        self.phase
    }

    pub fn state(&self) -> PagerState {
        self.state
    }

    /// Back to the first page.
    pub fn renew(&mut self) {
        self.state.index = 0;
        self.state.has_next = true;
        self.phase = PagerPhase::Idle;
        self.over_fired = false;
    }

    pub fn save_state(&mut self) {
        self.saved.push(self.state);
    }

    /// Restore the most recently saved state. No-op when nothing is saved.
    pub fn restore_state(&mut self) {
        if let Some(state) = self.saved.pop() {
            self.state = state;
            self.phase = if state.has_next {
                PagerPhase::Idle
            } else {
                PagerPhase::Exhausted
            };
        }
    }

    pub fn clear_states(&mut self) {
        self.saved.clear();
    }
}
