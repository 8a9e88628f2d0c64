//! Page arithmetic between the backend's fixed server pages and the
//! viewer's client pages.
//!
//! Everything here is pure: the reconciler feeds it indices and fetched
//! records and gets back page numbers, slice bounds and prefetch targets.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::ops::RangeInclusive;

/// Client pages within this distance of either end use the edge prefetch policy.
const EDGE_ZONE: usize = 3;
/// Width of the block of pages prefetched at either end of the list.
const EDGE_SPAN: usize = 4;

/// Server page size for the lifetime of the process.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PageGeometry {
    server_page_size: NonZeroUsize,
}

impl PageGeometry {
    pub const fn new(server_page_size: NonZeroUsize) -> Self {
        Self { server_page_size }
    }

    pub const fn server_page_size(&self) -> usize {
        self.server_page_size.get()
    }

    /// Absolute `[start, end)` record offsets of a client page, or `None`
    /// when they do not fit in a `usize`.
    pub fn client_window(client_page: usize, client_page_size: NonZeroUsize) -> Option<(usize, usize)> {
        let start = client_page.checked_mul(client_page_size.get())?;
        let end = start.checked_add(client_page_size.get())?;
        Some((start, end))
    }

    /// Server page holding the first record of the client page.
    pub fn resolve_server_page(
        &self,
        client_page: usize,
        client_page_size: NonZeroUsize,
    ) -> Option<usize> {
        let (start, _) = Self::client_window(client_page, client_page_size)?;
        Some(start / self.server_page_size())
    }

    /// Client-relative `[start, end)` offsets inside the resolved server page.
    ///
    /// `end` wraps to the full page size when the window ends exactly on a
    /// server page boundary. When the window spills into the next server page
    /// `end <= start`; [`slice_server_page`](Self::slice_server_page) handles that.
    pub fn slice_bounds(
        &self,
        client_page: usize,
        client_page_size: NonZeroUsize,
    ) -> Option<(usize, usize)> {
        let sps = self.server_page_size();
        let (start, end) = Self::client_window(client_page, client_page_size)?;
        let end = match end % sps {
            0 => sps,
            end => end,
        };
        Some((start % sps, end))
    }

    /// Cuts the client page out of its resolved server page.
    ///
    /// A short final page truncates the slice. If the window straddles into
    /// the next server page, the slice runs to the end of this one and the
    /// caller supplies the rest. A window past `usize::MAX` is empty.
    pub fn slice_server_page<'a, T>(
        &self,
        records: &'a [T],
        client_page: usize,
        client_page_size: NonZeroUsize,
    ) -> &'a [T] {
        let Some((start, end)) = self.slice_bounds(client_page, client_page_size) else {
            return &[];
        };
        let end = if end <= start {
            self.server_page_size()
        } else {
            end
        };
        let end = end.min(records.len());
        records.get(start..end).unwrap_or(&[])
    }

    /// Every server page the client window touches.
    pub fn server_pages_for(
        &self,
        client_page: usize,
        client_page_size: NonZeroUsize,
    ) -> Option<RangeInclusive<usize>> {
        let sps = self.server_page_size();
        let (first_record, end) = Self::client_window(client_page, client_page_size)?;
        Some((first_record / sps)..=((end - 1) / sps))
    }

    /// Builds the client window from one or more consecutive server pages.
    ///
    /// `pages` pairs a server page index with its records. Pages outside the
    /// window contribute nothing, and short pages simply end the window early.
    pub fn assemble<T: Clone>(
        &self,
        client_page: usize,
        client_page_size: NonZeroUsize,
        pages: &[(usize, &[T])],
    ) -> Vec<T> {
        let sps = self.server_page_size();
        let Some((window_start, window_end)) = Self::client_window(client_page, client_page_size)
        else {
            return Vec::new();
        };

        let mut out = Vec::with_capacity(client_page_size.get());
        for (index, records) in pages.iter() {
            let Some(page_start) = index.checked_mul(sps) else {
                continue;
            };
            let page_end = page_start.saturating_add(records.len().min(sps));
            let from = window_start.max(page_start);
            let to = window_end.min(page_end);
            if from >= to {
                continue;
            }
            if let Some(slice) = records.get(from - page_start..to - page_start) {
                out.extend_from_slice(slice);
            }
        }
        out
    }
}

/// Index of the last client page for `total_count` records; 0 for an empty list.
pub fn last_client_page(total_count: u64, client_page_size: NonZeroUsize) -> usize {
    let size = client_page_size.get() as u64;
    if total_count == 0 {
        return 0;
    }
    ((total_count - 1) / size) as usize
}

/// Client pages worth fetching in the background while `current` is shown.
///
/// Near the start the first few pages and the last page are warmed; near the
/// end the last few pages and the first page; in the middle the immediate
/// neighbours plus both ends.
pub fn compute_prefetch_set(current: usize, last: usize) -> BTreeSet<usize> {
    let mut pages = BTreeSet::new();

    if current <= EDGE_ZONE {
        pages.extend((0..=EDGE_SPAN).filter(|p| *p != current && *p <= last));
        if last > EDGE_SPAN {
            pages.insert(last);
        }
    } else if current.saturating_add(EDGE_ZONE) >= last {
        pages.extend((last.saturating_sub(EDGE_SPAN)..=last).filter(|p| *p != current));
        if last > EDGE_SPAN {
            pages.insert(0);
        }
    } else {
        pages.insert(current - 1);
        pages.insert(current + 1);
        pages.insert(0);
        pages.insert(last);
    }

    pages
}
