//! Client-page reads and employee mutations on top of an [`EmployeeApi`].
//!
//! The reconciler owns the query cache. Reads map a client page onto the
//! server pages behind it and cut the result to size; prefetches warm the
//! cache for pages the viewer is likely to open next; mutations drop every
//! cached page once the backend accepts them.

use std::collections::BTreeSet;
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use futures::future::try_join_all;

use crate::api::{ApiResult, EmployeeApi};
use crate::cache::{Lookup, QueryCache, DEFAULT_TTL};
use crate::domain::{
    ClientPage, ClientPageRequest, EmployeeFields, EmployeeId, EmployeeRecord, ServerPage,
    ServerPageKey,
};
use crate::pagination::{self, PageGeometry};

pub type PageCache = QueryCache<ServerPageKey, Arc<ServerPage>, crate::api::ApiError>;

#[derive(Clone, Copy, Debug)]
pub struct ReconcilerOptions {
    pub server_page_size: NonZeroUsize,
    pub cache_ttl: Duration,
    /// Warm neighbouring pages after every client page read.
    pub prefetch: bool,
}

impl ReconcilerOptions {
    pub fn new(server_page_size: NonZeroUsize) -> Self {
        Self {
            server_page_size,
            cache_ttl: DEFAULT_TTL,
            prefetch: true,
        }
    }
}

pub struct PageReconciler<A> {
    api: Arc<A>,
    cache: Arc<PageCache>,
    geometry: PageGeometry,
    prefetch: bool,
}

impl<A> Clone for PageReconciler<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            cache: Arc::clone(&self.cache),
            geometry: self.geometry,
            prefetch: self.prefetch,
        }
    }
}

impl<A: EmployeeApi> PageReconciler<A> {
    pub fn new(api: A, options: ReconcilerOptions) -> Self {
        Self::with_shared_api(Arc::new(api), options)
    }

    pub fn with_shared_api(api: Arc<A>, options: ReconcilerOptions) -> Self {
        Self {
            api,
            cache: Arc::new(QueryCache::new(options.cache_ttl)),
            geometry: PageGeometry::new(options.server_page_size),
            prefetch: options.prefetch,
        }
    }

    pub fn geometry(&self) -> PageGeometry {
        self.geometry
    }

    pub fn cache(&self) -> &PageCache {
        &self.cache
    }

    /// Server page through the cache; concurrent calls for one key share a fetch.
    pub async fn fetch(&self, key: ServerPageKey) -> ApiResult<Arc<ServerPage>> {
        let api = Arc::clone(&self.api);
        let load_key = key.clone();
        let (result, lookup) = self
            .cache
            .get_or_load_traced(&key, move || async move {
                api.fetch_page(load_key).await.map(Arc::new)
            })
            .await;
        match lookup {
            Lookup::Hit => log::debug!("cache hit: {key}"),
            Lookup::Joined => log::debug!("joined in-flight fetch: {key}"),
            Lookup::Loaded => log::debug!("fetched: {key}"),
        }
        result
    }

    /// Reads one client page, fetching every server page its window touches.
    ///
    /// Schedules background prefetches for the surrounding pages on success
    /// unless prefetching is disabled.
    pub async fn fetch_client_page(&self, request: &ClientPageRequest) -> ApiResult<ClientPage> {
        let page = self.read_client_page(request).await?;
        if self.prefetch {
            self.prefetch_around(request, page.last_page);
        }
        Ok(page)
    }

    async fn read_client_page(&self, request: &ClientPageRequest) -> ApiResult<ClientPage> {
        let size = request.page_size;
        let Some(window) = self.geometry.server_pages_for(request.page, size) else {
            return self.read_unreachable_page(request).await;
        };
        let server_pages: Vec<usize> = window.collect();
        let fetched = try_join_all(
            server_pages
                .iter()
                .map(|sp| self.fetch(request.server_key(*sp))),
        )
        .await?;

        let total_count = fetched.first().map(|p| p.total_count).unwrap_or(0);
        let employees = match fetched.as_slice() {
            [single] => self
                .geometry
                .slice_server_page(&single.employees, request.page, size)
                .to_vec(),
            _ => {
                let parts: Vec<(usize, &[EmployeeRecord])> = server_pages
                    .iter()
                    .copied()
                    .zip(fetched.iter().map(|p| p.employees.as_slice()))
                    .collect();
                self.geometry.assemble(request.page, size, &parts)
            }
        };

        Ok(ClientPage {
            page: request.page,
            page_size: size.get(),
            last_page: pagination::last_client_page(total_count, size),
            total_count,
            server_pages,
            employees,
        })
    }

    // The window starts beyond usize::MAX records, so it is past the end of
    // any list; page 0 still supplies the total.
    async fn read_unreachable_page(&self, request: &ClientPageRequest) -> ApiResult<ClientPage> {
        let first = self.fetch(request.server_key(0)).await?;
        Ok(ClientPage {
            page: request.page,
            page_size: request.page_size.get(),
            last_page: pagination::last_client_page(first.total_count, request.page_size),
            total_count: first.total_count,
            server_pages: Vec::new(),
            employees: Vec::new(),
        })
    }

    /// Server pages a prefetch around `request` would warm.
    pub fn prefetch_targets(&self, request: &ClientPageRequest, last_page: usize) -> BTreeSet<usize> {
        let shown = self.geometry.server_pages_for(request.page, request.page_size);
        pagination::compute_prefetch_set(request.page, last_page)
            .into_iter()
            .filter_map(|cp| self.geometry.server_pages_for(cp, request.page_size))
            .flatten()
            .filter(|sp| !shown.as_ref().is_some_and(|range| range.contains(sp)))
            .collect()
    }

    /// Fire-and-forget fetches for the pages around `request`.
    ///
    /// Each fetch goes through the shared cache, so a later real read of the
    /// same page joins it instead of issuing its own request. Failures are
    /// logged and dropped. Must be called from within a tokio runtime.
    pub fn prefetch_around(&self, request: &ClientPageRequest, last_page: usize) {
        let targets = self.prefetch_targets(request, last_page);
        if targets.is_empty() {
            return;
        }
        log::debug!("prefetching server pages {targets:?} around client page {}", request.page);
        for sp in targets {
            let this = self.clone();
            let key = request.server_key(sp);
            tokio::spawn(async move {
                if let Err(e) = this.fetch(key.clone()).await {
                    log::warn!("prefetch failed for {key}: {e}");
                }
            });
        }
    }

    pub async fn create(&self, fields: EmployeeFields) -> ApiResult<EmployeeRecord> {
        let record = self.api.create(fields).await?;
        self.cache.invalidate_all().await;
        log::info!("created employee {}", record.id);
        Ok(record)
    }

    pub async fn update(&self, record: EmployeeRecord) -> ApiResult<EmployeeRecord> {
        let updated = self.api.update(record).await?;
        self.cache.invalidate_all().await;
        log::info!("updated employee {}", updated.id);
        Ok(updated)
    }

    pub async fn delete(&self, id: EmployeeId) -> ApiResult<()> {
        self.api.delete(id.clone()).await?;
        self.cache.invalidate_all().await;
        log::info!("deleted employee {id}");
        Ok(())
    }
}
