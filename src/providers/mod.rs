//! Bug providers and the provider/service registry.
//!
//! Each provider may supply a [`Crawler`], an [`Indexer`] and a [`Pusher`].
//! The [`ProviderRegistry`] resolves `(provider, service)` pairs to those
//! handlers and wraps handler failures in a service-tagged [`BugError`].

pub mod datastore;
pub mod indexer;
pub mod issuetracker;
pub mod pusher;

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{info, warn};

use bugtrack_core::error::{BugError, Result};
use bugtrack_core::model::{Bug, Provider, Service};

use crate::config::Workspace;
use crate::storage::SqliteStorage;

pub use indexer::UrlIndexer;
pub use pusher::StampPusher;

/// Pulls bugs from a provider's native store into the local one.
pub trait Crawler {
    /// Fetch and upsert every record, returning the bugs that were created
    /// or changed alongside the tally.
    ///
    /// # Errors
    ///
    /// Returns the underlying feed, validation or storage error.
    fn crawl(&self, storage: &mut SqliteStorage) -> Result<Crawled>;
}

/// Builds URL lookup entries for a bug.
pub trait Indexer {
    /// Index `bug`, returning the mapping id, or `None` when the bug has no
    /// URL.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for an unparseable URL, or a storage error.
    fn index(&self, storage: &mut SqliteStorage, bug: &Bug) -> Result<Option<i64>>;
}

/// Writes local bug changes back out to a provider.
pub trait Pusher {
    /// Push bug `id` on behalf of `actor`, returning the stamped bug.
    ///
    /// # Errors
    ///
    /// Returns the lookup, update or outbox error.
    fn push(&self, storage: &mut SqliteStorage, id: i64, actor: &str) -> Result<Bug>;
}

/// Result of a single crawl.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CrawlReport {
    pub provider: Option<Provider>,
    pub fetched: usize,
    pub created: usize,
    pub updated: usize,
    pub unchanged: usize,
    pub indexed: usize,
}

/// What a crawler hands back to the registry.
#[derive(Debug, Default)]
pub struct Crawled {
    pub report: CrawlReport,
    /// Bugs created or updated during the crawl.
    pub changed: Vec<Bug>,
}

/// The service handlers a provider supplies.
#[derive(Default)]
pub struct ProviderServices {
    pub crawler: Option<Box<dyn Crawler>>,
    pub indexer: Option<Box<dyn Indexer>>,
    pub pusher: Option<Box<dyn Pusher>>,
}

/// A resolved handler.
pub enum Handler<'a> {
    Crawl(&'a dyn Crawler),
    Index(&'a dyn Indexer),
    Push(&'a dyn Pusher),
}

impl Handler<'_> {
    #[must_use]
    pub const fn service(&self) -> Service {
        match self {
            Self::Crawl(_) => Service::Crawl,
            Self::Index(_) => Service::Index,
            Self::Push(_) => Service::Push,
        }
    }
}

/// Static mapping from provider to its service handlers.
#[derive(Default)]
pub struct ProviderRegistry {
    providers: BTreeMap<Provider, ProviderServices>,
}

impl ProviderRegistry {
    /// An empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The built-in providers, configured from the workspace.
    #[must_use]
    pub fn from_workspace(workspace: &Workspace) -> Self {
        let mut registry = Self::new();
        registry.register(Provider::Datastore, datastore::services(&workspace.config));
        registry.register(
            Provider::IssueTracker,
            issuetracker::services(
                workspace.feed_path(),
                workspace.outbox_path(),
                &workspace.config,
            ),
        );
        registry
    }

    pub fn register(&mut self, provider: Provider, services: ProviderServices) {
        self.providers.insert(provider, services);
    }

    /// Providers with at least one registered service.
    #[must_use]
    pub fn providers(&self) -> Vec<Provider> {
        self.providers.keys().copied().collect()
    }

    fn services_for(&self, provider: Provider) -> Result<&ProviderServices> {
        self.providers
            .get(&provider)
            .ok_or_else(|| BugError::InvalidProvider {
                provider: provider.to_string(),
            })
    }

    fn unsupported(provider: Provider, service: Service) -> BugError {
        BugError::UnsupportedService {
            provider: provider.to_string(),
            service: service.to_string(),
        }
    }

    /// Resolve textual provider and service names to a handler.
    ///
    /// # Errors
    ///
    /// Returns `InvalidProvider` for an unknown or unregistered provider and
    /// `UnsupportedService` when the provider lacks the service.
    pub fn resolve(&self, provider: &str, service: &str) -> Result<Handler<'_>> {
        let provider: Provider = provider.parse()?;
        let service: Service = service.parse().map_err(|err| match err {
            BugError::UnsupportedService { service, .. } => BugError::UnsupportedService {
                provider: provider.to_string(),
                service,
            },
            other => other,
        })?;
        self.handler(provider, service)
    }

    /// Resolve a typed `(provider, service)` pair to a handler.
    ///
    /// # Errors
    ///
    /// As [`Self::resolve`].
    pub fn handler(&self, provider: Provider, service: Service) -> Result<Handler<'_>> {
        let services = self.services_for(provider)?;
        let handler = match service {
            Service::Crawl => services.crawler.as_deref().map(|c| Handler::Crawl(c)),
            Service::Index => services.indexer.as_deref().map(|i| Handler::Index(i)),
            Service::Push => services.pusher.as_deref().map(|p| Handler::Push(p)),
        };
        handler.ok_or_else(|| Self::unsupported(provider, service))
    }

    /// # Errors
    ///
    /// As [`Self::handler`].
    pub fn crawler(&self, provider: Provider) -> Result<&dyn Crawler> {
        match self.handler(provider, Service::Crawl)? {
            Handler::Crawl(crawler) => Ok(crawler),
            _ => Err(Self::unsupported(provider, Service::Crawl)),
        }
    }

    /// # Errors
    ///
    /// As [`Self::handler`].
    pub fn indexer(&self, provider: Provider) -> Result<&dyn Indexer> {
        match self.handler(provider, Service::Index)? {
            Handler::Index(indexer) => Ok(indexer),
            _ => Err(Self::unsupported(provider, Service::Index)),
        }
    }

    /// # Errors
    ///
    /// As [`Self::handler`].
    pub fn pusher(&self, provider: Provider) -> Result<&dyn Pusher> {
        match self.handler(provider, Service::Push)? {
            Handler::Push(pusher) => Ok(pusher),
            _ => Err(Self::unsupported(provider, Service::Push)),
        }
    }

    // ========================================================================
    // Service entry points
    // ========================================================================

    /// Crawl `provider`, then index every changed bug that has a URL when
    /// the provider has an indexer.
    ///
    /// # Errors
    ///
    /// Dispatch errors are returned as-is; handler failures are wrapped
    /// with kind `Crawl`.
    pub fn crawl(&self, storage: &mut SqliteStorage, provider: Provider) -> Result<CrawlReport> {
        let crawler = self.crawler(provider)?;
        let wrap = |err: BugError| BugError::service(provider.as_str(), Service::Crawl, err);

        let Crawled { mut report, changed } = crawler.crawl(storage).map_err(wrap)?;
        report.provider = Some(provider);

        if let Ok(indexer) = self.indexer(provider) {
            for bug in changed.iter().filter(|bug| bug.url.is_some()) {
                if indexer.index(storage, bug).map_err(wrap)?.is_some() {
                    report.indexed += 1;
                }
            }
        } else {
            warn!(%provider, "Provider has no indexer; crawled bugs left unindexed");
        }

        info!(
            %provider,
            fetched = report.fetched,
            created = report.created,
            updated = report.updated,
            unchanged = report.unchanged,
            indexed = report.indexed,
            "Crawl finished"
        );
        Ok(report)
    }

    /// Index bug `id` with its own provider's indexer.
    ///
    /// # Errors
    ///
    /// Lookup and dispatch errors are returned as-is; indexer failures are
    /// wrapped with kind `Index`.
    pub fn index(&self, storage: &mut SqliteStorage, id: i64) -> Result<Option<i64>> {
        let bug = storage.get_bug(id)?;
        let indexer = self.indexer(bug.provider)?;
        indexer
            .index(storage, &bug)
            .map_err(|err| BugError::service(bug.provider.as_str(), Service::Index, err))
    }

    /// Push bug `id` with its own provider's pusher.
    ///
    /// # Errors
    ///
    /// Lookup and dispatch errors are returned as-is; pusher failures are
    /// wrapped with kind `Push`.
    pub fn push(&self, storage: &mut SqliteStorage, id: i64, actor: &str) -> Result<Bug> {
        let provider = storage.get_bug(id)?.provider;
        let pusher = self.pusher(provider)?;
        pusher
            .push(storage, id, actor)
            .map_err(|err| BugError::service(provider.as_str(), Service::Push, err))
    }
}
