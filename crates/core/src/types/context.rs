//! Request scoping.

use super::{CatalogId, MasterCatalogId, SiteId};

/// Which master catalog, catalog and site a remote call acts on.
///
/// The value is `Copy` and passed to every call. A write running in the
/// background owns its own copy, so moving the orchestrator on to the next
/// catalog pair can never change the scope of a call already in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct RequestContext {
    pub master_catalog: Option<MasterCatalogId>,
    pub catalog: Option<CatalogId>,
    pub site: Option<SiteId>,
}

impl RequestContext {
    /// A context with no selectors (tenant-wide calls).
    #[must_use]
    pub const fn tenant() -> Self {
        Self {
            master_catalog: None,
            catalog: None,
            site: None,
        }
    }

    /// Same context scoped to a master catalog.
    #[must_use]
    pub const fn with_master_catalog(self, master_catalog: MasterCatalogId) -> Self {
        Self {
            master_catalog: Some(master_catalog),
            ..self
        }
    }

    /// Same context scoped to a catalog.
    #[must_use]
    pub const fn with_catalog(self, catalog: CatalogId) -> Self {
        Self {
            catalog: Some(catalog),
            ..self
        }
    }

    /// Same context scoped to a site and its catalog.
    #[must_use]
    pub const fn with_site(self, site: SiteId, catalog: CatalogId) -> Self {
        Self {
            site: Some(site),
            catalog: Some(catalog),
            ..self
        }
    }
}
