//! Tenant topology: sites, master catalogs and catalogs, plus the configured
//! source → destination pairs that drive a sync run.

use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::{CatalogId, MasterCatalogId, SiteId, TenantId};

/// A tenant document (`GET /platform/tenants/{id}`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Tenant {
    pub id: TenantId,
    #[serde(default)]
    pub sites: Vec<Site>,
    #[serde(default)]
    pub master_catalogs: Vec<MasterCatalog>,
}

impl Tenant {
    /// Look up a catalog across all master catalogs.
    #[must_use]
    pub fn catalog(&self, id: CatalogId) -> Option<&Catalog> {
        self.master_catalogs
            .iter()
            .flat_map(|master| master.catalogs.iter())
            .find(|catalog| catalog.id == id)
    }

    /// Look up a site.
    #[must_use]
    pub fn site(&self, id: SiteId) -> Option<&Site> {
        self.sites.iter().find(|site| site.id == id)
    }

    /// Distinct catalog ids referenced by the tenant's sites, ascending.
    #[must_use]
    pub fn site_catalog_ids(&self) -> Vec<CatalogId> {
        self.sites
            .iter()
            .map(|site| site.catalog_id)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }
}

/// A storefront site bound to one catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Site {
    pub id: SiteId,
    pub catalog_id: CatalogId,
    #[serde(default)]
    pub name: Option<String>,
}

/// A master catalog and the catalogs derived from it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasterCatalog {
    pub id: MasterCatalogId,
    #[serde(default)]
    pub catalogs: Vec<Catalog>,
}

/// A catalog. Immutable for the duration of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Catalog {
    pub id: CatalogId,
    pub default_currency_code: String,
    #[serde(default)]
    pub name: Option<String>,
}

/// A source → destination mapping, read-only during a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Pair<T> {
    pub source: T,
    pub destination: T,
}

impl<T> Pair<T> {
    /// Create a pair.
    pub const fn new(source: T, destination: T) -> Self {
        Self {
            source,
            destination,
        }
    }
}

/// Catalog-to-catalog mapping.
pub type CatalogPair = Pair<CatalogId>;

/// Site-to-site mapping.
pub type SitePair = Pair<SiteId>;
