//! Category taxonomy index.
//!
//! Category ids are catalog-local while category codes are shared, so moving a
//! category reference from one catalog to another goes id → code in the
//! reference catalog, then code → id in the target catalog.

use std::collections::{HashMap, HashSet};
use std::pin::pin;

use futures::StreamExt;
use tenant_clone_core::{Category, CatalogId, CategoryId, CategoryRef, ProductInCatalog, RequestContext};
use tracing::{debug, info, instrument};

use crate::api::{ApiError, CatalogApi};
use crate::pagination::offset_pages;

/// Id ↔ code lookups for the categories of one catalog.
#[derive(Debug, Clone, Default)]
pub struct CategoryIndex {
    by_id: HashMap<CategoryId, Category>,
    id_by_code: HashMap<String, CategoryId>,
}

impl CategoryIndex {
    /// Index a list of categories. Categories without an id or code are
    /// ignored.
    #[must_use]
    pub fn from_categories(categories: impl IntoIterator<Item = Category>) -> Self {
        let mut index = Self::default();
        for category in categories {
            index.insert(category);
        }
        index
    }

    fn insert(&mut self, category: Category) {
        let (Some(id), Some(code)) = (category.id, category.category_code.clone()) else {
            return;
        };
        self.id_by_code.insert(code, id);
        self.by_id.insert(id, category);
    }

    /// Category by id.
    #[must_use]
    pub fn get(&self, id: CategoryId) -> Option<&Category> {
        self.by_id.get(&id)
    }

    /// Code of a category id.
    #[must_use]
    pub fn code_of(&self, id: CategoryId) -> Option<&str> {
        self.by_id.get(&id).and_then(Category::code)
    }

    /// Id of a category code.
    #[must_use]
    pub fn id_of(&self, code: &str) -> Option<CategoryId> {
        self.id_by_code.get(code).copied()
    }

    /// Number of indexed categories.
    #[must_use]
    pub fn len(&self) -> usize {
        self.by_id.len()
    }

    /// Whether the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.by_id.is_empty()
    }
}

/// Category indexes for every catalog taking part in a run.
///
/// Built once at the start of a run and read-only afterwards.
#[derive(Debug, Clone, Default)]
pub struct TaxonomyIndex {
    catalogs: HashMap<CatalogId, CategoryIndex>,
}

impl TaxonomyIndex {
    /// Read every category of each catalog.
    ///
    /// `ctx` is extended with the catalog being read; duplicate catalog ids are
    /// read once.
    ///
    /// # Errors
    ///
    /// Returns the first page fetch error.
    #[instrument(skip(api, catalogs))]
    pub async fn build<A>(
        api: &A,
        ctx: RequestContext,
        catalogs: &[CatalogId],
        page_size: u32,
    ) -> Result<Self, ApiError>
    where
        A: CatalogApi + ?Sized,
    {
        let mut index = Self::default();
        for &catalog_id in catalogs {
            if index.catalogs.contains_key(&catalog_id) {
                continue;
            }
            let scoped = ctx.with_catalog(catalog_id);
            let mut catalog_index = CategoryIndex::default();
            let mut pages = pin!(offset_pages(page_size, |start, size| {
                api.categories(scoped, start, size)
            }));
            while let Some(page) = pages.next().await {
                for category in page? {
                    catalog_index.insert(category);
                }
            }
            info!(catalog_id = %catalog_id, categories = catalog_index.len(), "Indexed categories");
            index.catalogs.insert(catalog_id, catalog_index);
        }
        Ok(index)
    }

    /// Add a catalog index directly.
    pub fn insert(&mut self, catalog_id: CatalogId, index: CategoryIndex) {
        self.catalogs.insert(catalog_id, index);
    }

    /// Index of one catalog.
    #[must_use]
    pub fn catalog(&self, catalog_id: CatalogId) -> Option<&CategoryIndex> {
        self.catalogs.get(&catalog_id)
    }

    /// Translate a category id of `source` into the id of the category with
    /// the same code in `destination`.
    ///
    /// `None` when either catalog is unknown, the id is unknown in `source`,
    /// or `destination` has no category with that code.
    #[must_use]
    pub fn remap_reference(
        &self,
        source: CatalogId,
        destination: CatalogId,
        category_id: CategoryId,
    ) -> Option<CategoryId> {
        let code = self.catalogs.get(&source)?.code_of(category_id)?;
        self.catalogs.get(&destination)?.id_of(code)
    }

    /// Make `target`'s categories mirror `reference`'s, translated into
    /// `target`'s catalog.
    ///
    /// - a reference primary that is not among the reference's own categories
    ///   is ignored
    /// - unresolvable categories are dropped
    /// - the target list is only replaced when its membership differs
    /// - a resolved primary is moved to the front of the list
    /// - an empty list is stored as `None`
    ///
    /// Entries of the same catalog are left alone.
    pub fn remap_entry(&self, reference: &ProductInCatalog, target: &mut ProductInCatalog) {
        let from = reference.catalog_id;
        let to = target.catalog_id;
        if from == to {
            return;
        }

        let reference_ids = reference.category_ids();
        let reference_primary = reference
            .primary_category_id()
            .filter(|primary| reference_ids.contains(primary));

        let mut remapped: Vec<CategoryId> = Vec::with_capacity(reference_ids.len());
        for id in reference_ids {
            match self.remap_reference(from, to, id) {
                Some(mapped) if !remapped.contains(&mapped) => remapped.push(mapped),
                Some(_) => {}
                None => debug!(catalog_id = %to, category_id = %id, "No matching category"),
            }
        }

        let current: HashSet<CategoryId> = target.category_ids().into_iter().collect();
        let wanted: HashSet<CategoryId> = remapped.iter().copied().collect();
        let mut categories = if current == wanted {
            target.category_ids()
        } else {
            remapped
        };

        let primary = reference_primary.and_then(|id| self.remap_reference(from, to, id));
        match primary {
            Some(primary) => {
                categories.retain(|id| *id != primary);
                categories.insert(0, primary);
                target.primary_product_category = Some(CategoryRef::new(primary));
            }
            None => target.primary_product_category = None,
        }

        target.product_categories = if categories.is_empty() {
            None
        } else {
            Some(categories.into_iter().map(CategoryRef::new).collect())
        };
    }
}
