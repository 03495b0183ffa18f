//! The four managed working copies.

use std::path::Path;

use tracing::info;

use crate::domain::error::Result;
use crate::domain::manifest::VersionManifest;
use crate::domain::repository::RepositoryKind;
use crate::git::Repository;

/// Mapping-data, API, implementation and distribution working copies.
///
/// Working copies persist across runs as a cache: missing ones are cloned,
/// existing ones are reused in place.
#[derive(Debug, Clone)]
pub struct RepositorySet {
    mapping_data: Repository,
    api: Repository,
    implementation: Repository,
    distribution: Repository,
}

impl RepositorySet {
    /// Open or clone every repository under `root`, using `url_for` to
    /// resolve clone URLs.
    pub async fn open_or_clone<F>(root: &Path, url_for: F) -> Result<Self>
    where
        F: Fn(RepositoryKind) -> String,
    {
        let open = |kind: RepositoryKind| {
            let url = url_for(kind);
            let path = root.join(kind.dir_name());
            async move { Repository::open_or_clone(&url, path).await }
        };

        Ok(RepositorySet {
            mapping_data: open(RepositoryKind::MappingData).await?,
            api: open(RepositoryKind::Api).await?,
            implementation: open(RepositoryKind::Implementation).await?,
            distribution: open(RepositoryKind::Distribution).await?,
        })
    }

    pub fn get(&self, kind: RepositoryKind) -> &Repository {
        match kind {
            RepositoryKind::MappingData => &self.mapping_data,
            RepositoryKind::Api => &self.api,
            RepositoryKind::Implementation => &self.implementation,
            RepositoryKind::Distribution => &self.distribution,
        }
    }

    /// Sync each repository to its manifest ref, mapping data first.
    pub async fn sync(&self, manifest: &VersionManifest) -> Result<()> {
        for kind in RepositoryKind::ALL {
            let reference = manifest.ref_for(kind);
            info!(repo = %kind, reference, "Syncing repository");
            self.get(kind).sync(reference).await?;
        }
        Ok(())
    }
}
