//! Immutable build configuration threaded through the orchestrator.

use std::path::{Path, PathBuf};

use buildtools_core::{HttpConfig, RepositoryKind};
use serde::{Deserialize, Serialize};

/// Directory under the root holding cache-keyed intermediates.
pub const WORK_DIR: &str = "work";

pub const DEFAULT_MANIFEST_URL: &str = "https://hub.spigotmc.org/versions/latest.json";
pub const DEFAULT_SERVER_JAR_URL: &str =
    "https://s3.amazonaws.com/Minecraft.Download/versions/{version}/minecraft_server.{version}.jar";
pub const DEFAULT_MAVEN_URL: &str = "http://static.spigotmc.org/maven/apache-maven-3.2.3-bin.zip";

/// Command-line switches. All default to off.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BuildFlags {
    /// Accept any TLS certificate on the build's HTTP client.
    pub disable_certificate_check: bool,
    /// Use the development manifest and leave the repositories untouched.
    pub dont_update: bool,
    /// Skip Maven compilation; patching still runs.
    pub skip_compile: bool,
    pub generate_source: bool,
    pub generate_docs: bool,
    /// Use the development manifest but still sync to `master`.
    pub dev: bool,
}

/// Remote endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteConfig {
    pub manifest_url: String,
    /// Server jar URL; `{version}` is replaced by the Minecraft version.
    pub server_jar_url: String,
    pub maven_url: String,
    pub build_data_url: String,
    pub bukkit_url: String,
    pub craftbukkit_url: String,
    pub spigot_url: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        let var = |name: &str, default: &str| std::env::var(name).unwrap_or_else(|_| default.to_string());
        let repo = |kind: RepositoryKind| var(kind.url_env_var(), kind.default_url());

        RemoteConfig {
            manifest_url: var("BUILDTOOLS_MANIFEST_URL", DEFAULT_MANIFEST_URL),
            server_jar_url: var("BUILDTOOLS_SERVER_JAR_URL", DEFAULT_SERVER_JAR_URL),
            maven_url: var("BUILDTOOLS_MAVEN_URL", DEFAULT_MAVEN_URL),
            build_data_url: repo(RepositoryKind::MappingData),
            bukkit_url: repo(RepositoryKind::Api),
            craftbukkit_url: repo(RepositoryKind::Implementation),
            spigot_url: repo(RepositoryKind::Distribution),
        }
    }
}

impl RemoteConfig {
    /// Read endpoints from the environment, falling back to upstream.
    pub fn from_env() -> Self {
        Self::default()
    }

    /// Clone URL for a repository.
    pub fn repository_url(&self, kind: RepositoryKind) -> &str {
        match kind {
            RepositoryKind::MappingData => &self.build_data_url,
            RepositoryKind::Api => &self.bukkit_url,
            RepositoryKind::Implementation => &self.craftbukkit_url,
            RepositoryKind::Distribution => &self.spigot_url,
        }
    }

    pub fn server_jar_url(&self, minecraft_version: &str) -> String {
        self.server_jar_url.replace("{version}", minecraft_version)
    }
}

/// Everything a build needs to know, fixed before the first step runs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Working directory. Repositories, `work/`, Maven and the collected
    /// jars all live directly beneath it.
    pub root: PathBuf,
    pub flags: BuildFlags,
    pub remote: RemoteConfig,
    pub http: HttpConfig,
}

impl BuildConfig {
    pub fn new(root: impl Into<PathBuf>, flags: BuildFlags) -> Self {
        Self::with_remote(root, flags, RemoteConfig::from_env())
    }

    pub fn with_remote(root: impl Into<PathBuf>, flags: BuildFlags, remote: RemoteConfig) -> Self {
        let http = HttpConfig {
            accept_invalid_certs: flags.disable_certificate_check,
            ..HttpConfig::default()
        };
        BuildConfig {
            root: root.into(),
            flags,
            remote,
            http,
        }
    }

    pub fn work_dir(&self) -> PathBuf {
        self.root.join(WORK_DIR)
    }

    pub fn repo_dir(&self, kind: RepositoryKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether the remote manifest is fetched.
    pub fn fetch_manifest(&self) -> bool {
        !self.flags.dont_update && !self.flags.dev
    }

    /// Whether repositories are synced to the manifest refs.
    pub fn sync_repositories(&self) -> bool {
        !self.flags.dont_update
    }
}
