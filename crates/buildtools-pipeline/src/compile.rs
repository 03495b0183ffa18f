//! Maven compilation of the API, implementation and distribution trees.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use buildtools_core::{Repository, RepositoryKind};
use tracing::info;

use crate::config::BuildFlags;
use crate::runner::{ToolCommand, ToolRun, ToolRunner};
use crate::toolchain::MavenHome;

/// Script in the distribution repository that layers its patches onto the
/// nested API and implementation clones.
pub const APPLY_PATCHES_SCRIPT: &str = "applyPatches.sh";

/// `mvn install:install-file` for the final mapped jar.
pub fn install_mapped_jar(
    maven: &MavenHome,
    root: &Path,
    mapped_jar: &Path,
    minecraft_version: &str,
) -> ToolCommand {
    maven.command(
        root,
        [
            "install:install-file".to_string(),
            format!("-Dfile={}", mapped_jar.display()),
            "-Dpackaging=jar".to_string(),
            "-DgroupId=org.spigotmc".to_string(),
            "-DartifactId=minecraft-server".to_string(),
            format!("-Dversion={minecraft_version}-SNAPSHOT"),
        ],
    )
}

/// Runs Maven across the repositories in dependency order.
pub struct Compiler {
    root: PathBuf,
    maven: MavenHome,
    flags: BuildFlags,
    runner: Arc<dyn ToolRunner>,
}

impl Compiler {
    pub fn new(root: impl Into<PathBuf>, maven: MavenHome, flags: BuildFlags, runner: Arc<dyn ToolRunner>) -> Self {
        Self {
            root: root.into(),
            maven,
            flags,
            runner,
        }
    }

    fn repo(&self, kind: RepositoryKind) -> PathBuf {
        self.root.join(kind.dir_name())
    }

    /// API then implementation builds. Empty with `skip-compile`.
    pub fn upstream_commands(&self) -> Vec<ToolCommand> {
        if self.flags.skip_compile {
            return Vec::new();
        }

        let api = self.repo(RepositoryKind::Api);
        let mut commands = vec![self.maven.command(&api, ["clean", "install"])];
        if self.flags.generate_docs {
            commands.push(self.maven.command(&api, ["javadoc:jar"]));
        }
        if self.flags.generate_source {
            commands.push(self.maven.command(&api, ["source:jar"]));
        }
        commands.push(
            self.maven
                .command(self.repo(RepositoryKind::Implementation), ["clean", "install"]),
        );
        commands
    }

    /// Patch script, then the distribution build unless `skip-compile`.
    pub fn distribution_commands(&self) -> Vec<ToolCommand> {
        let spigot = self.repo(RepositoryKind::Distribution);
        let mut commands = vec![ToolCommand::new("bash", &spigot).arg(APPLY_PATCHES_SCRIPT)];
        if !self.flags.skip_compile {
            commands.push(self.maven.command(&spigot, ["clean", "install"]));
        }
        commands
    }

    /// Clone the API and implementation working copies into the
    /// distribution repository, once.
    pub async fn prepare_distribution(&self) -> anyhow::Result<()> {
        let spigot = self.repo(RepositoryKind::Distribution);
        for kind in [RepositoryKind::Api, RepositoryKind::Implementation] {
            let source = self.repo(kind);
            let url = format!("file://{}", source.display());
            Repository::open_or_clone(&url, spigot.join(kind.dir_name()))
                .await
                .with_context(|| format!("failed to clone {kind} into {}", spigot.display()))?;
        }
        Ok(())
    }

    /// Full compile phase: distribution clones, upstream builds, then the
    /// distribution patch script and build.
    pub async fn run(&self) -> anyhow::Result<Vec<ToolRun>> {
        let mut runs = Vec::new();

        self.prepare_distribution().await?;
        if self.flags.skip_compile {
            info!("Skipping compilation");
        }
        for command in self.upstream_commands() {
            runs.push(self.run_step(&command).await?);
        }

        for command in self.distribution_commands() {
            runs.push(self.run_step(&command).await?);
        }
        info!(steps = runs.len(), "Compile phase complete");
        Ok(runs)
    }

    async fn run_step(&self, command: &ToolCommand) -> anyhow::Result<ToolRun> {
        info!(cwd = %command.cwd.display(), "Compiling");
        self.runner
            .run_checked(command)
            .await
            .with_context(|| format!("build step failed in {}", command.cwd.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fakes::FakeRunner;

    fn compiler(flags: BuildFlags) -> Compiler {
        Compiler::new(
            "/build",
            MavenHome::new("/build/apache-maven-3.2.3"),
            flags,
            Arc::new(FakeRunner::new()),
        )
    }

    fn summary(commands: &[ToolCommand]) -> Vec<String> {
        commands
            .iter()
            .map(|c| format!("{}: {}", c.cwd.display(), c.args[1..].join(" ")))
            .collect()
    }

    #[test]
    fn test_upstream_order() {
        let commands = compiler(BuildFlags::default()).upstream_commands();
        assert_eq!(
            summary(&commands),
            vec!["/build/Bukkit: clean install", "/build/CraftBukkit: clean install"]
        );
    }

    #[test]
    fn test_docs_and_sources_follow_api_build() {
        let flags = BuildFlags {
            generate_docs: true,
            generate_source: true,
            ..BuildFlags::default()
        };
        let commands = compiler(flags).upstream_commands();
        assert_eq!(
            summary(&commands),
            vec![
                "/build/Bukkit: clean install",
                "/build/Bukkit: javadoc:jar",
                "/build/Bukkit: source:jar",
                "/build/CraftBukkit: clean install",
            ]
        );
    }

    #[test]
    fn test_skip_compile_still_applies_distribution_patches() {
        let flags = BuildFlags {
            skip_compile: true,
            ..BuildFlags::default()
        };
        let compiler = compiler(flags);
        assert!(compiler.upstream_commands().is_empty());

        let commands = compiler.distribution_commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].display(), "bash applyPatches.sh");
        assert_eq!(commands[0].cwd, PathBuf::from("/build/Spigot"));
    }

    #[test]
    fn test_install_mapped_jar_command() {
        let maven = MavenHome::new("/build/apache-maven-3.2.3");
        let command = install_mapped_jar(
            &maven,
            Path::new("/build"),
            Path::new("/build/work/mapped.78922e03.jar"),
            "1.8",
        );
        assert_eq!(
            command.args[1..].join(" "),
            "install:install-file -Dfile=/build/work/mapped.78922e03.jar -Dpackaging=jar \
             -DgroupId=org.spigotmc -DartifactId=minecraft-server -Dversion=1.8-SNAPSHOT"
        );
    }
}
