//! Integration tests for the artifact pipeline and the full build, using
//! FakeRunner/FakeFetcher for external tools and real git for repositories.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Arc;

use buildtools_core::{BuildError, CacheKey, VersionInfo};
use buildtools_pipeline::fakes::{write_jar, FakeFetcher, FakeRunner};
use buildtools_pipeline::{
    ArtifactPipeline, BuildConfig, BuildFailed, BuildFlags, BuildOrchestrator, BuildState,
    PipelineStage, RemoteConfig, StageOutcome,
};

const SERVER_JAR_URL: &str = "http://test/minecraft_server.1.8.jar";
const VANILLA_FOO: &str = "package net.minecraft.server;\n\npublic class Foo {\n}\n";
const FOO_PATCH: &str =
    "@@ -1,4 +1,5 @@\n package net.minecraft.server;\n \n public class Foo {\n+    // CraftBukkit\n }\n";

fn key() -> CacheKey {
    CacheKey::from_commit_ids(["abc123"]).unwrap()
}

fn runner() -> FakeRunner {
    FakeRunner::new().with_decompiled("net/minecraft/server/Foo.java", VANILLA_FOO)
}

fn fetcher() -> FakeFetcher {
    FakeFetcher::new().with_response(SERVER_JAR_URL, b"vanilla".to_vec())
}

fn pipeline(root: &Path, runner: &Arc<FakeRunner>, fetcher: &Arc<FakeFetcher>) -> ArtifactPipeline {
    ArtifactPipeline::new(
        root,
        VersionInfo::default(),
        key(),
        SERVER_JAR_URL,
        runner.clone(),
        fetcher.clone(),
    )
}

/// Test: second run with unchanged inputs invokes nothing
#[tokio::test]
async fn test_pipeline_is_idempotent() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(fetcher());

    let first_runner = Arc::new(runner());
    let first = pipeline(root.path(), &first_runner, &fetcher)
        .run()
        .await
        .expect("first run failed");
    assert_eq!(first.ran_count(), 5, "every stage runs on a cold cache");
    assert_eq!(first_runner.calls().len(), 4, "three remaps and a decompile");
    assert!(first.mapped_jar.is_file());
    assert!(first
        .decompile_dir
        .join("net/minecraft/server/Foo.java")
        .is_file());

    let second_runner = Arc::new(runner());
    let second = pipeline(root.path(), &second_runner, &fetcher)
        .run()
        .await
        .expect("second run failed");
    assert_eq!(second.cached_count(), 5);
    assert!(second_runner.calls().is_empty(), "no tool invocations on rerun");
    assert_eq!(fetcher.requests().len(), 1, "server jar downloaded once");
}

/// Test: an existing intermediate is reused and later stages run
#[tokio::test]
async fn test_pipeline_resumes_after_completed_stage() {
    let root = tempfile::tempdir().unwrap();
    let runner = Arc::new(runner());
    let fetcher = Arc::new(fetcher());
    let pipeline = pipeline(root.path(), &runner, &fetcher);

    std::fs::create_dir_all(pipeline.layout().dir()).unwrap();
    std::fs::write(pipeline.layout().vanilla_jar("1.8"), "vanilla").unwrap();
    write_jar(&pipeline.layout().class_mapped_jar(&key()), &[]).unwrap();

    let result = pipeline.run().await.unwrap();
    let outcomes: Vec<_> = result.stages.iter().map(|s| (s.stage, s.outcome)).collect();
    assert_eq!(
        outcomes,
        vec![
            (PipelineStage::DownloadServer, StageOutcome::Cached),
            (PipelineStage::ClassRemap, StageOutcome::Cached),
            (PipelineStage::MemberRemap, StageOutcome::Ran),
            (PipelineStage::AccessTransform, StageOutcome::Ran),
            (PipelineStage::Decompile, StageOutcome::Ran),
        ]
    );
    assert_eq!(runner.count_matching("SpecialSource-2.jar"), 1);
    assert!(fetcher.requests().is_empty());
}

/// Test: a failing stage leaves no final output, and a rerun picks up there
#[tokio::test]
async fn test_failed_stage_leaves_no_output() {
    let root = tempfile::tempdir().unwrap();
    let fetcher = Arc::new(fetcher());

    let failing = Arc::new(runner().failing_on("SpecialSource.jar"));
    let err = pipeline(root.path(), &failing, &fetcher)
        .run()
        .await
        .unwrap_err();
    match err.downcast_ref::<BuildError>() {
        Some(BuildError::ToolFailed { command, exit_code }) => {
            assert!(command.contains("--access-transformer"));
            assert_eq!(*exit_code, 1);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    let layout = pipeline(root.path(), &failing, &fetcher).layout().clone();
    assert!(layout.member_mapped_jar(&key()).is_file());
    assert!(!layout.mapped_jar(&key()).exists());
    assert!(!layout.decompile_dir(&key()).exists());
    assert_eq!(failing.count_matching("fernflower"), 0, "later stages never start");

    let healthy = Arc::new(runner());
    pipeline(root.path(), &healthy, &fetcher).run().await.unwrap();
    assert_eq!(healthy.calls().len(), 2, "access transform and decompile only");
}

/// Test: only the server package is extracted for decompilation
#[tokio::test]
async fn test_decompile_extracts_server_package_only() {
    let root = tempfile::tempdir().unwrap();
    let runner = Arc::new(runner());
    let fetcher = Arc::new(fetcher());

    let result = pipeline(root.path(), &runner, &fetcher).run().await.unwrap();
    let classes = result.decompile_dir.join("classes");
    assert!(classes.join("net/minecraft/server/Foo.class").is_file());
    assert!(!classes.join("org").exists());

    let decompile = runner
        .calls()
        .into_iter()
        .find(|c| c.display().contains("fernflower.jar"))
        .unwrap();
    assert!(decompile.args.contains(&"-dgs=1".to_string()));
}

// ---------------------------------------------------------------------------
// Full build
// ---------------------------------------------------------------------------

fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn upstream(dir: &Path, files: &[(&str, &str)]) -> String {
    std::fs::create_dir_all(dir).unwrap();
    git(dir, &["init", "-q", "-b", "master"]);
    git(dir, &["config", "user.name", "test-user"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    for (name, content) in files {
        let path = dir.join(name);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "-m", "initial"]);
    git(dir, &["rev-parse", "HEAD"])
}

struct BuildFixture {
    _upstream: tempfile::TempDir,
    build: tempfile::TempDir,
    remote: RemoteConfig,
    mapping_commit: String,
    maven_zip: Vec<u8>,
}

impl BuildFixture {
    fn new() -> Self {
        let upstream_dir = tempfile::tempdir().unwrap();
        let up = |name: &str| upstream_dir.path().join(name);

        let mapping_commit = upstream(
            &up("BuildData"),
            &[
                ("mappings/bukkit-1.8.at", "public net/minecraft/server/Foo\n"),
                ("mappings/bukkit-1.8-cl.csrg", "a Foo\n"),
                ("mappings/bukkit-1.8-members.csrg", "Foo a b\n"),
                ("mappings/package.srg", "PK: ./ net/minecraft/server\n"),
            ],
        );
        upstream(&up("Bukkit"), &[("pom.xml", "<project/>\n")]);
        upstream(
            &up("CraftBukkit"),
            &[
                (".gitignore", "/src/main/java/net/\n/target/\n"),
                ("nms-patches/Foo.java.patch", FOO_PATCH),
            ],
        );
        upstream(&up("Spigot"), &[("applyPatches.sh", "#!/bin/bash\n")]);

        let scratch = tempfile::tempdir().unwrap();
        let zip_path = scratch.path().join("maven.zip");
        write_jar(
            &zip_path,
            &[("apache-maven-3.2.3/bin/mvn".to_string(), b"#!/bin/sh\n".to_vec())],
        )
        .unwrap();
        let maven_zip = std::fs::read(&zip_path).unwrap();

        let url = |name: &str| up(name).to_string_lossy().to_string();
        let remote = RemoteConfig {
            manifest_url: "http://test/latest.json".to_string(),
            server_jar_url: "http://test/minecraft_server.{version}.jar".to_string(),
            maven_url: "http://test/maven.zip".to_string(),
            build_data_url: url("BuildData"),
            bukkit_url: url("Bukkit"),
            craftbukkit_url: url("CraftBukkit"),
            spigot_url: url("Spigot"),
        };

        BuildFixture {
            _upstream: upstream_dir,
            build: tempfile::tempdir().unwrap(),
            remote,
            mapping_commit,
            maven_zip,
        }
    }

    fn root(&self) -> PathBuf {
        self.build.path().to_path_buf()
    }

    fn runner(&self) -> FakeRunner {
        runner()
            .with_build_output(
                self.root().join("CraftBukkit"),
                "target/craftbukkit-1.8-R0.1-SNAPSHOT.jar",
            )
            .with_build_output(
                self.root().join("Spigot"),
                "Spigot-Server/target/spigot-1.8-R0.1-SNAPSHOT.jar",
            )
    }

    fn fetcher(&self) -> FakeFetcher {
        FakeFetcher::new()
            .with_response(SERVER_JAR_URL, b"vanilla".to_vec())
            .with_response("http://test/maven.zip", self.maven_zip.clone())
    }

    fn orchestrator(&self, flags: BuildFlags, runner: Arc<FakeRunner>, fetcher: Arc<FakeFetcher>) -> BuildOrchestrator {
        let config = BuildConfig::with_remote(self.root(), flags, self.remote.clone());
        BuildOrchestrator::new(config, runner, fetcher)
    }
}

fn dev() -> BuildFlags {
    BuildFlags {
        dev: true,
        ..BuildFlags::default()
    }
}

/// Test: a full development build from fresh clones to collected jars
#[tokio::test]
async fn test_full_build_collects_artifacts() {
    let fx = BuildFixture::new();
    let runner = Arc::new(fx.runner());
    let fetcher = Arc::new(fx.fetcher());

    let report = fx
        .orchestrator(dev(), runner.clone(), fetcher.clone())
        .run()
        .await
        .expect("build failed");

    assert_eq!(report.states.first(), Some(&BuildState::Start));
    assert_eq!(report.states.last(), Some(&BuildState::Done));
    assert_eq!(report.minecraft_version, "1.8");
    assert_eq!(
        report.cache_key,
        CacheKey::from_commit_ids([&fx.mapping_commit]).unwrap()
    );
    assert!(
        !fetcher
            .requests()
            .contains(&"http://test/latest.json".to_string()),
        "dev builds use the development manifest"
    );

    // Patched source on disk, repository clean.
    let patched = std::fs::read_to_string(
        fx.root()
            .join("CraftBukkit/src/main/java/net/minecraft/server/Foo.java"),
    )
    .unwrap();
    assert!(patched.contains("// CraftBukkit"));
    assert_eq!(git(&fx.root().join("CraftBukkit"), &["status", "--porcelain"]), "");
    assert_eq!(report.patches.applied.len(), 1);

    // Maven installed, compile order respected, artifacts collected.
    assert!(fx.root().join("apache-maven-3.2.3/bin/mvn").is_file());
    assert_eq!(runner.count_matching("install:install-file"), 1);
    assert_eq!(runner.count_matching("applyPatches.sh"), 1);
    assert!(fx.root().join("Spigot/Bukkit/.git").exists());
    assert!(fx.root().join("Spigot/CraftBukkit/.git").exists());
    assert_eq!(report.artifacts.len(), 2);
    assert!(fx.root().join("craftbukkit-1.8.jar").is_file());
    assert!(fx.root().join("spigot-1.8.jar").is_file());

    let cwds: Vec<_> = runner
        .calls()
        .iter()
        .filter(|c| c.args.iter().any(|a| a == "clean"))
        .map(|c| c.cwd.file_name().unwrap().to_string_lossy().to_string())
        .collect();
    assert_eq!(cwds, vec!["Bukkit", "CraftBukkit", "Spigot"]);
}

/// Test: rebuilding with unchanged mappings reuses every pipeline output
#[tokio::test]
async fn test_rebuild_reuses_pipeline_outputs() {
    let fx = BuildFixture::new();
    fx.orchestrator(dev(), Arc::new(fx.runner()), Arc::new(fx.fetcher()))
        .run()
        .await
        .expect("first build failed");

    let runner = Arc::new(fx.runner());
    let fetcher = Arc::new(fx.fetcher());
    let report = fx
        .orchestrator(dev(), runner.clone(), fetcher.clone())
        .run()
        .await
        .expect("second build failed");

    assert!(report
        .stages
        .iter()
        .all(|s| s.outcome == StageOutcome::Cached));
    assert_eq!(runner.count_matching("SpecialSource"), 0);
    assert_eq!(runner.count_matching("fernflower"), 0);
    assert!(fetcher.requests().is_empty(), "nothing downloaded twice");
    assert!(report.patches.backup.is_some(), "previous patched tree backed up");
}

/// Test: a failing compile step aborts before any artifact is copied
#[tokio::test]
async fn test_failed_step_aborts_without_artifacts() {
    let fx = BuildFixture::new();
    let runner = Arc::new(fx.runner().failing_on("applyPatches.sh"));

    let err = fx
        .orchestrator(dev(), runner, Arc::new(fx.fetcher()))
        .run()
        .await
        .unwrap_err();
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::ToolFailed { .. })
    ));
    assert!(!fx.root().join("craftbukkit-1.8.jar").exists());
    assert!(!fx.root().join("spigot-1.8.jar").exists());
}

/// Test: skip-compile patches and applies distribution patches but builds nothing
#[tokio::test]
async fn test_skip_compile_runs_no_maven_builds() {
    let fx = BuildFixture::new();
    let runner = Arc::new(fx.runner());
    let flags = BuildFlags {
        skip_compile: true,
        ..dev()
    };

    let report = fx
        .orchestrator(flags, runner.clone(), Arc::new(fx.fetcher()))
        .run()
        .await
        .expect("build failed");

    assert_eq!(report.states.last(), Some(&BuildState::Done));
    assert_eq!(runner.count_matching("clean install"), 0);
    assert_eq!(runner.count_matching("applyPatches.sh"), 1);
    assert!(report.artifacts.is_empty());
}

/// Test: the distribution clones exist before any upstream Maven build runs
#[tokio::test]
async fn test_distribution_clones_precede_upstream_builds() {
    let fx = BuildFixture::new();
    let runner = Arc::new(fx.runner().failing_on("clean install"));

    let err = fx
        .orchestrator(dev(), runner.clone(), Arc::new(fx.fetcher()))
        .run()
        .await
        .unwrap_err();

    let failed = err.downcast_ref::<BuildFailed>().expect("missing BuildFailed");
    assert_eq!(failed.reached, BuildState::Patched);
    assert_eq!(failed.states.last(), Some(&BuildState::Failed));
    assert_eq!(runner.count_matching("clean install"), 1);
    assert!(fx.root().join("Spigot/Bukkit/.git").exists());
    assert!(fx.root().join("Spigot/CraftBukkit/.git").exists());
}

/// Test: a run interrupted while on the snapshot branch is recovered by rerunning
#[tokio::test]
async fn test_rerun_recovers_from_interrupted_snapshot() {
    let fx = BuildFixture::new();
    let craftbukkit = fx.root().join("CraftBukkit");
    fx.orchestrator(dev(), Arc::new(fx.runner()), Arc::new(fx.fetcher()))
        .run()
        .await
        .expect("first build failed");

    let dont_update = BuildFlags {
        dont_update: true,
        ..BuildFlags::default()
    };
    for flags in [dev(), dont_update] {
        git(&craftbukkit, &["checkout", "-q", "patched"]);

        let report = fx
            .orchestrator(flags, Arc::new(fx.runner()), Arc::new(fx.fetcher()))
            .run()
            .await
            .expect("rerun after interruption failed");

        assert_eq!(report.states.last(), Some(&BuildState::Done));
        assert_eq!(git(&craftbukkit, &["symbolic-ref", "--short", "HEAD"]), "master");
        assert_eq!(git(&craftbukkit, &["status", "--porcelain"]), "");
        let patched = std::fs::read_to_string(
            craftbukkit.join("src/main/java/net/minecraft/server/Foo.java"),
        )
        .unwrap();
        assert_eq!(patched.matches("// CraftBukkit").count(), 1);
    }
}
