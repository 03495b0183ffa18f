//! Artifact pipeline stage definitions.

use std::path::Path;

use buildtools_core::{RepositoryKind, VersionInfo};
use serde::{Deserialize, Serialize};

use crate::runner::ToolCommand;

/// Remapping tool for the two rename passes.
pub const SPECIAL_SOURCE_2: &str = "BuildData/bin/SpecialSource-2.jar";
/// Remapping tool for the access-transform pass.
pub const SPECIAL_SOURCE: &str = "BuildData/bin/SpecialSource.jar";
pub const FERNFLOWER: &str = "BuildData/bin/fernflower.jar";

/// Fernflower options: generic signatures on, no hidden default
/// constructors, keep bridge methods, ASCII strings, no debug variable
/// names.
pub const FERNFLOWER_OPTIONS: [&str; 5] = ["-dgs=1", "-hdc=0", "-rbr=0", "-asc=1", "-udv=0"];

/// Archive entries decompiled; everything else in the mapped jar is left out.
pub const DECOMPILE_PREFIX: &str = "net/minecraft/server";

/// Pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum PipelineStage {
    /// Fetch the vanilla server jar.
    DownloadServer,

    /// Class-level rename.
    ClassRemap,

    /// Member-level rename.
    MemberRemap,

    /// Access transforms plus package remap; produces the final mapped jar.
    AccessTransform,

    /// Extract the server package and decompile it.
    Decompile,
}

impl PipelineStage {
    pub const ALL: [PipelineStage; 5] = [
        PipelineStage::DownloadServer,
        PipelineStage::ClassRemap,
        PipelineStage::MemberRemap,
        PipelineStage::AccessTransform,
        PipelineStage::Decompile,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PipelineStage::DownloadServer => "download_server",
            PipelineStage::ClassRemap => "class_remap",
            PipelineStage::MemberRemap => "member_remap",
            PipelineStage::AccessTransform => "access_transform",
            PipelineStage::Decompile => "decompile",
        }
    }

    /// External command for this stage, run from `root`. The download
    /// stage has none.
    pub fn command(
        &self,
        root: &Path,
        info: &VersionInfo,
        input: &Path,
        output: &Path,
    ) -> Option<ToolCommand> {
        let java = ToolCommand::new("java", root).arg("-jar");
        let build_data = RepositoryKind::MappingData.dir_name();
        let mapping = |file: &str| format!("{build_data}/{}", info.mapping_path(file));
        let input = input.to_string_lossy().to_string();
        let output = output.to_string_lossy().to_string();

        let command = match self {
            PipelineStage::DownloadServer => return None,
            PipelineStage::ClassRemap => java.args([
                SPECIAL_SOURCE_2.to_string(),
                "map".to_string(),
                "-i".to_string(),
                input,
                "-m".to_string(),
                mapping(&info.class_mappings),
                "-o".to_string(),
                output,
            ]),
            PipelineStage::MemberRemap => java.args([
                SPECIAL_SOURCE_2.to_string(),
                "map".to_string(),
                "-i".to_string(),
                input,
                "-m".to_string(),
                mapping(&info.member_mappings),
                "-o".to_string(),
                output,
            ]),
            PipelineStage::AccessTransform => java.args([
                SPECIAL_SOURCE.to_string(),
                "-i".to_string(),
                input,
                "--access-transformer".to_string(),
                mapping(&info.access_transforms),
                "-m".to_string(),
                mapping(&info.package_mappings),
                "-o".to_string(),
                output,
            ]),
            PipelineStage::Decompile => java
                .arg(FERNFLOWER)
                .args(FERNFLOWER_OPTIONS)
                .arg(input)
                .arg(output),
        };
        Some(command)
    }
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}
