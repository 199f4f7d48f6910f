//! 将 `shaders/src` 下的所有 glsl 文件编译为 spv，输出到 `shaders/`
//!
//! 反射摘要 `<name>.json` 手动维护，和 spv 放在同一目录。需要 PATH 中有 `glslc`。

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use lumen_crate_tools::init_log::init_log;
use lumen_crate_tools::resource::LumenPath;
use rayon::prelude::*;

/// 一个具体的编译任务
#[derive(Debug)]
struct ShaderCompileTask {
    shader_path: PathBuf,
    /// `mesh.vert` -> `mesh.vert.spv`
    output_path: PathBuf,
}
impl ShaderCompileTask {
    const STAGE_EXTENSIONS: [&'static str; 2] = ["vert", "frag"];

    fn new(entry: &walkdir::DirEntry, output_dir: &Path) -> Option<Self> {
        let extension = entry.path().extension()?.to_str()?;
        if !Self::STAGE_EXTENSIONS.contains(&extension) {
            return None;
        }
        let shader_name = entry.file_name().to_str()?;
        Some(Self {
            shader_path: entry.path().to_path_buf(),
            output_path: output_dir.join(format!("{shader_name}.spv")),
        })
    }

    fn build(&self, include_dir: &Path) -> anyhow::Result<()> {
        let output = std::process::Command::new("glslc")
            .arg(format!("-I{}", include_dir.display()))
            .args(["-g", "--target-env=vulkan1.3", "-o"])
            .arg(&self.output_path)
            .arg(&self.shader_path)
            .output()
            .with_context(|| format!("failed to run glslc for {}", self.shader_path.display()))?;

        if !output.stdout.is_empty() {
            log::info!("stdout: {}", String::from_utf8_lossy(&output.stdout));
        }
        if !output.status.success() {
            bail!("{}: {}", self.shader_path.display(), String::from_utf8_lossy(&output.stderr));
        }

        let reflection = self.output_path.with_extension("json");
        if !reflection.exists() {
            log::warn!("{} has no reflection summary {}", self.shader_path.display(), reflection.display());
        }
        Ok(())
    }
}

fn main() -> anyhow::Result<()> {
    init_log();

    let output_dir = LumenPath::shader_path("");
    let src_dir = output_dir.join("src");
    let tasks = walkdir::WalkDir::new(&src_dir)
        .into_iter()
        .filter_map(Result::ok)
        .filter_map(|entry| ShaderCompileTask::new(&entry, &output_dir))
        .collect::<Vec<_>>();
    log::info!("compiling {} shaders from {}", tasks.len(), src_dir.display());

    let failed = tasks
        .par_iter()
        .filter_map(|task| match task.build(&src_dir) {
            Ok(()) => {
                log::info!("compiled {}", task.output_path.display());
                None
            }
            Err(e) => {
                log::error!("{e:#}");
                Some(task)
            }
        })
        .count();

    if failed > 0 {
        bail!("{failed} of {} shaders failed to compile", tasks.len());
    }
    Ok(())
}
