//! Windows resource bundles.
//!
//! Packaged Windows builds link an icon and version information into the
//! executable. The resources are compiled to `<name>-res.syso` in the project
//! root before compilation, where the compiler picks them up, and removed again
//! once compilation is over.

use std::fmt::Write as _;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};

use crate::core::error::BuildError;
use crate::core::platform::Arch;
use crate::core::project::Project;
use crate::util::process::ProcessBuilder;

/// A file generated for the duration of a build.
///
/// Call [`remove`](GeneratedFile::remove) to delete it and observe failures.
/// If the guard is dropped without that, removal is attempted anyway and a
/// failure is only logged.
#[derive(Debug)]
pub struct GeneratedFile {
    path: PathBuf,
    removed: bool,
}

impl GeneratedFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        GeneratedFile {
            path: path.into(),
            removed: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Delete the file. A file that is already gone counts as removed.
    pub fn remove(mut self) -> Result<(), BuildError> {
        self.removed = true;
        remove_if_present(&self.path).map_err(|source| BuildError::Cleanup {
            path: self.path.clone(),
            source,
        })
    }
}

impl Drop for GeneratedFile {
    fn drop(&mut self) {
        if self.removed {
            return;
        }
        if let Err(e) = remove_if_present(&self.path) {
            tracing::warn!("failed to remove {}: {}", self.path.display(), e);
        }
    }
}

fn remove_if_present(path: &Path) -> io::Result<()> {
    match fs::remove_file(path) {
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}

/// Compiles a resource script into a linkable object.
pub trait ResourceCompiler {
    fn compile(
        &self,
        script: &Path,
        output: &Path,
        arch: Arch,
        timeout: Option<Duration>,
    ) -> Result<()>;
}

/// Resource compiler backed by `windres`.
#[derive(Debug, Clone)]
pub struct Windres {
    program: String,
}

impl Windres {
    pub fn new() -> Self {
        Windres {
            program: "windres".to_string(),
        }
    }

    pub fn command(&self, script: &Path, output: &Path, arch: Arch) -> ProcessBuilder {
        let mut cmd = ProcessBuilder::new(&self.program);
        match arch {
            Arch::Amd64 => cmd = cmd.arg("--target=pe-x86-64"),
            Arch::X86 => cmd = cmd.arg("--target=pe-i386"),
            _ => {}
        }
        cmd.arg("-i")
            .arg(script)
            .args(["-O", "coff", "-o"])
            .arg(output)
    }
}

impl Default for Windres {
    fn default() -> Self {
        Self::new()
    }
}

impl ResourceCompiler for Windres {
    fn compile(
        &self,
        script: &Path,
        output: &Path,
        arch: Arch,
        timeout: Option<Duration>,
    ) -> Result<()> {
        self.command(script, output, arch)
            .timeout(timeout)
            .exec_and_check()
            .map_err(|e| BuildError::tool("windres", e))?;
        Ok(())
    }
}

/// Where the compiled resources for `project` are written.
pub fn resource_file_path(project: &Project) -> PathBuf {
    project.path.join(format!("{}-res.syso", project.name))
}

/// Render the resource script for `project`.
pub fn resource_script(project: &Project) -> String {
    let version = project.product_version();
    let numeric = numeric_version(version);
    let info = &project.info;

    let mut rc = String::new();
    if let Some(icon) = &info.icon {
        let icon = project.path.join(icon);
        let _ = writeln!(rc, "1 ICON \"{}\"", escape(&icon.display().to_string()));
    }

    let _ = writeln!(rc, "1 VERSIONINFO");
    let _ = writeln!(rc, "FILEVERSION {}", numeric);
    let _ = writeln!(rc, "PRODUCTVERSION {}", numeric);
    rc.push_str("BEGIN\n  BLOCK \"StringFileInfo\"\n  BEGIN\n    BLOCK \"040904B0\"\n    BEGIN\n");

    let mut values = vec![
        ("FileDescription", project.product_name().to_string()),
        ("FileVersion", version.to_string()),
        ("ProductName", project.product_name().to_string()),
        ("ProductVersion", version.to_string()),
    ];
    if let Some(company) = &info.company_name {
        values.push(("CompanyName", company.clone()));
    }
    if let Some(copyright) = &info.copyright {
        values.push(("LegalCopyright", copyright.clone()));
    }
    if let Some(comments) = &info.comments {
        values.push(("Comments", comments.clone()));
    }
    for (key, value) in values {
        let _ = writeln!(rc, "      VALUE \"{}\", \"{}\"", key, escape(&value));
    }

    rc.push_str("    END\n  END\n  BLOCK \"VarFileInfo\"\n  BEGIN\n    VALUE \"Translation\", 0x409, 1200\n  END\nEND\n");
    rc
}

/// `1.2.3` becomes `1,2,3,0`. Non-numeric parts count as zero.
fn numeric_version(version: &str) -> String {
    let mut parts: Vec<u16> = version
        .split(['.', '-', '+'])
        .take(4)
        .map(|p| p.parse().unwrap_or(0))
        .collect();
    parts.resize(4, 0);
    parts
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\"\"")
}

/// Compile the Windows resources for `project` into the project root.
///
/// The returned guard owns the generated file.
pub fn generate_windows_resources(
    project: &Project,
    compiler: &dyn ResourceCompiler,
    arch: Arch,
    timeout: Option<Duration>,
) -> Result<GeneratedFile> {
    let mut script = tempfile::Builder::new()
        .prefix("keel-res")
        .suffix(".rc")
        .tempfile()
        .context("failed to create resource script")?;
    script
        .write_all(resource_script(project).as_bytes())
        .context("failed to write resource script")?;
    script.flush().context("failed to write resource script")?;

    let generated = GeneratedFile::new(resource_file_path(project));
    compiler.compile(script.path(), generated.path(), arch, timeout)?;

    Ok(generated)
}
