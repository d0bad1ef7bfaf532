//! Post-compile packaging.
//!
//! Windows packaging happens before compilation (see [`resources`]); this
//! module covers the platforms packaged after the binary exists.
//!
//! [`resources`]: crate::builder::resources

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use crate::core::options::BuildOptions;
use crate::core::platform::Platform;
use crate::util::fs::{copy_file, remove_dir_all_if_exists, write_string};

/// Produces a distributable package from a compiled binary.
pub trait Packager {
    /// Package `opts.compiled_binary`, running on `host`.
    fn package(&self, opts: &BuildOptions, host: &str) -> Result<()>;
}

/// Packages for the host operating system.
#[derive(Debug, Clone, Default)]
pub struct HostPackager;

impl Packager for HostPackager {
    fn package(&self, opts: &BuildOptions, host: &str) -> Result<()> {
        match host.parse::<Platform>() {
            Ok(Platform::Darwin) => package_darwin(opts).map(|_| ()),
            Ok(Platform::Linux) => {
                tracing::info!("no packaging step for linux; binary left as-is");
                Ok(())
            }
            Ok(Platform::Windows) => Ok(()),
            Err(_) => bail!("packaging is not supported on {}", host),
        }
    }
}

/// Build `<bin>/<bundle>.app` around the compiled binary.
pub fn package_darwin(opts: &BuildOptions) -> Result<PathBuf> {
    let project = &opts.project;
    let binary = opts
        .compiled_binary
        .as_ref()
        .context("no compiled binary to package")?;
    let exe_name = binary
        .file_name()
        .and_then(|n| n.to_str())
        .context("compiled binary has no file name")?
        .to_string();

    let bundle_name = opts
        .bundle_name
        .clone()
        .unwrap_or_else(|| format!("{}.app", project.product_name()));
    let bundle = opts.bin_directory.join(&bundle_name);
    remove_dir_all_if_exists(&bundle)?;

    let contents = bundle.join("Contents");
    copy_file(binary, &contents.join("MacOS").join(&exe_name))?;

    let icon_file = match &project.info.icon {
        Some(icon) => {
            let src = project.path.join(icon);
            if src.extension().and_then(|e| e.to_str()) == Some("icns") {
                copy_file(&src, &contents.join("Resources").join("iconfile.icns"))?;
                Some("iconfile")
            } else {
                tracing::warn!(
                    "icon {} is not an .icns file; bundle will use the default icon",
                    src.display()
                );
                None
            }
        }
        None => None,
    };

    write_string(
        &contents.join("Info.plist"),
        &info_plist(opts, &exe_name, icon_file),
    )?;

    tracing::debug!("created bundle {}", bundle.display());
    Ok(bundle)
}

fn info_plist(opts: &BuildOptions, exe_name: &str, icon_file: Option<&str>) -> String {
    let project = &opts.project;
    let identifier = project
        .info
        .identifier
        .clone()
        .unwrap_or_else(|| format!("com.keel.{}", project.name));

    let mut entries = vec![
        ("CFBundlePackageType", "APPL".to_string()),
        ("CFBundleName", project.product_name().to_string()),
        ("CFBundleExecutable", exe_name.to_string()),
        ("CFBundleIdentifier", identifier),
        ("CFBundleVersion", project.product_version().to_string()),
        ("CFBundleShortVersionString", project.product_version().to_string()),
        ("LSMinimumSystemVersion", "10.13.0".to_string()),
        ("NSHighResolutionCapable", "true".to_string()),
    ];
    if let Some(icon) = icon_file {
        entries.push(("CFBundleIconFile", icon.to_string()));
    }
    if let Some(copyright) = &project.info.copyright {
        entries.push(("NSHumanReadableCopyright", copyright.clone()));
    }

    let mut body = String::new();
    for (key, value) in entries {
        body.push_str(&format!(
            "        <key>{}</key>\n        <string>{}</string>\n",
            key,
            xml_escape(&value)
        ));
    }

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <!DOCTYPE plist PUBLIC \"-//Apple//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n\
         <plist version=\"1.0\">\n    <dict>\n{}    </dict>\n</plist>\n",
        body
    )
}

fn xml_escape(value: &str) -> String {
    value
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::project::Project;
    use std::fs;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn compiled_options(tmp: &TempDir) -> BuildOptions {
        let mut project = Project::new("demo", tmp.path());
        project.info.product_name = Some("Demo & Co".to_string());
        let mut opts = BuildOptions::new(Arc::new(project));

        fs::create_dir_all(&opts.bin_directory).unwrap();
        let binary = opts.bin_directory.join("demo");
        fs::write(&binary, "binary").unwrap();
        opts.compiled_binary = Some(binary);
        opts
    }

    #[test]
    fn test_package_darwin_bundle_layout() {
        let tmp = TempDir::new().unwrap();
        let opts = compiled_options(&tmp);

        let bundle = package_darwin(&opts).unwrap();

        assert_eq!(bundle, opts.bin_directory.join("Demo & Co.app"));
        assert!(bundle.join("Contents/MacOS/demo").is_file());
        let plist = fs::read_to_string(bundle.join("Contents/Info.plist")).unwrap();
        assert!(plist.contains("<string>Demo &amp; Co</string>"));
        assert!(plist.contains("<string>com.keel.demo</string>"));
        assert!(!plist.contains("CFBundleIconFile"));
    }

    #[test]
    fn test_package_darwin_custom_bundle_name() {
        let tmp = TempDir::new().unwrap();
        let mut opts = compiled_options(&tmp);
        opts.bundle_name = Some("Custom.app".to_string());

        let bundle = package_darwin(&opts).unwrap();
        assert!(bundle.ends_with("Custom.app"));
    }

    #[test]
    fn test_package_requires_binary() {
        let tmp = TempDir::new().unwrap();
        let mut opts = compiled_options(&tmp);
        opts.compiled_binary = None;

        let err = package_darwin(&opts).unwrap_err();
        assert!(err.to_string().contains("no compiled binary"));
    }

    #[test]
    fn test_host_packager_unsupported_host() {
        let tmp = TempDir::new().unwrap();
        let opts = compiled_options(&tmp);

        assert!(HostPackager.package(&opts, "linux").is_ok());
        assert!(HostPackager.package(&opts, "plan9").is_err());
    }
}
