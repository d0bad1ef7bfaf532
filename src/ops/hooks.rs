//! Pre- and post-build hooks.
//!
//! Hooks are keyed by `<platform>/<arch>` with `*` wildcards. For each phase
//! the keys are tried from most to least specific and the first one with a
//! command is the only one considered.

use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::Result;

use crate::core::error::{BuildError, HookPhase};
use crate::core::platform::{Arch, Platform};
use crate::core::project::{CommandLine, Project};
use crate::util::process::ProcessBuilder;
use crate::util::shell::{Shell, Status};

/// Placeholder replaced by `<platform>/<arch>`.
pub const PLATFORM_TOKEN: &str = "${platform}";

/// Placeholder replaced by the compiled binary path.
pub const BIN_TOKEN: &str = "${bin}";

/// Substitution values for one hook phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookArgs {
    values: Vec<(&'static str, String)>,
}

impl HookArgs {
    /// Arguments for the pre-build phase.
    pub fn pre_build(target_key: &str) -> Self {
        HookArgs {
            values: vec![(PLATFORM_TOKEN, target_key.to_string())],
        }
    }

    /// Arguments for the post-build phase. `bin` is `None` when nothing was compiled.
    pub fn post_build(target_key: &str, bin: Option<&Path>) -> Self {
        let bin = bin.map(|p| p.display().to_string()).unwrap_or_default();
        HookArgs {
            values: vec![
                (PLATFORM_TOKEN, target_key.to_string()),
                (BIN_TOKEN, bin),
            ],
        }
    }

    /// Value for a placeholder.
    pub fn get(&self, token: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(t, _)| *t == token)
            .map(|(_, v)| v.as_str())
    }

    /// Replace whole-token placeholders in `args`.
    ///
    /// A placeholder whose value is empty is left as written.
    pub fn substitute(&self, args: &[String]) -> Vec<String> {
        args.iter()
            .map(|arg| match self.get(arg) {
                Some(value) if !value.is_empty() => value.to_string(),
                _ => arg.clone(),
            })
            .collect()
    }
}

/// A hook selected to run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookInvocation {
    pub phase: HookPhase,
    /// The manifest key the command was found under
    pub key: String,
    /// Program and arguments, placeholders substituted
    pub args: Vec<String>,
}

/// What happened for a hook phase.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookOutcome {
    /// No key for this target has a command
    NotConfigured,
    /// The matching key targets another platform
    SkippedNonNative { key: String },
    Executed { key: String, command: String },
}

/// Hook keys for a target, most specific first.
pub fn hook_keys(platform: Platform, arch: Arch) -> [String; 3] {
    [
        format!("{}/{}", platform, arch),
        format!("{}/*", platform),
        "*/*".to_string(),
    ]
}

/// Whether the hook under `key` may run on `host`.
pub fn should_run(key: &str, host: &str, run_non_native: bool) -> bool {
    if run_non_native {
        return true;
    }
    match key.split_once('/') {
        Some((platform, _)) => platform.is_empty() || platform == "*" || platform == host,
        None => key.is_empty() || key == "*",
    }
}

/// Runs the configured hooks of a project.
pub struct HookRunner<'a> {
    project: &'a Project,
    host: &'a str,
    working_dir: &'a Path,
    shell: &'a Shell,
}

impl<'a> HookRunner<'a> {
    /// Hooks run in `working_dir`, normally the bin directory.
    pub fn new(project: &'a Project, host: &'a str, working_dir: &'a Path, shell: &'a Shell) -> Self {
        HookRunner {
            project,
            host,
            working_dir,
            shell,
        }
    }

    /// Pick the hook for `phase`, if any.
    ///
    /// Returns the key and the substituted invocation.
    pub fn select(&self, phase: HookPhase, keys: &[String], args: &HookArgs) -> Option<HookInvocation> {
        let hooks = match phase {
            HookPhase::Pre => &self.project.pre_build_hooks,
            HookPhase::Post => &self.project.post_build_hooks,
        };

        keys.iter().find_map(|key| {
            hooks
                .get(key)
                .filter(|cmd| !cmd.is_empty())
                .map(|cmd: &CommandLine| HookInvocation {
                    phase,
                    key: key.clone(),
                    args: args.substitute(&cmd.to_args()),
                })
        })
    }

    /// Run the hook for `phase`.
    pub fn run_phase(
        &self,
        phase: HookPhase,
        keys: &[String],
        args: &HookArgs,
        verbose: bool,
        timeout: Option<Duration>,
    ) -> Result<HookOutcome> {
        let Some(invocation) = self.select(phase, keys, args) else {
            tracing::debug!("no {} build hook for {}", phase, keys.join(", "));
            return Ok(HookOutcome::NotConfigured);
        };

        if !should_run(&invocation.key, self.host, self.project.run_non_native_build_hooks) {
            self.shell.status(
                Status::Skipped,
                format!(
                    "non-native {} build hook '{}' (set run_non_native_build_hooks to run it)",
                    phase, invocation.key
                ),
            );
            return Ok(HookOutcome::SkippedNonNative {
                key: invocation.key,
            });
        }

        let command = self.execute(&invocation, verbose, timeout)?;
        Ok(HookOutcome::Executed {
            key: invocation.key,
            command,
        })
    }

    fn execute(
        &self,
        invocation: &HookInvocation,
        verbose: bool,
        timeout: Option<Duration>,
    ) -> Result<String> {
        fs::create_dir_all(self.working_dir)
            .map_err(|e| BuildError::io("create directory", self.working_dir, e))?;

        let Some(cmd) = ProcessBuilder::from_argv(&invocation.args) else {
            return Ok(String::new());
        };
        let cmd = cmd.cwd(self.working_dir).timeout(timeout);
        let display = cmd.display_command();

        self.shell.status(
            Status::Executing,
            format!("{} build hook '{}': {}", invocation.phase, invocation.key, display),
        );

        let output = cmd
            .exec_and_check()
            .map_err(|e| BuildError::hook(invocation.phase, &invocation.key, e))?;

        if verbose {
            self.shell.verbose_output(&output.stdout);
        }
        Ok(display)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn project_with_hooks(pre: &[(&str, &str)]) -> Project {
        let mut project = Project::new("app", "/tmp/app");
        for (key, cmd) in pre {
            project
                .pre_build_hooks
                .insert(key.to_string(), CommandLine::from(*cmd));
        }
        project
    }

    #[test]
    fn test_hook_keys_order() {
        assert_eq!(
            hook_keys(Platform::Darwin, Arch::Universal),
            ["darwin/universal", "darwin/*", "*/*"]
        );
    }

    #[test]
    fn test_should_run() {
        assert!(should_run("linux/amd64", "linux", false));
        assert!(should_run("*/*", "linux", false));
        assert!(should_run("", "linux", false));
        assert!(!should_run("windows/*", "linux", false));
        assert!(should_run("windows/*", "linux", true));
    }

    #[test]
    fn test_substitute_whole_tokens_only() {
        let args = HookArgs::post_build("darwin/arm64", Some(Path::new("/out/app")));
        let cmd = vec![
            "sign".to_string(),
            "${bin}".to_string(),
            "--target=${platform}".to_string(),
            "${platform}".to_string(),
        ];

        assert_eq!(
            args.substitute(&cmd),
            vec!["sign", "/out/app", "--target=${platform}", "darwin/arm64"]
        );
    }

    #[test]
    fn test_empty_value_keeps_token() {
        let args = HookArgs::post_build("linux/amd64", None);
        let cmd = vec!["echo".to_string(), "${bin}".to_string()];

        assert_eq!(args.substitute(&cmd), vec!["echo", "${bin}"]);
    }

    #[test]
    fn test_select_most_specific_first() {
        let project = project_with_hooks(&[
            ("linux/amd64", "specific"),
            ("linux/*", "platform"),
            ("*/*", "global"),
        ]);
        let shell = Shell::quiet();
        let runner = HookRunner::new(&project, "linux", Path::new("/tmp"), &shell);
        let keys = hook_keys(Platform::Linux, Arch::Amd64);

        let inv = runner
            .select(HookPhase::Pre, &keys, &HookArgs::pre_build("linux/amd64"))
            .unwrap();
        assert_eq!(inv.key, "linux/amd64");
        assert_eq!(inv.args, vec!["specific"]);
    }

    #[test]
    fn test_select_falls_back_past_empty_commands() {
        let project = project_with_hooks(&[("linux/amd64", "  "), ("*/*", "global ${platform}")]);
        let shell = Shell::quiet();
        let runner = HookRunner::new(&project, "linux", Path::new("/tmp"), &shell);
        let keys = hook_keys(Platform::Linux, Arch::Amd64);

        let inv = runner
            .select(HookPhase::Pre, &keys, &HookArgs::pre_build("linux/amd64"))
            .unwrap();
        assert_eq!(inv.key, "*/*");
        assert_eq!(inv.args, vec!["global", "linux/amd64"]);
    }

    #[test]
    fn test_not_configured() {
        let project = project_with_hooks(&[]);
        let shell = Shell::quiet();
        let runner = HookRunner::new(&project, "linux", Path::new("/tmp"), &shell);
        let keys = hook_keys(Platform::Linux, Arch::Amd64);

        let outcome = runner
            .run_phase(HookPhase::Post, &keys, &HookArgs::post_build("linux/amd64", None), false, None)
            .unwrap();
        assert_eq!(outcome, HookOutcome::NotConfigured);
    }

    #[cfg(unix)]
    #[test]
    fn test_non_native_hook_is_not_run() {
        let tmp = TempDir::new().unwrap();
        let marker = tmp.path().join("ran");
        let mut project = Project::new("app", tmp.path());
        project.pre_build_hooks.insert(
            "windows/*".to_string(),
            CommandLine::Args(vec!["touch".to_string(), marker.display().to_string()]),
        );
        project
            .pre_build_hooks
            .insert("*/*".to_string(), CommandLine::from("false"));

        let shell = Shell::quiet();
        let runner = HookRunner::new(&project, "linux", tmp.path(), &shell);
        let keys = hook_keys(Platform::Windows, Arch::Amd64);

        let outcome = runner
            .run_phase(HookPhase::Pre, &keys, &HookArgs::pre_build("windows/amd64"), false, None)
            .unwrap();

        // The skipped key does not fall through to "*/*"
        assert_eq!(
            outcome,
            HookOutcome::SkippedNonNative {
                key: "windows/*".to_string()
            }
        );
        assert!(!marker.exists());
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_runs_in_working_dir() {
        let tmp = TempDir::new().unwrap();
        let bin_dir = tmp.path().join("build").join("bin");
        let mut project = Project::new("app", tmp.path());
        project.post_build_hooks.insert(
            "*/*".to_string(),
            CommandLine::Args(vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo \"$1\" > hook.txt".to_string(),
                "hook".to_string(),
                "${platform}".to_string(),
            ]),
        );

        let shell = Shell::quiet();
        let runner = HookRunner::new(&project, "linux", &bin_dir, &shell);
        let keys = hook_keys(Platform::Linux, Arch::Arm64);

        let outcome = runner
            .run_phase(HookPhase::Post, &keys, &HookArgs::post_build("linux/arm64", None), true, None)
            .unwrap();

        assert!(matches!(outcome, HookOutcome::Executed { ref key, .. } if key == "*/*"));
        let written = fs::read_to_string(bin_dir.join("hook.txt")).unwrap();
        assert_eq!(written.trim(), "linux/arm64");
    }

    #[cfg(unix)]
    #[test]
    fn test_hook_failure_carries_stderr() {
        let tmp = TempDir::new().unwrap();
        let mut project = Project::new("app", tmp.path());
        project.pre_build_hooks.insert(
            "*/*".to_string(),
            CommandLine::Args(vec![
                "sh".to_string(),
                "-c".to_string(),
                "echo signing failed 1>&2; exit 3".to_string(),
            ]),
        );

        let shell = Shell::quiet();
        let runner = HookRunner::new(&project, "linux", tmp.path(), &shell);
        let keys = hook_keys(Platform::Linux, Arch::Amd64);

        let err = runner
            .run_phase(HookPhase::Pre, &keys, &HookArgs::pre_build("linux/amd64"), false, None)
            .unwrap_err();

        match err.downcast_ref::<BuildError>() {
            Some(BuildError::Hook { phase, key, stderr, .. }) => {
                assert_eq!(*phase, HookPhase::Pre);
                assert_eq!(key, "*/*");
                assert_eq!(stderr.trim(), "signing failed");
            }
            other => panic!("expected hook error, got {:?}", other),
        }
    }
}
