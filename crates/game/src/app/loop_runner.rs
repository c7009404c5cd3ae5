use std::path::PathBuf;
use std::process::ExitCode;

use engine::run_app;
use tracing::{error, info};

use super::bootstrap::AppWiring;

/// What the binary was asked to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Command {
    Play,
    Export { out_dir: Option<PathBuf> },
}

impl Command {
    pub(crate) fn from_args(mut args: impl Iterator<Item = String>) -> Result<Self, String> {
        match args.next().as_deref() {
            None | Some("play") => Ok(Self::Play),
            Some("export") => Ok(Self::Export {
                out_dir: args.next().map(PathBuf::from),
            }),
            Some(other) => Err(format!(
                "unknown command `{other}`; expected `play` or `export [out_dir]`"
            )),
        }
    }
}

pub(crate) fn run(app: AppWiring, command: Command) -> ExitCode {
    match command {
        Command::Play => play(app),
        Command::Export { out_dir } => export(app, out_dir),
    }
}

fn play(app: AppWiring) -> ExitCode {
    if let Err(err) = run_app(app.config, app.runtime, app.hooks) {
        error!(error = %err, "startup_failed");
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

fn export(app: AppWiring, out_dir: Option<PathBuf>) -> ExitCode {
    let out_dir = out_dir.unwrap_or_else(|| app.paths.export_dir.clone());
    match app.runtime.export_bundle(&app.paths.assets_dir, &out_dir) {
        Ok(manifest) => {
            info!(
                out_dir = %out_dir.display(),
                scenes = manifest.scene_count,
                assets = manifest.assets.len(),
                missing_assets = manifest.missing_assets.len(),
                world_sha256 = %manifest.world_sha256,
                "export_finished"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(out_dir = %out_dir.display(), error = %err, "export_failed");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(raw: &[&str]) -> impl Iterator<Item = String> {
        raw.iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .into_iter()
    }

    #[test]
    fn no_arguments_plays() {
        assert_eq!(Command::from_args(args(&[])), Ok(Command::Play));
        assert_eq!(Command::from_args(args(&["play"])), Ok(Command::Play));
    }

    #[test]
    fn export_takes_an_optional_directory() {
        assert_eq!(
            Command::from_args(args(&["export"])),
            Ok(Command::Export { out_dir: None })
        );
        assert_eq!(
            Command::from_args(args(&["export", "dist"])),
            Ok(Command::Export {
                out_dir: Some(PathBuf::from("dist"))
            })
        );
    }

    #[test]
    fn unknown_command_is_rejected() {
        let err = Command::from_args(args(&["fly"])).expect_err("unknown");
        assert!(err.contains("fly"));
    }
}
