use std::{
    path::{Path, PathBuf},
    process::ExitCode,
    time::Duration,
};

use anyhow::Context;
use mcsc::{
    channel::CancelToken,
    client::Client,
    service::{Request, Response},
    ChannelError, Error,
};
use serde::Serialize;

use crate::{app::GlobalOptions, commands::common::channel_config, output::print_output};

#[derive(Debug, Serialize)]
pub struct CheckReport {
    pub success: bool,
    pub error_count: usize,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub diagnostics: Vec<String>,
}

impl CheckReport {
    fn new(response: &Response) -> Self {
        CheckReport {
            success: response.is_success(),
            error_count: response.error_count(),
            diagnostics: response.lines().map(str::to_string).collect(),
        }
    }
}

/// The first path that does not exist relative to `cwd`, as the user typed it.
fn first_missing<'a>(cwd: &Path, paths: &'a [PathBuf]) -> Option<&'a Path> {
    paths
        .iter()
        .map(PathBuf::as_path)
        .find(|path| !cwd.join(path).exists())
}

pub fn run(
    paths: &[PathBuf],
    timeout: Duration,
    cancel: &CancelToken,
    opts: &GlobalOptions,
) -> anyhow::Result<ExitCode> {
    let cwd = std::env::current_dir().context("failed to determine the current directory")?;
    if let Some(missing) = first_missing(&cwd, paths) {
        eprintln!("error: '{}' does not exist", missing.display());
        return Ok(ExitCode::FAILURE);
    }

    let config = channel_config(opts).with_timeout(timeout);
    let client = Client::connect(&config)
        .with_context(|| format!("failed to open channel {}", config.path.display()))?;

    let request = Request::new(
        &cwd,
        paths.iter().map(|path| path.to_string_lossy().into_owned()),
    );
    let response = match client.check(&request, cancel) {
        Ok(response) => response,
        Err(Error::Channel(ChannelError::TimedOut(waited))) => {
            anyhow::bail!(
                "no answer from the validator within {}s; is the server running?",
                waited.as_secs()
            )
        }
        Err(Error::Channel(ChannelError::Cancelled)) => {
            eprintln!("\nCancelled.");
            return Ok(ExitCode::from(130));
        }
        Err(error) => return Err(error).context("failed to exchange the request"),
    };

    let report = CheckReport::new(&response);
    print_output(&report, opts, |report| {
        for line in &report.diagnostics {
            println!("{line}");
        }
    })?;

    Ok(if report.success {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_missing() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("here.txt"), "say hi\n").unwrap();
        let paths = [PathBuf::from("here.txt"), PathBuf::from("gone.txt")];
        assert_eq!(first_missing(dir.path(), &paths), Some(Path::new("gone.txt")));
        assert_eq!(first_missing(dir.path(), &paths[..1]), None);
    }

    #[test]
    fn test_report_from_response() {
        let report = CheckReport::new(&Response::decode(
            "a.txt:3: Unknown command\n    kil<--[HERE]\n",
        ));
        assert!(!report.success);
        assert_eq!(report.error_count, 1);
        assert_eq!(report.diagnostics.len(), 2);

        let report = CheckReport::new(&Response::Success);
        assert!(report.success);
        assert!(report.diagnostics.is_empty());
    }
}
