use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum GcloudError {
    #[error("could not run {program:?}; is the Google Cloud SDK installed and on PATH?")]
    Spawn {
        program: PathBuf,
        source: std::io::Error,
    },

    #[error("`gcloud {command}` exited with {}: {stderr}", exit_status(.exit_code))]
    CommandFailed {
        command: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("`gcloud {command}` printed non-UTF-8 output")]
    InvalidUtf8 {
        command: String,
        source: std::string::FromUtf8Error,
    },
}

fn exit_status(code: &Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "a signal".to_owned(),
    }
}
