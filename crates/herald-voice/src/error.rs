use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("no usable back-end: {0}")]
    Unavailable(String),

    #[error("{engine} rejected the request (status {status}): {body}")]
    Upstream {
        engine: &'static str,
        status: u16,
        body: String,
    },

    #[error("{engine} exited with {code:?}: {stderr}")]
    EngineExit {
        engine: &'static str,
        code: Option<i32>,
        stderr: String,
    },

    #[error("{player} playback failed with {code:?}")]
    Playback { player: String, code: Option<i32> },

    #[error("{engine} timed out after {seconds} seconds")]
    Timeout { engine: &'static str, seconds: u64 },

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),
}
