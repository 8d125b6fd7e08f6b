use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScaffoldError {
    #[error("provider error: {0}")] Provider(String),
    #[error("the model returned an empty response")] EmptyResponse,
    #[error("the model returned malformed JSON: {0}")] Malformed(String),
    #[error("a request is already in flight")] Busy,
    #[error("unsafe path: {0}")] UnsafePath(String),
    #[error("{0} is both a file and a folder")] PathConflict(String),
    #[error("archive error: {0}")] Archive(String),
    #[error("unsupported image type: {0}")] UnsupportedImage(String),
}
