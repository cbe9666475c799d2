#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("time format error: {0}")]
    TimeFormat(#[from] time::error::Format),
    #[error("time parse error: {0}")]
    TimeParse(#[from] time::error::Parse),
    #[error("invalid header name: `{0}`")]
    InvalidHeaderName(String),
    #[error("invalid value for header `{0}`")]
    InvalidHeaderValue(String),
    #[error("invalid hmac key length")]
    InvalidKeyLength,
}
