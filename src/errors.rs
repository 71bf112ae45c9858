pub type Result<T> = ::core::result::Result<T, AppError>;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Touch(#[from] xpt2046::Error),
    #[error(transparent)]
    StdIo(#[from] std::io::Error),
    #[error(transparent)]
    Postcard(#[from] postcard::Error),
    #[error("Invalid settings: {0}")]
    InvalidConfig(&'static str),
}
