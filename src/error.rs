pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("GPU error: {0}")]
    Gpu(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("verification failed: {0}")]
    Verification(String),

    #[error("image error: {0}")]
    Image(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub fn gpu<S: Into<String>>(msg: S) -> Self {
        Error::Gpu(msg.into())
    }

    pub fn config<S: Into<String>>(msg: S) -> Self {
        Error::Config(msg.into())
    }

    pub fn verification<S: Into<String>>(msg: S) -> Self {
        Error::Verification(msg.into())
    }

    pub fn image<S: Into<String>>(msg: S) -> Self {
        Error::Image(msg.into())
    }
}
