use thiserror::Error;

pub type Result<T> = std::result::Result<T, PostError>;

#[derive(Error, Debug)]
pub enum PostError {
    #[error("Front matter error: {0}")]
    FrontMatter(#[from] serde_yaml::Error),

    #[error("Front matter is not a mapping")]
    NotAMapping,
}
