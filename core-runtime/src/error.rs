use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid assembly configuration: {0}")]
    Config(String),

    /// A collaborator the engine cannot run without was not injected
    #[error("Missing {collaborator}: {message}")]
    MissingCollaborator { collaborator: String, message: String },

    #[error("Logging setup failed: {0}")]
    Logging(String),
}

pub type Result<T> = std::result::Result<T, Error>;
