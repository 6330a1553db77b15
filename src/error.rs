use thiserror::Error;

#[derive(Error, Debug)]
pub enum BlockersError {
    #[error("Concourse API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON serialization error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Could not find a pipeline with name: {0}")]
    PipelineNotFound(String),

    #[error("Unknown fly target: {0}")]
    UnknownTarget(String),

    #[error("Cyclic passed constraint on resource '{resource}': {}", cycle.join(" -> "))]
    CyclicPassed { resource: String, cycle: Vec<String> },
}

pub type Result<T> = std::result::Result<T, BlockersError>;
