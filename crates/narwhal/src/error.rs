#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MalformedGraph {
    #[error("edge #{edge_index} references unknown node `{node_id}`")]
    UnknownEndpoint { edge_index: usize, node_id: String },

    #[error("duplicate node id `{node_id}`")]
    DuplicateNode { node_id: String },
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("malformed graph: {0}")]
    MalformedGraph(#[from] MalformedGraph),

    #[error("invalid layout parameter `{name}`: {reason}")]
    InvalidParameters { name: &'static str, reason: String },
}

pub type Result<T> = std::result::Result<T, Error>;
