//! Error of chordring_core

/// A wrap `Result` contains custom errors.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors collections in chordring-core.
#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum Error {
    #[error("Vnode state lock poisoned")]
    VnodeStateLock,

    #[error("Vnode {0} is not registered")]
    VnodeNotFound(String),

    #[error("Failed to connect! Blackhole: {0}")]
    Blackhole(String),

    #[error("Exhausted all preceding nodes while looking up {0}")]
    NoReachablePath(String),

    #[error("Remote vnode {0} answered with an empty successor list")]
    EmptySuccessorList(String),

    #[error("Cannot ask for {requested} successors, NumSuccessors is {max}")]
    TooManySuccessors { requested: usize, max: usize },

    #[error("Remote host {0} has no vnodes")]
    RemoteHostHasNoVnodes(String),

    #[error("Failed to find successors for vnode {vnode}: {reason}")]
    JoinFailed { vnode: String, reason: String },

    #[error("Invalid ring config: {0}")]
    InvalidConfig(String),

    #[error("YAML config error: {0}")]
    ConfigYaml(#[from] serde_yaml::Error),

    #[error("Identifier has {got} bytes, expected {expected}")]
    IdLengthMismatch { expected: usize, got: usize },

    #[error("{}", join_errors(.0))]
    Multiple(Vec<Error>),
}

impl Error {
    /// Merge two optional errors into one, keeping both when they are present.
    pub fn merge(a: Option<Error>, b: Option<Error>) -> Option<Error> {
        match (a, b) {
            (None, e) | (e, None) => e,
            (Some(Error::Multiple(mut errs)), Some(e)) => {
                errs.push(e);
                Some(Error::Multiple(errs))
            }
            (Some(a), Some(b)) => Some(Error::Multiple(vec![a, b])),
        }
    }
}

fn join_errors(errs: &[Error]) -> String {
    errs.iter()
        .map(|e| e.to_string())
        .collect::<Vec<_>>()
        .join("\n")
}
