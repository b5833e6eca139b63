use thiserror::Error;

#[derive(Error, Debug)]
pub enum OblateError {
    #[error("Query outside the atmosphere grid coverage: {axis} = {value} not in [{min}, {max}]")]
    OutOfDomain {
        axis: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Convergence failure: {0}")]
    ConvergenceFailure(String),

    #[error("Atmosphere grid file not found locally or remotely: {0}")]
    GridFileNotFound(String),

    #[error("Invalid atmosphere grid file {0}: {1}")]
    InvalidGridFile(String, String),

    #[error("Visible-disk silhouette is degenerate (fewer than 3 distinct projected points)")]
    DegenerateSilhouette,

    #[error("Invalid evaluation mode flag: {0}")]
    InvalidModeFlag(char),

    #[error("Error parsing visibility table at line {line}: {reason}")]
    ParseVisibilityError { line: usize, reason: String },

    #[error("Error parsing photometry table at line {line}: {reason}")]
    ParsePhotometryError { line: usize, reason: String },

    #[error("Error parsing table {0}: {1}")]
    ParseTableError(String, String),

    #[error("Filter curve for band {0} is unusable: {1}")]
    InvalidFilterCurve(String, String),

    #[error("Evolutionary track file is unusable: {0}")]
    InvalidTrackFile(String),

    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("HTTP ureq error: {0}")]
    UreqHttpError(#[from] Box<ureq::Error>),

    #[error("Base dir creation error for the atmosphere cache: {0}")]
    UnableToCreateBaseDir(String),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("ROOTS finding error: {0}")]
    RootFindingError(#[from] roots::SearchError),
}

impl From<ureq::Error> for OblateError {
    fn from(err: ureq::Error) -> Self {
        OblateError::UreqHttpError(Box::new(err))
    }
}
