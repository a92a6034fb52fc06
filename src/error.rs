use thiserror::Error;

/// Failures of the coordinate reference system layer.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum CrsError {
    #[error("unknown coordinate reference system {crs}: {reason}")]
    Unknown { crs: String, reason: String },

    #[error("no transform from {from} to {to}: {reason}")]
    NoTransform {
        from: String,
        to: String,
        reason: String,
    },

    #[error("{crs} is not a {expected} coordinate reference system")]
    WrongKind { crs: String, expected: &'static str },

    #[error("expected geometry in {expected}, found {found}")]
    Mismatch { expected: String, found: String },

    #[error("could not transform feature {index} from {from} to {to}: {reason}")]
    FeatureTransform {
        from: String,
        to: String,
        index: usize,
        reason: String,
    },

    #[error("coordinate ({x}, {y}) is outside the area of {crs}")]
    OutOfRange { crs: String, x: f64, y: f64 },
}

/// The ways a source geometry can be rejected.
#[derive(Debug, Clone, PartialEq)]
pub enum GeometryErrorKind {
    Null,
    Unsupported(String),
    TooFewCoordinates { ring: usize, count: usize },
    NonFinite,
    ZeroArea,
    SelfIntersection { ring: usize },
}

impl std::fmt::Display for GeometryErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GeometryErrorKind::Null => write!(f, "geometry is null"),
            GeometryErrorKind::Unsupported(kind) => {
                write!(f, "{} is not a polygon or multipolygon", kind)
            }
            GeometryErrorKind::TooFewCoordinates { ring, count } => {
                write!(f, "ring {} has only {} distinct coordinates", ring, count)
            }
            GeometryErrorKind::NonFinite => write!(f, "geometry has non-finite coordinates"),
            GeometryErrorKind::ZeroArea => write!(f, "polygon has zero area"),
            GeometryErrorKind::SelfIntersection { ring } => {
                write!(f, "ring {} intersects itself", ring)
            }
        }
    }
}

/// A feature rejected while building a feature collection.
#[derive(Debug, Error, Clone, PartialEq)]
#[error("invalid geometry for feature {index}: {kind}")]
pub struct GeometryError {
    pub index: usize,
    pub kind: GeometryErrorKind,
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum Error {
    #[error(transparent)]
    Crs(#[from] CrsError),

    #[error(transparent)]
    Geometry(#[from] GeometryError),

    #[error("spatial index holds no features")]
    EmptyIndex,

    #[error("buffer distance must be finite and non-negative, got {0}")]
    InvalidBufferDistance(f64),
}

pub type Result<T> = std::result::Result<T, Error>;
