use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    #[error("polarization must be >= 0, got {0}")]
    Polarization(i32),
    #[error("frequency must be >= 1, got {0}")]
    Frequency(f64),
    #[error("{0} is not a valid coordinate")]
    Coordinate(f64),
}
