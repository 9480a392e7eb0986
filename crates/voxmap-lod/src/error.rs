/// Errors from building LOD thresholds.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LodError {
    #[error("at least one LOD threshold is required")]
    Empty,

    #[error("threshold {index} is {value}, thresholds must be positive and finite")]
    NotPositive { index: usize, value: f64 },

    #[error("threshold {index} ({value}) is not greater than the previous one")]
    NotIncreasing { index: usize, value: f64 },

    #[error("{count} thresholds exceed the {max} supported LOD levels")]
    TooManyLevels { count: usize, max: u8 },
}
