use thiserror::Error;

#[derive(Error, Debug)]
pub enum PlateScaleError {
    #[error("Unable to perform file operation: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Image decoding/encoding error: {0}")]
    ImageError(#[from] image::ImageError),

    #[error("TIFF decoding error: {0}")]
    TiffError(#[from] tiff::TiffError),

    #[error("Array shape error: {0}")]
    ShapeError(#[from] ndarray::ShapeError),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("Configuration file error: {0}")]
    ConfigError(#[from] serde_json::Error),

    #[error("Invalid glob pattern: {0}")]
    GlobPatternError(#[from] glob::PatternError),

    #[error("NaN found in observer site coordinates")]
    NaNSiteCoordinate(#[from] ordered_float::FloatIsNan),

    #[error("UTF-8 Path error: {0}")]
    Utf8PathError(String),

    #[error("File not found: {0}")]
    FileNotFound(String),

    #[error("Invalid FITS file: {0}")]
    InvalidFits(String),

    #[error("Missing FITS keyword: {0}")]
    MissingKeyword(String),

    #[error("FITS I/O error: {0}")]
    FitsioError(String),

    #[error("Invalid WCS solution: {0}")]
    WcsError(String),

    #[error("{0} has {1} WCS axes -- expected 2 or 3")]
    InvalidWcsAxes(String, i64),

    #[error("Could not find WCS file for {0}")]
    WcsNotFound(String),

    #[error("Astrometry.net solve-field executable not found")]
    SolverNotFound,

    #[error("Could not solve {0}")]
    NotSolved(String),

    #[error("solve-field failed on {0}: {1}")]
    SolverFailed(String, String),

    #[error("Not sure what you mean by frame range {0:?}")]
    InvalidFrameRange(Vec<usize>),

    #[error("Unknown collapse method: {0}")]
    UnknownMethod(String),

    #[error("Only 2D, 3D, or 4D image stacks are handled, got {0} dimensions")]
    StackDimension(usize),

    #[error("Frame selection {0}..{1} is empty for a stack of {2} frames")]
    EmptyFrameSelection(usize, usize, usize),

    #[error("Could not determine time of image {0}")]
    TimeUnavailable(String),

    #[error("Invalid time string: {0}")]
    InvalidTime(String),

    #[error("Unsupported image format: {0}")]
    UnsupportedFormat(String),

    #[error("UT1 provider error: {0}")]
    Ut1ProviderError(String),

    #[error("No files found in {0} with {1}")]
    NoFilesFound(String, String),

    #[error("Missing binary table column: {0}")]
    MissingColumn(String),

    #[error("Template of shape {0:?} does not fit in image of shape {1:?}")]
    TemplateTooLarge((usize, usize), (usize, usize)),

    #[error("Grid shapes differ: {0:?} vs {1:?}")]
    GridShapeMismatch(Vec<usize>, Vec<usize>),

    #[error("Scale data has no {0}")]
    MissingScaleData(String),

    #[error("Could not download {0}: {1}")]
    DownloadError(String, String),
}

impl PartialEq for PlateScaleError {
    fn eq(&self, other: &Self) -> bool {
        use PlateScaleError::*;
        match (self, other) {
            // Foreign payloads are not comparable: same variant means equal
            (IoError(_), IoError(_)) => true,
            (ImageError(_), ImageError(_)) => true,
            (TiffError(_), TiffError(_)) => true,
            (ShapeError(_), ShapeError(_)) => true,
            (CsvError(_), CsvError(_)) => true,
            (ConfigError(_), ConfigError(_)) => true,
            (GlobPatternError(_), GlobPatternError(_)) => true,
            (NaNSiteCoordinate(_), NaNSiteCoordinate(_)) => true,

            (Utf8PathError(a), Utf8PathError(b)) => a == b,
            (FileNotFound(a), FileNotFound(b)) => a == b,
            (InvalidFits(a), InvalidFits(b)) => a == b,
            (MissingKeyword(a), MissingKeyword(b)) => a == b,
            (FitsioError(a), FitsioError(b)) => a == b,
            (WcsError(a), WcsError(b)) => a == b,
            (InvalidWcsAxes(a, n), InvalidWcsAxes(b, m)) => a == b && n == m,
            (WcsNotFound(a), WcsNotFound(b)) => a == b,
            (NotSolved(a), NotSolved(b)) => a == b,
            (SolverFailed(a, x), SolverFailed(b, y)) => a == b && x == y,
            (InvalidFrameRange(a), InvalidFrameRange(b)) => a == b,
            (UnknownMethod(a), UnknownMethod(b)) => a == b,
            (StackDimension(a), StackDimension(b)) => a == b,
            (EmptyFrameSelection(a, b, c), EmptyFrameSelection(x, y, z)) => {
                a == x && b == y && c == z
            }
            (TimeUnavailable(a), TimeUnavailable(b)) => a == b,
            (InvalidTime(a), InvalidTime(b)) => a == b,
            (UnsupportedFormat(a), UnsupportedFormat(b)) => a == b,
            (Ut1ProviderError(a), Ut1ProviderError(b)) => a == b,
            (NoFilesFound(a, x), NoFilesFound(b, y)) => a == b && x == y,
            (MissingColumn(a), MissingColumn(b)) => a == b,
            (TemplateTooLarge(a, x), TemplateTooLarge(b, y)) => a == b && x == y,
            (GridShapeMismatch(a, x), GridShapeMismatch(b, y)) => a == b && x == y,
            (MissingScaleData(a), MissingScaleData(b)) => a == b,
            (DownloadError(a, x), DownloadError(b, y)) => a == b && x == y,

            // Unit variants
            (SolverNotFound, SolverNotFound) => true,

            _ => false,
        }
    }
}

impl From<fitsio::errors::Error> for PlateScaleError {
    fn from(err: fitsio::errors::Error) -> Self {
        PlateScaleError::FitsioError(err.to_string())
    }
}
