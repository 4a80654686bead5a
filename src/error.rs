use std::fmt;
use std::fmt::Display;
use std::path::{Path, PathBuf};

#[derive(Debug, PartialEq, Eq)]
pub enum DecodeError {
    TruncatedHeader,
    BadMagic,
    BadDimensions,
    BadMaxValue,
    BadPixelLine { line: usize },
    BadChannelValue { line: usize },
    MissingPixels { expected: usize, found: usize },
    ExtraPixels { expected: usize },
}

impl Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DecodeError::TruncatedHeader => write!(f, "header ends before magic, dimensions and max value"),
            DecodeError::BadMagic => write!(f, "first line is not P3"),
            DecodeError::BadDimensions => write!(f, "dimensions line is not two positive integers"),
            DecodeError::BadMaxValue => write!(f, "max value line is not a positive integer"),
            DecodeError::BadPixelLine { line } => write!(f, "line {} is not three color values", line),
            DecodeError::BadChannelValue { line } => write!(f, "line {} has a non integer color value", line),
            DecodeError::MissingPixels { expected, found } => {
                write!(f, "pixel data ends after {} of {} pixels", found, expected)
            }
            DecodeError::ExtraPixels { expected } => {
                write!(f, "pixel data continues past the declared {} pixels", expected)
            }
        }
    }
}

impl std::error::Error for DecodeError {}

#[derive(Debug)]
pub enum ImageError {
    IO(std::io::Error),
    Decode(DecodeError),
}

impl Display for ImageError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ImageError::IO(e) => write!(f, "io error: {}", e),
            ImageError::Decode(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for ImageError {}

impl From<std::io::Error> for ImageError {
    fn from(e: std::io::Error) -> Self {
        ImageError::IO(e)
    }
}

impl From<DecodeError> for ImageError {
    fn from(e: DecodeError) -> Self {
        ImageError::Decode(e)
    }
}

/// Stage of a single conversion at which a recovered failure occurred.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Open,
    Decode,
    Create,
    Encode,
}

impl Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Stage::Open => "open",
            Stage::Decode => "decode",
            Stage::Create => "create",
            Stage::Encode => "encode",
        };
        write!(f, "{}", name)
    }
}

/// A per-file failure. The batch recovers from these: the file is skipped
/// and its siblings continue.
#[derive(Debug)]
pub struct ConvertError {
    pub file: PathBuf,
    pub stage: Stage,
    pub cause: ImageError,
}

impl ConvertError {
    pub fn new(file: &Path, stage: Stage, cause: ImageError) -> Self {
        ConvertError {
            file: file.to_path_buf(),
            stage,
            cause,
        }
    }
}

impl Display for ConvertError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} failed: {}", self.file.display(), self.stage, self.cause)
    }
}

impl std::error::Error for ConvertError {}
