use snafu::Snafu;


#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    InvalidInput,
    InvalidProfile,
    InvalidParameters,
    NumericInstability,
    ResourceExceeded,
    Io,
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("invalid input: {}", reason))]
    InvalidInput { reason: String },

    #[snafu(display("unknown enhancement profile '{}'", name))]
    InvalidProfile { name: String },

    #[snafu(display("invalid parameters: {}", reason))]
    InvalidParameters { reason: String },

    #[snafu(display("non-finite values produced by {}", stage))]
    NumericInstability { stage: String },

    #[snafu(display("spectrum of {} x {} bins needs {} bytes, limit is {}", frames, bins, bytes, limit))]
    ResourceExceeded { frames: usize, bins: usize, bytes: usize, limit: usize },

    #[snafu(display("failed to read parameters: {}", source))]
    Config { source: serde_yaml::Error },

    #[snafu(display("failed to open parameter file: {}", source))]
    ConfigIo { source: std::io::Error },

    #[snafu(display("WAV I/O failed: {}", source))]
    Wav { source: hound::Error },
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::InvalidInput { .. }       => ErrorKind::InvalidInput,
            Error::InvalidProfile { .. }     => ErrorKind::InvalidProfile,
            Error::InvalidParameters { .. }  => ErrorKind::InvalidParameters,
            Error::Config { .. }             => ErrorKind::InvalidParameters,
            Error::NumericInstability { .. } => ErrorKind::NumericInstability,
            Error::ResourceExceeded { .. }   => ErrorKind::ResourceExceeded,
            Error::ConfigIo { .. }           => ErrorKind::Io,
            Error::Wav { .. }                => ErrorKind::Io,
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_and_messages() {
        let e = InvalidProfileSnafu { name: "loud" }.build();
        assert_eq!(e.kind(), ErrorKind::InvalidProfile);
        assert_eq!(e.to_string(), "unknown enhancement profile 'loud'");

        let e = ResourceExceededSnafu { frames: 10usize, bins: 4usize, bytes: 640usize, limit: 100usize }.build();
        assert_eq!(e.kind(), ErrorKind::ResourceExceeded);
    }
}
