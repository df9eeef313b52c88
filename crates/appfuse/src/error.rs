/// Errors that end or prevent a FUSE session.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("FUSE device is gone")]
    DeviceGone,

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_device_gone() {
        assert_eq!(Error::DeviceGone.to_string(), "FUSE device is gone");
    }

    #[test]
    fn error_from_io_error() {
        let io_err = std::io::Error::other("bad fd");
        let err: Error = io_err.into();
        assert!(matches!(err, Error::Io(_)));
        assert!(err.to_string().contains("bad fd"));
    }
}
