/// Hook into the host's media library, called after a photo is saved
pub trait MediaIndex: Send + Sync {
    fn scan(&self, path: &str);
}

/// Media index for hosts without a media library
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopMediaIndex;

impl MediaIndex for NoopMediaIndex {
    fn scan(&self, _path: &str) {}
}
