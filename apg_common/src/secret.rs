use std::fmt;

const REDACTED: &str = "****";

/// Holds a sensitive value (API token, webhook secret) such that it cannot leak through `Debug`,
/// `Display` or accidental logging. Reading the value requires an explicit [`Secret::reveal`],
/// which keeps every access grep-able.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    /// Grants access to the wrapped value. Call sites should use the result immediately rather
    /// than store it.
    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> fmt::Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}

impl<T: Clone + Default> fmt::Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(REDACTED)
    }
}
