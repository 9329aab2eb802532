//! Optional backend capabilities.
//!
//! Some stages depend on a backend that may be missing at runtime (a filter
//! bank that cannot be designed for the sample rate, an embedding service
//! that is not configured, a face classifier without its model file).
//! Callers get an explicit [`Capability`] and branch on it instead of
//! catching errors.

use std::fmt;

/// A backend handle that is either usable or absent.
#[derive(Debug, Clone)]
pub enum Capability<T> {
    /// The backend is ready to use.
    Available(T),
    /// The backend is missing; the string says why.
    Unavailable(String),
}

impl<T> Capability<T> {
    /// Mark a capability as unavailable.
    pub fn unavailable(reason: impl Into<String>) -> Self {
        Self::Unavailable(reason.into())
    }

    pub fn is_available(&self) -> bool {
        matches!(self, Self::Available(_))
    }

    /// Borrow the handle if available.
    pub fn as_available(&self) -> Option<&T> {
        match self {
            Self::Available(handle) => Some(handle),
            Self::Unavailable(_) => None,
        }
    }

    /// Mutably borrow the handle if available.
    pub fn as_available_mut(&mut self) -> Option<&mut T> {
        match self {
            Self::Available(handle) => Some(handle),
            Self::Unavailable(_) => None,
        }
    }

    /// Reason the capability is missing, if it is.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Available(_) => None,
            Self::Unavailable(reason) => Some(reason),
        }
    }

    /// Transform the handle, keeping the unavailable reason untouched.
    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Capability<U> {
        match self {
            Self::Available(handle) => Capability::Available(f(handle)),
            Self::Unavailable(reason) => Capability::Unavailable(reason),
        }
    }
}

impl<T> From<Option<T>> for Capability<T> {
    fn from(value: Option<T>) -> Self {
        match value {
            Some(handle) => Self::Available(handle),
            None => Self::Unavailable("not configured".to_string()),
        }
    }
}

impl<T> fmt::Display for Capability<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Available(_) => write!(f, "available"),
            Self::Unavailable(reason) => write!(f, "unavailable ({})", reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_option_conversion() {
        let cap: Capability<u32> = Some(3).into();
        assert!(cap.is_available());
        assert_eq!(cap.as_available(), Some(&3));

        let missing: Capability<u32> = None.into();
        assert!(!missing.is_available());
        assert_eq!(missing.reason(), Some("not configured"));
    }

    #[test]
    fn test_map_keeps_reason() {
        let cap: Capability<u32> = Capability::unavailable("no model");
        let mapped = cap.map(|v| v * 2);
        assert_eq!(mapped.reason(), Some("no model"));
        assert_eq!(mapped.to_string(), "unavailable (no model)");
    }
}
