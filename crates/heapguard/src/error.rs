use std::fmt;

/// Size of a request that the heap could not satisfy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Request {
    Bytes(usize),
    /// A zeroed request whose byte count does not fit in `usize`.
    Elements { count: usize, size: usize },
}

impl Request {
    /// Byte count of a `count * size` request, or the raw factors on overflow.
    pub fn elements(count: usize, size: usize) -> Self {
        match count.checked_mul(size) {
            Some(bytes) => Request::Bytes(bytes),
            None => Request::Elements { count, size },
        }
    }

    pub fn bytes(&self) -> Option<usize> {
        match *self {
            Request::Bytes(bytes) => Some(bytes),
            Request::Elements { .. } => None,
        }
    }
}

impl fmt::Display for Request {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Request::Bytes(bytes) => write!(f, "{} bytes", bytes),
            Request::Elements { count, size } => write!(f, "{} x {} bytes", count, size),
        }
    }
}

/// Returned by the tolerant (`try_*`) operations when the heap is exhausted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllocError {
    pub request: Request,
}

impl fmt::Display for AllocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "failed to allocate {}", self.request)
    }
}

impl std::error::Error for AllocError {}
