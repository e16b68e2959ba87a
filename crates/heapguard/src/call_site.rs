use std::fmt;
use std::panic::Location;

/// Source location of an allocation-family call, used as provenance key.
///
/// Captured through `#[track_caller]`, so every public entry point of the
/// facade reports the line of the code that called it rather than a line
/// inside this crate.
///
/// # Examples
///
/// ```rust
/// use heapguard::CallSite;
///
/// #[track_caller]
/// fn here() -> CallSite {
///     CallSite::caller()
/// }
///
/// let site = here();
/// assert!(site.file.ends_with(".rs"));
/// assert!(site.line > 0);
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct CallSite {
    pub file: &'static str,
    pub line: u32,
}

impl CallSite {
    pub const fn new(file: &'static str, line: u32) -> Self {
        Self { file, line }
    }

    /// Location of the outermost `#[track_caller]` frame.
    #[track_caller]
    #[inline]
    pub fn caller() -> Self {
        let location: &'static Location<'static> = Location::caller();
        Self {
            file: location.file(),
            line: location.line(),
        }
    }
}

impl From<&'static Location<'static>> for CallSite {
    fn from(location: &'static Location<'static>) -> Self {
        Self::new(location.file(), location.line())
    }
}

impl fmt::Display for CallSite {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.file, self.line)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[track_caller]
    fn captured() -> CallSite {
        CallSite::caller()
    }

    #[test]
    fn test_caller_points_at_call_expression() {
        let line = line!() + 1;
        let site = captured();

        assert_eq!(site.file, file!());
        assert_eq!(site.line, line);
    }

    #[test]
    fn test_order_is_file_then_line() {
        let a = CallSite::new("a.rs", 90);
        let b = CallSite::new("b.rs", 1);
        let c = CallSite::new("b.rs", 7);

        let mut sites = vec![c, a, b];
        sites.sort();
        assert_eq!(sites, vec![a, b, c]);
    }

    #[test]
    fn test_display() {
        assert_eq!(CallSite::new("src/main.rs", 12).to_string(), "src/main.rs:12");
    }
}
