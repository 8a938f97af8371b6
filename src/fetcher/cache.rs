//! Cache-Control classification of fetched fragments

/// Whether a fragment may still change
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mutability {
    /// Cacheable forever; never refetched
    Immutable,

    /// May change; refetched when polling
    Mutable { max_age: Option<u64> },
}

impl Mutability {
    pub fn is_immutable(&self) -> bool {
        matches!(self, Self::Immutable)
    }
}

/// The directives of a `Cache-Control` header the replicator acts on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheDirective {
    pub immutable: bool,
    pub max_age: Option<u64>,
}

impl CacheDirective {
    /// Parses a `Cache-Control` header value
    ///
    /// Unknown directives and malformed `max-age` values are ignored.
    ///
    /// # Example
    ///
    /// ```
    /// use ldes_tide::fetcher::CacheDirective;
    ///
    /// let directive = CacheDirective::parse("public, max-age=604800, immutable");
    /// assert!(directive.immutable);
    /// assert_eq!(directive.max_age, Some(604800));
    /// ```
    pub fn parse(header: &str) -> Self {
        let mut directive = Self::default();

        for part in header.split(',') {
            let part = part.trim();
            let (name, value) = match part.split_once('=') {
                Some((name, value)) => (name.trim(), Some(value.trim().trim_matches('"'))),
                None => (part, None),
            };

            if name.eq_ignore_ascii_case("immutable") {
                directive.immutable = true;
            } else if name.eq_ignore_ascii_case("max-age") {
                directive.max_age = value.and_then(|v| v.parse().ok());
            }
        }

        directive
    }

    /// Classifies the fragment the header was served with
    pub fn mutability(&self) -> Mutability {
        if self.immutable {
            Mutability::Immutable
        } else {
            Mutability::Mutable {
                max_age: self.max_age,
            }
        }
    }
}
