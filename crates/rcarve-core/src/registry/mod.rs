//! Signature registry.
//!
//! A [`Signature`] pairs a type tag with the header and footer byte patterns
//! that delimit a file of that type, and the largest span a match may cover.
//! The [`SignatureRegistry`] is built once and then only read, so a single
//! registry can be shared by any number of concurrent carve runs.
//!
//! ```
//! use rcarve_core::SignatureRegistry;
//!
//! let registry = SignatureRegistry::builtin();
//! let jpg = registry.lookup("jpg").unwrap();
//! assert_eq!(jpg.header(), &[0xFF, 0xD8, 0xFF]);
//! assert!(registry.lookup("gif").is_none());
//! ```

mod builtin;

use crate::error::{Error, Result};
use std::collections::BTreeSet;
use std::fmt;

pub use builtin::BUILTIN;

/// Header/footer description of one carvable file type
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    tag: &'static str,
    header: &'static [u8],
    footer: &'static [u8],
    max_span: usize,
}

impl Signature {
    /// Creates a signature without validating it.
    ///
    /// Invariants are checked when the signature is added to a registry.
    pub const fn new(
        tag: &'static str,
        header: &'static [u8],
        footer: &'static [u8],
        max_span: usize,
    ) -> Self {
        Self {
            tag,
            header,
            footer,
            max_span,
        }
    }

    /// Type tag, also used as the artifact file extension
    pub fn tag(&self) -> &'static str {
        self.tag
    }

    /// Byte pattern that starts a file of this type
    pub fn header(&self) -> &'static [u8] {
        self.header
    }

    /// Byte pattern that ends a file of this type
    pub fn footer(&self) -> &'static [u8] {
        self.footer
    }

    /// Maximum bytes from header start to footer end
    pub fn max_span(&self) -> usize {
        self.max_span
    }

    /// Span of a header immediately followed by its footer.
    ///
    /// A footer that overlaps the header's tail can still yield a shorter
    /// match.
    pub fn min_span(&self) -> usize {
        self.header.len() + self.footer.len()
    }

    fn validate(&self) -> Result<()> {
        if self.tag.is_empty() {
            return Err(Error::invalid_signature(self.tag, "tag is empty"));
        }
        if self.header.is_empty() {
            return Err(Error::invalid_signature(self.tag, "header is empty"));
        }
        if self.footer.is_empty() {
            return Err(Error::invalid_signature(self.tag, "footer is empty"));
        }
        if self.max_span < self.min_span() {
            return Err(Error::invalid_signature(
                self.tag,
                format!(
                    "max span {} is smaller than header + footer ({})",
                    self.max_span,
                    self.min_span()
                ),
            ));
        }
        Ok(())
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Signature")
            .field("tag", &self.tag)
            .field("header", &HexBytes(self.header))
            .field("footer", &HexBytes(self.footer))
            .field("max_span", &self.max_span)
            .finish()
    }
}

struct HexBytes(&'static [u8]);

impl fmt::Debug for HexBytes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in self.0 {
            write!(f, "{:02X}", byte)?;
        }
        Ok(())
    }
}

/// Read-only table of signatures, keyed by tag
#[derive(Debug, Clone)]
pub struct SignatureRegistry {
    signatures: Vec<Signature>,
}

impl Default for SignatureRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl SignatureRegistry {
    /// Registry holding the built-in signature table
    pub fn builtin() -> Self {
        Self {
            signatures: BUILTIN.to_vec(),
        }
    }

    /// Builds a registry from a custom table, validating every entry
    pub fn with_signatures(signatures: impl IntoIterator<Item = Signature>) -> Result<Self> {
        let mut registry = Self {
            signatures: Vec::new(),
        };
        for signature in signatures {
            signature.validate()?;
            if registry.lookup(signature.tag).is_some() {
                return Err(Error::invalid_signature(signature.tag, "duplicate tag"));
            }
            registry.signatures.push(signature);
        }
        Ok(registry)
    }

    /// Finds the signature registered under `tag`
    pub fn lookup(&self, tag: &str) -> Option<&Signature> {
        self.signatures.iter().find(|s| s.tag == tag)
    }

    /// All registered tags
    pub fn all_tags(&self) -> BTreeSet<&'static str> {
        self.signatures.iter().map(|s| s.tag).collect()
    }

    /// Iterates signatures in registry order
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.signatures.iter()
    }

    /// Resolves a selection of tags to signatures.
    ///
    /// The result follows registry order and holds each signature once, no
    /// matter how the selection was ordered or repeated.
    pub fn select<S: AsRef<str>>(&self, tags: &[S]) -> Result<Vec<&Signature>> {
        if tags.is_empty() {
            return Err(Error::NoTypesSelected);
        }
        for tag in tags {
            let tag = tag.as_ref();
            if self.lookup(tag).is_none() {
                return Err(Error::unknown_type(tag, self.signatures.iter().map(|s| s.tag)));
            }
        }
        Ok(self
            .signatures
            .iter()
            .filter(|s| tags.iter().any(|t| t.as_ref() == s.tag))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builtin_signatures_are_valid() {
        for signature in BUILTIN {
            signature.validate().unwrap();
        }
        let tags: Vec<_> = SignatureRegistry::builtin().all_tags().into_iter().collect();
        assert_eq!(tags, vec!["jpg", "pdf", "png", "zip"]);
    }

    #[test]
    fn test_lookup() {
        let registry = SignatureRegistry::builtin();
        let pdf = registry.lookup("pdf").unwrap();
        assert_eq!(pdf.header(), b"%PDF-");
        assert_eq!(pdf.footer(), b"%%EOF");
        assert_eq!(pdf.max_span(), 200 * 1024 * 1024);
        assert!(registry.lookup("PDF").is_none());
    }

    #[test]
    fn test_select_follows_registry_order() {
        let registry = SignatureRegistry::builtin();
        let selected = registry.select(&["zip", "jpg", "zip"]).unwrap();
        let tags: Vec<_> = selected.iter().map(|s| s.tag()).collect();
        assert_eq!(tags, vec!["jpg", "zip"]);
    }

    #[test]
    fn test_select_errors() {
        let registry = SignatureRegistry::builtin();
        let empty: [&str; 0] = [];
        assert!(matches!(registry.select(&empty), Err(Error::NoTypesSelected)));

        let err = registry.select(&["jpg", "gif"]).unwrap_err();
        assert!(matches!(err, Error::UnknownType { ref tag, .. } if tag == "gif"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_custom_registry_validation() {
        let ok = SignatureRegistry::with_signatures([Signature::new("ab", b"A", b"B", 2)]);
        assert!(ok.is_ok());

        let too_small = SignatureRegistry::with_signatures([Signature::new("ab", b"AA", b"B", 2)]);
        assert!(matches!(too_small, Err(Error::InvalidSignature { .. })));

        let empty_footer = SignatureRegistry::with_signatures([Signature::new("a", b"A", b"", 8)]);
        assert!(matches!(empty_footer, Err(Error::InvalidSignature { .. })));

        let duplicate = SignatureRegistry::with_signatures([
            Signature::new("a", b"A", b"B", 8),
            Signature::new("a", b"C", b"D", 8),
        ]);
        assert!(matches!(duplicate, Err(Error::InvalidSignature { .. })));
    }

    #[test]
    fn test_debug_shows_hex() {
        let sig = Signature::new("jpg", &[0xFF, 0xD8, 0xFF], &[0xFF, 0xD9], 10);
        let debug = format!("{:?}", sig);
        assert!(debug.contains("FFD8FF"));
        assert!(debug.contains("FFD9"));
    }
}
