//! Built-in signature table.
//!
//! Adding a file type is an edit to [`BUILTIN`] only.

use super::Signature;

const MIB: usize = 1024 * 1024;

/// Signatures known out of the box, in scan order.
///
/// Office documents (docx, xlsx, pptx) are zip containers and carve as `zip`.
pub const BUILTIN: &[Signature] = &[
    Signature::new("jpg", &[0xFF, 0xD8, 0xFF], &[0xFF, 0xD9], 50 * MIB),
    Signature::new(
        "png",
        &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A],
        // IEND chunk type + CRC
        &[0x49, 0x45, 0x4E, 0x44, 0xAE, 0x42, 0x60, 0x82],
        100 * MIB,
    ),
    Signature::new("pdf", b"%PDF-", b"%%EOF", 200 * MIB),
    // local file header .. end of central directory
    Signature::new("zip", &[0x50, 0x4B, 0x03, 0x04], &[0x50, 0x4B, 0x05, 0x06], 500 * MIB),
];
