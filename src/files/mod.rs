//! File model and schema-guided extraction.

pub mod errors;
pub mod extractor;
pub mod types;

pub use errors::{FileExtractError, FileExtractResult};
pub use extractor::{extract_and_convert_proto_files, extract_referenced_file_ids, Extraction};
pub use types::{FileOwner, FileRef, NewFile, ProtoFile, StoredFile};
