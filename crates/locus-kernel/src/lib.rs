//! # Locus Kernel
//!
//! The content model every other Locus crate builds on: a source string is
//! normalized into an ordered sequence of text runs and placeholders, and
//! that sequence is the only thing translation memory, providers and the
//! dispatcher ever see.
//!
//! This crate is **format-agnostic**: resource parsers live outside and plug
//! in through [`resource::ResourceFilter`]. It only prescribes how segments
//! become placeholder-safe, deterministically addressed translation units.
//!
//! ## Architecture
//!
//! ```text
//! raw string
//!     │  decoders (normalize)
//! NormalizedString      ← Parts: text runs + placeholders
//!     │
//!     ├── flatten_ordinal   → guid(rid, sid, nsrc)
//!     ├── flatten_linear    → {{a_x_b}} signatures (hashing, persistence, matching)
//!     └── flatten_xml       → <x1/> markers (provider payloads only)
//!     │
//! TranslationUnit       ← wire-whitelisted source/target record
//! ```
//!
//! `snapshot` saves and loads whole record collections as JSON lines, for
//! TM snapshots and task stores.

pub mod compat;
pub mod decoders;
pub mod error;
pub mod guid;
pub mod linear;
pub mod normalize;
pub mod part;
pub mod resource;
pub mod snapshot;
pub mod tu;
pub mod xml;

pub use compat::{PhMatcher, compatible, compatible_json};
pub use error::{KernelError, TuError};
pub use guid::{GUID_LENGTH, generate_guid, guid};
pub use linear::{PhMap, extract_linear, flatten_linear, flatten_ordinal, minify_signature};
pub use normalize::{Decoder, Flags, TextEncoder, normalize, to_raw};
pub use part::{NormalizedString, Part, PhType, Placeholder};
pub use resource::{
    ParseRequest, ParsedResource, ResourceFilter, Segment, TranslateRequest, segments_to_tus,
};
pub use snapshot::{SnapshotError, load_snapshot, save_snapshot};
pub use tu::{Notes, PhNote, TranslationUnit};
pub use xml::{XmlPhMap, escape_xml_text, extract_xml, flatten_xml, unescape_xml_text};
