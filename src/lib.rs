pub mod error;
pub mod version;
pub mod header;
pub mod region;
pub mod codec;
pub mod tags;
pub mod library;
pub mod container;
pub mod report;

pub use error::{ErrorKind, PsfError, Result};
pub use version::Version;
pub use header::PsfHeader;
pub use codec::{Inflater, InflateError};
pub use tags::Tag;
pub use container::{Container, ReadOptions};
pub use report::Report;
