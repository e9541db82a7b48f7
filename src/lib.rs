//! # bbx
//!
//! Normalizes loosely structured source documents (NIMAS DTBook, EPUB) into
//! canonical BBX trees ready for braille formatting.
//!
//! ## Pipeline
//!
//! - The **parser stage** maps each source element to a canonical element
//!   with a declarative table ([`parse::ParserMap`]).
//! - The **fixer engine** applies pattern-matched rewrites
//!   ([`fix::FixerMap`]) until none match anywhere.
//! - The **upgrader** walks documents written by older format versions
//!   forward to [`bbx::CURRENT_VERSION`].
//! - The **validator** checks the result against the canonical type system.
//!
//! ## Quick Start
//!
//! ```no_run
//! use bbx::{convert_file, ConversionContext};
//!
//! let ctx = ConversionContext::builtin()?;
//! let conversion = convert_file("book.xml", &ctx)?;
//! bbx::convert::write_file(&conversion.dom, "book.bbx")?;
//! # Ok::<(), bbx::Error>(())
//! ```
//!
//! ## Working with Trees
//!
//! Documents live in an arena ([`dom::Dom`]) addressed by [`dom::NodeId`]
//! handles. The [`bbx`](mod@bbx) module layers the canonical type system on
//! top:
//!
//! ```
//! use bbx::bbx::{create, new_document, root_section, SubType};
//!
//! let mut dom = new_document();
//! let root = root_section(&dom).unwrap();
//! let para = create(&mut dom, SubType::BLOCK_DEFAULT);
//! dom.append(root, para);
//! dom.append_text(para, "Hello");
//! assert!(bbx::bbx::is_a(&dom, para, SubType::BLOCK_DEFAULT));
//! ```

pub mod bbx;
pub mod context;
pub mod convert;
pub mod dom;
pub mod error;
pub mod fix;
pub mod import;
pub mod parse;
pub mod styles;
pub mod upgrade;
pub mod validate;
pub(crate) mod util;

pub use context::{ConversionConfig, ConversionContext};
pub use convert::{convert, convert_batch, convert_bytes, convert_file, upgrade_file, Conversion};
pub use error::{Error, Result};
pub use upgrade::upgrade;
pub use validate::Validator;
