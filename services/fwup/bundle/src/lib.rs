//! Key material, authenticated firmware bundling and blob verification for
//! fwup.
//!
//! ## Example
//!
//! ```rust,no_run
//! use fwup_bundle::{bundle, open_blob, KeyMaterial};
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let keys = KeyMaterial::load("secret_build_output.bin")?;
//! let firmware = std::fs::read("firmware.bin")?;
//!
//! let blob = bundle(&firmware, 2, "Release 2", &keys)?;
//! blob.write_to("firmware_protected.bin")?;
//!
//! // same checks the bootloader performs
//! let opened = open_blob(blob.as_bytes(), &keys)?;
//! assert_eq!(opened.firmware, firmware);
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod blob;
pub mod cipher;
pub mod encoder;
pub mod error;
pub mod keys;
pub mod mac;
pub mod verify;

// Re-export main types
pub use blob::Blob;
pub use encoder::{bundle, Bundler};
pub use error::{BundleError, InputError, KeyError, VerifyError};
pub use keys::{to_c_array, KeyMaterial, CBC_KEY_SIZE, HMAC_KEY_SIZE, KEY_ARTIFACT_SIZE};
pub use mac::TreeHmacs;
pub use verify::{open_blob, OpenedBlob};
