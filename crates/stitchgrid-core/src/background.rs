//! Reference image shown behind the grid.
//!
//! The encoded bytes are kept alongside the decoded pixels so an export can
//! write the image back out unchanged.

use crate::storage::is_safe_entry_name;
use crate::storage::MANIFEST_ENTRY;
use base64::{Engine, engine::general_purpose::STANDARD};
use std::sync::Arc;
use thiserror::Error;

/// Background image errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BackgroundError {
    #[error("Image file name is empty or invalid: {0:?}")]
    InvalidName(String),
    #[error("Not a base64 data URL")]
    InvalidDataUrl,
    #[error("Failed to decode image: {0}")]
    Decode(String),
}

/// Where the image bytes came from, which decides how they are persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageSource {
    /// An uploaded file; exported as its own archive entry.
    File { name: String },
    /// Inline data with no original file; exported inside the manifest.
    Inline,
}

/// Decoded, straight-alpha RGBA8 pixels.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedImage {
    pub width: u32,
    pub height: u32,
    /// Row-major RGBA, `width * height * 4` bytes.
    pub rgba: Vec<u8>,
}

/// A background image: original bytes plus decoded pixels.
#[derive(Debug, Clone)]
pub struct BackgroundImage {
    source: ImageSource,
    mime_type: &'static str,
    bytes: Arc<[u8]>,
    pixels: Arc<DecodedImage>,
}

impl BackgroundImage {
    /// Decode an uploaded file. Only the final path component of `name`
    /// is kept.
    pub fn from_file(name: &str, bytes: Vec<u8>) -> Result<Self, BackgroundError> {
        let name = entry_name_for(name).ok_or_else(|| BackgroundError::InvalidName(name.to_string()))?;
        Self::decode(ImageSource::File { name }, bytes)
    }

    /// Decode a `data:<mime>;base64,<payload>` URL.
    pub fn from_data_url(url: &str) -> Result<Self, BackgroundError> {
        let bytes = parse_data_url(url)?;
        Self::decode(ImageSource::Inline, bytes)
    }

    fn decode(source: ImageSource, bytes: Vec<u8>) -> Result<Self, BackgroundError> {
        let format = image::guess_format(&bytes).map_err(|e| BackgroundError::Decode(e.to_string()))?;
        let decoded = image::load_from_memory_with_format(&bytes, format)
            .map_err(|e| BackgroundError::Decode(e.to_string()))?;
        let rgba = decoded.to_rgba8();
        let (width, height) = rgba.dimensions();
        log::debug!("Decoded {:?} background image {}x{}", format, width, height);

        Ok(Self {
            source,
            mime_type: format.to_mime_type(),
            bytes: bytes.into(),
            pixels: Arc::new(DecodedImage {
                width,
                height,
                rgba: rgba.into_raw(),
            }),
        })
    }

    pub fn source(&self) -> &ImageSource {
        &self.source
    }

    /// Archive entry name, for uploaded files.
    pub fn file_name(&self) -> Option<&str> {
        match &self.source {
            ImageSource::File { name } => Some(name),
            ImageSource::Inline => None,
        }
    }

    pub fn mime_type(&self) -> &'static str {
        self.mime_type
    }

    /// Original encoded bytes.
    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn pixels(&self) -> &DecodedImage {
        &self.pixels
    }

    pub fn width(&self) -> u32 {
        self.pixels.width
    }

    pub fn height(&self) -> u32 {
        self.pixels.height
    }

    /// Encode the original bytes as a data URL.
    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, STANDARD.encode(&self.bytes))
    }
}

/// Reduce an uploaded file name to a safe archive entry name.
fn entry_name_for(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default().trim();
    let base = if base == MANIFEST_ENTRY {
        format!("background-{base}")
    } else {
        base.to_string()
    };
    is_safe_entry_name(&base).then_some(base)
}

fn parse_data_url(url: &str) -> Result<Vec<u8>, BackgroundError> {
    let rest = url.trim().strip_prefix("data:").ok_or(BackgroundError::InvalidDataUrl)?;
    let (header, payload) = rest.split_once(',').ok_or(BackgroundError::InvalidDataUrl)?;
    if !header.ends_with(";base64") {
        return Err(BackgroundError::InvalidDataUrl);
    }
    STANDARD
        .decode(payload.trim())
        .map_err(|_| BackgroundError::InvalidDataUrl)
}

/// Proof of an issued decode request. Only the newest ticket can install
/// its result.
#[derive(Debug, PartialEq, Eq)]
pub struct DecodeTicket(u64);

/// Single-slot guard for asynchronous image decodes.
///
/// Starting a new request invalidates every earlier ticket, so a slow decode
/// that finishes late cannot overwrite a newer image.
#[derive(Debug, Default)]
pub struct DecodeSlot {
    issued: u64,
    current: Option<u64>,
}

impl DecodeSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Issue a ticket, invalidating any outstanding one.
    pub fn begin(&mut self) -> DecodeTicket {
        self.issued += 1;
        self.current = Some(self.issued);
        DecodeTicket(self.issued)
    }

    /// Invalidate the outstanding ticket, if any.
    pub fn invalidate(&mut self) {
        self.current = None;
    }

    pub fn is_pending(&self) -> bool {
        self.current.is_some()
    }

    /// Whether `ticket` is the newest, unused ticket.
    pub fn is_current(&self, ticket: &DecodeTicket) -> bool {
        self.current == Some(ticket.0)
    }

    /// Consume a ticket. Returns true only for the newest, unused ticket.
    pub fn accept(&mut self, ticket: DecodeTicket) -> bool {
        if self.is_current(&ticket) {
            self.current = None;
            true
        } else {
            false
        }
    }
}
