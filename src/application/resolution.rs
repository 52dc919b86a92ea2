use crate::domain::{AppError, FormatOption, VideoMetadata};

pub const DEFAULT_PREFERRED_CONTAINER: &str = "mp4";

/// The URL being prepared for download and its selectable formats.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolutionSession {
    source_url: String,
    title: String,
    formats: Vec<FormatOption>,
    selected_format_id: Option<String>,
}

impl ResolutionSession {
    pub fn new(source_url: String, metadata: VideoMetadata, preferred_container: &str) -> Self {
        let selected_format_id =
            default_format(&metadata.formats, preferred_container).map(|f| f.format_id.clone());
        Self {
            source_url,
            title: metadata.title,
            formats: metadata.formats,
            selected_format_id,
        }
    }

    pub fn source_url(&self) -> &str {
        &self.source_url
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn formats(&self) -> &[FormatOption] {
        &self.formats
    }

    pub fn selected(&self) -> Option<&FormatOption> {
        let id = self.selected_format_id.as_deref()?;
        self.formats.iter().find(|f| f.format_id == id)
    }

    pub fn select(&mut self, format_id: &str) -> Result<(), AppError> {
        if !self.formats.iter().any(|f| f.format_id == format_id) {
            return Err(AppError::UnknownFormat(format_id.to_string()));
        }
        self.selected_format_id = Some(format_id.to_string());
        Ok(())
    }
}

/// First candidate in the preferred container, else the overall best.
pub fn default_format<'a>(
    formats: &'a [FormatOption],
    preferred_container: &str,
) -> Option<&'a FormatOption> {
    formats
        .iter()
        .find(|f| f.extension.eq_ignore_ascii_case(preferred_container))
        .or_else(|| formats.first())
}
