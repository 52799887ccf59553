/// A binary payload prepared for the provider: base64 data plus the media
/// type it was declared or resolved as. The media type is never empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentPart {
    pub data: String,
    pub media_type: String,
}

/// One element of the ordered input list sent to the provider.
///
/// The instruction text always comes first; a content part, if any, second.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Part {
    Text(String),
    Content(ContentPart),
}

/// Successful outcome of a generation call.
#[derive(Debug, Clone)]
pub struct GenerationResult {
    pub text: String,
}
