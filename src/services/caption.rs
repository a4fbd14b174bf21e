/// Display number and caption derived from an image's original filename.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caption {
    pub number: usize,
    pub text: String,
}

/// Derives the caption printed above an image from its filename.
///
/// The extension is stripped and control characters removed; punctuation and
/// symbols stay verbatim because they often carry meaning for the reader.
/// Total function: a filename that yields an empty caption falls back to the
/// original name unchanged.
pub fn extract(filename: &str, index: usize) -> Caption {
    let stem = match filename.rsplit_once('.') {
        Some((stem, _ext)) if !stem.is_empty() => stem,
        _ => filename,
    };

    let text: String = stem.chars().filter(|c| !c.is_control()).collect();

    let text = if text.is_empty() {
        filename.to_string()
    } else {
        text
    };

    Caption {
        number: index + 1,
        text,
    }
}
