use std::path::Path;

use crate::models::metadata::ExtractedMetadata;
use crate::models::placement::NameProposal;

const FORBIDDEN_CHARS: &[char] = &['\\', '/', '*', '?', ':', '"', '<', '>', '|'];

/// Strips characters that are illegal in file names on common platforms and
/// turns spaces into underscores.
pub fn sanitize_filename_part(part: &str) -> String {
    part.trim()
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect::<String>()
        .replace(' ', "_")
}

/// First author only: everything before the first `;`, then before the
/// first `,`.
pub fn cleanup_author_string(author: &str) -> String {
    let author = author.split(';').next().unwrap_or_default();
    let author = author.split(',').next().unwrap_or_default();
    author.trim().to_string()
}

pub fn author_label(metadata: &ExtractedMetadata) -> String {
    let author = cleanup_author_string(&metadata.author);
    if metadata.is_multiple_authors {
        format!("{author} et al")
    } else {
        author
    }
}

pub fn proposed_stem(metadata: &ExtractedMetadata) -> String {
    format!(
        "{}_{}_{}",
        sanitize_filename_part(&author_label(metadata)),
        sanitize_filename_part(&metadata.journal),
        metadata.year
    )
}

pub fn propose_name(original: &Path, metadata: &ExtractedMetadata, extension: &str) -> NameProposal {
    NameProposal {
        original_name: crate::models::task::display_name(original),
        proposed_name: format!("{}.{extension}", proposed_stem(metadata)),
        title: metadata.title.clone(),
    }
}

/// Normalizes a name the operator accepted. `None` means nothing usable was
/// entered, which the flows treat as a skip.
pub fn finalize_accepted_name(input: &str, extension: &str) -> Option<String> {
    // Operators sometimes paste a full path; keep only the last component.
    let trimmed = input.trim();
    let last = trimmed
        .rsplit(['/', '\\'])
        .next()
        .unwrap_or(trimmed)
        .trim();
    if last.is_empty() || last == "." || last == ".." {
        return None;
    }

    if has_extension(last, extension) {
        Some(last.to_string())
    } else {
        Some(format!("{last}.{extension}"))
    }
}

pub fn has_extension(name: &str, extension: &str) -> bool {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case(extension))
        .unwrap_or(false)
}

/// Folder names typed into the picker: same forbidden set, spaces kept.
pub fn sanitize_folder_name(name: &str) -> Option<String> {
    let clean: String = name
        .chars()
        .filter(|c| !FORBIDDEN_CHARS.contains(c))
        .collect::<String>()
        .trim()
        .to_string();
    if clean.is_empty() || clean == "." || clean == ".." {
        None
    } else {
        Some(clean)
    }
}
